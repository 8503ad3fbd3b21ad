//! User-facing error type for the upload and query pipelines.
//!
//! Every variant renders as the message shown to the user; the underlying
//! cause is appended so it stays visible in the UI and in logs.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The uploaded bytes could not be staged on disk
    #[error("File not uploaded, problem with uploading in the file system. {0}")]
    TempWrite(String),

    /// Loading or splitting the PDF failed
    #[error("File not uploaded, try again, problem with creating documents, {0}")]
    CreateDocuments(String),

    /// Embedding the chunks or writing them to the vector store failed
    #[error("File not uploaded, try again, Problem with vectoring the input {0}")]
    Vectorize(String),

    /// Retrieval or generation failed while answering a question
    #[error("There is error in ProcessPrompt : {0}")]
    ProcessPrompt(String),
}

impl Error {
    pub fn temp_write(cause: impl ToString) -> Self {
        Self::TempWrite(cause.to_string())
    }

    pub fn create_documents(cause: impl ToString) -> Self {
        Self::CreateDocuments(cause.to_string())
    }

    pub fn vectorize(cause: impl ToString) -> Self {
        Self::Vectorize(cause.to_string())
    }

    pub fn process_prompt(cause: impl ToString) -> Self {
        Self::ProcessPrompt(cause.to_string())
    }
}
