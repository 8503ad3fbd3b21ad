//! The two pipelines: upload-and-index and retrieval-augmented query.
pub mod query;
pub mod upload;

pub use query::{Answer, QuestionProcessor};
pub use upload::{TempUpload, UploadReport, Uploader};
