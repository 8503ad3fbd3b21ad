use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::Db;
use crate::db::models::{Chunk, NewUpload};
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::loader::PdfLoader;
use crate::splitter::{DocumentChunk, RecursiveCharacterTextSplitter};

/// An uploaded file staged on disk under a random name.
///
/// The file is removed when the guard is dropped.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub fn write(dir: &Path, bytes: &[u8]) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.pdf", Uuid::new_v4().simple()));
        fs::write(&path, bytes)?;
        debug!("Staged {} bytes at {}", bytes.len(), path.display());
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to remove temp upload {}: {e}", self.path.display());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub source: String,
    pub pages: usize,
    pub chunks: usize,
}

/// Stages, parses, splits, embeds and stores one PDF per call.
pub struct Uploader {
    pub db: Arc<TokioMutex<Db>>,
    pub embedder: Arc<dyn Embedder>,
    pub splitter: RecursiveCharacterTextSplitter,
    pub temp_dir: PathBuf,
    pub collection: String,
}

impl Uploader {
    /// Read a PDF from `path` and upload it under its file name.
    pub async fn upload_file(&self, path: &Path) -> Result<UploadReport> {
        let bytes = fs::read(path)
            .map_err(|e| Error::temp_write(format!("cannot read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());
        self.upload(&file_name, &bytes).await
    }

    /// Run the whole upload pipeline for `bytes`.
    ///
    /// Stages run in order and the first failure ends the upload.
    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<UploadReport> {
        info!("Uploading {file_name} ({} bytes)", bytes.len());

        let staged = TempUpload::write(&self.temp_dir, bytes).map_err(Error::temp_write)?;
        let (pages, chunks) = self.create_docs(file_name, staged)?;
        self.vectorize_and_store(file_name, pages, &chunks).await?;

        info!("Indexed {file_name}: {pages} pages, {} chunks", chunks.len());
        Ok(UploadReport {
            source: file_name.to_string(),
            pages,
            chunks: chunks.len(),
        })
    }

    /// Load and split the staged file. The temp file is gone once this
    /// returns, whatever the outcome.
    fn create_docs(
        &self,
        file_name: &str,
        staged: TempUpload,
    ) -> Result<(usize, Vec<DocumentChunk>)> {
        let pages = PdfLoader::new(file_name)
            .load(staged.path())
            .map_err(Error::create_documents)?;
        drop(staged);

        let chunks = self.splitter.split_documents(&pages);
        if chunks.is_empty() {
            return Err(Error::create_documents(format!(
                "no text could be extracted from {file_name}"
            )));
        }
        debug!("Split {} pages into {} chunks", pages.len(), chunks.len());
        Ok((pages.len(), chunks))
    }

    async fn vectorize_and_store(
        &self,
        file_name: &str,
        page_count: usize,
        chunks: &[DocumentChunk],
    ) -> Result<()> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.page_content.as_str()).collect();
        let vectors = self
            .embedder
            .embed_documents(&texts)
            .map_err(Error::vectorize)?;

        let db_chunks: Vec<Chunk> = chunks
            .iter()
            .map(|c| Chunk {
                source: &c.metadata.source,
                page: c.metadata.page,
                position: c.position,
                content: &c.page_content,
            })
            .collect();
        let upload = NewUpload {
            source: file_name,
            page_count,
            uploaded_at: Utc::now(),
        };

        let mut db = self.db.lock().await;
        db.add_documents(&self.collection, &upload, &db_chunks, &vectors)
            .map_err(Error::vectorize)?;
        Ok(())
    }
}
