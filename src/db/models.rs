use chrono::{DateTime, Utc};

/// A chunk ready to be stored, borrowed from the splitter output.
#[derive(Debug, Clone)]
pub struct Chunk<'a> {
    pub source: &'a str,
    pub page: usize,
    pub position: usize,
    pub content: &'a str,
}

/// Metadata of one upload, written alongside its chunks.
#[derive(Debug, Clone)]
pub struct NewUpload<'a> {
    pub source: &'a str,
    pub page_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRecord {
    pub id: i64,
    pub source: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub uploads: usize,
    pub chunks: usize,
}
