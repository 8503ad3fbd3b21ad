//! PDF loading into page-level documents.
//!
//! Text is extracted page by page with `lopdf` in plain mode; embedded
//! images are never looked at.

use std::collections::HashSet;
use std::path::Path;

use lopdf::{Dictionary, Object, ObjectId};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read PDF '{path}': {message}")]
    Load { path: String, message: String },

    #[error("PDF '{0}' is encrypted")]
    Encrypted(String),

    #[error("PDF '{0}' has no pages")]
    NoPages(String),
}

/// Where a piece of text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Name of the uploaded file
    pub source: String,
    /// Zero-based page index
    pub page: usize,
}

/// The text of one PDF page.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

pub struct PdfLoader {
    source: String,
}

impl PdfLoader {
    /// `source` is recorded on every page instead of the (temporary) path
    /// the bytes are read from.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn load(&self, path: &Path) -> Result<Vec<Document>, LoaderError> {
        let mut doc = lopdf::Document::load(path).map_err(|e| LoaderError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(LoaderError::Encrypted(self.source.clone()));
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(LoaderError::NoPages(self.source.clone()));
        }
        inline_inherited_resources(&mut doc, pages.values().copied());

        let mut documents = Vec::with_capacity(pages.len());
        for (index, (&page_number, &page_id)) in pages.iter().enumerate() {
            let text = match doc.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(e) => {
                    // One broken content stream should not sink the upload
                    warn!("Could not extract text from page {page_number} of {}: {e}", self.source);
                    String::new()
                }
            };
            if text.trim().is_empty() && !doc.get_page_contents(page_id).is_empty() {
                warn!(
                    "Page {page_number} of {} has content but no extractable text",
                    self.source
                );
            }
            debug!("Page {page_number}: {} chars", text.chars().count());

            documents.push(Document {
                page_content: text,
                metadata: DocumentMetadata {
                    source: self.source.clone(),
                    page: index,
                },
            });
        }

        info!("Loaded {} pages from {}", documents.len(), self.source);
        Ok(documents)
    }
}

/// Copy `/Resources` inherited through the `/Parent` chain onto pages that
/// have none of their own.
///
/// lopdf only follows inherited resources given by reference, so fonts
/// declared inline on a `/Pages` node would otherwise not be found.
fn inline_inherited_resources(
    doc: &mut lopdf::Document,
    page_ids: impl Iterator<Item = ObjectId>,
) {
    let inherited: Vec<(ObjectId, Object)> = page_ids
        .filter_map(|page_id| {
            let page = doc.get_dictionary(page_id).ok()?;
            if page.has(b"Resources") {
                return None;
            }
            inherited_resources(doc, page).map(|resources| (page_id, resources))
        })
        .collect();

    for (page_id, resources) in inherited {
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            page.set("Resources", resources);
        }
    }
}

fn inherited_resources(doc: &lopdf::Document, page: &Dictionary) -> Option<Object> {
    let mut seen = HashSet::new();
    let mut node = page;
    loop {
        let parent_id = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        if !seen.insert(parent_id) {
            return None;
        }
        node = doc.get_dictionary(parent_id).ok()?;
        if let Ok(resources) = node.get(b"Resources") {
            return Some(resources.clone());
        }
    }
}

/// Builds small single-font PDFs, for tests of this crate and its users.
pub mod testing {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// A PDF with one page per entry of `pages`, each line drawn separately.
    ///
    /// The font is declared inline in the `/Resources` of the `/Pages` node
    /// and inherited by every page.
    pub fn build_pdf(pages: &[&[&str]]) -> lopdf::Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids = Vec::new();
        for lines in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("TL", vec![14.into()]),
            ];
            for line in lines.iter() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}
