//! Recursive character text splitter.
//!
//! Text is cut on the coarsest separator that occurs in it (paragraphs,
//! then lines, then words, then characters). Pieces are merged back into
//! chunks of at most `chunk_size` characters, and consecutive chunks share
//! up to `chunk_overlap` characters. Lengths are counted in `char`s.

use tracing::warn;

use crate::loader::{Document, DocumentMetadata};

const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// A piece of a page, ready to be embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub page_content: String,
    pub metadata: DocumentMetadata,
    /// Running index over all chunks of one upload
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct RecursiveCharacterTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterTextSplitter {
    /// # Panics
    ///
    /// If `chunk_overlap >= chunk_size`; configuration validation rejects
    /// that combination before a splitter is ever built.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        assert!(
            chunk_overlap < chunk_size,
            "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
        );
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[must_use]
    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    /// Split every page, carrying its metadata over to each chunk.
    pub fn split_documents(&self, pages: &[Document]) -> Vec<DocumentChunk> {
        pages
            .iter()
            .flat_map(|page| {
                self.split_text(&page.page_content)
                    .into_iter()
                    .map(move |text| (text, page.metadata.clone()))
            })
            .enumerate()
            .map(|(position, (page_content, metadata))| DocumentChunk {
                page_content,
                metadata,
                position,
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator present in the text; "" always matches
        let (separator, rest) = match separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
        {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => (separators.last().copied().unwrap_or(""), &[][..]),
        };

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }

            if !small.is_empty() {
                chunks.extend(self.merge_splits(&small));
                small.clear();
            }
            if rest.is_empty() {
                if char_len(piece) > self.chunk_size {
                    warn!(
                        "Piece of {} chars cannot be split below chunk_size {}",
                        char_len(piece),
                        self.chunk_size
                    );
                }
                chunks.push(piece.trim().to_string());
            } else {
                chunks.extend(self.split_recursive(piece, rest));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge_splits(&small));
        }

        chunks.retain(|c| !c.is_empty());
        chunks
    }

    /// Greedily pack `splits` into chunks, keeping an overlapping tail.
    ///
    /// Separators stay attached to the pieces, so pieces are concatenated
    /// as they are.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {total}, which is longer than the specified {}",
                        self.chunk_size
                    );
                }
                if !current.is_empty() {
                    push_joined(&mut docs, &current);

                    // Drop from the front until the tail fits as overlap
                    // and leaves room for the incoming piece
                    while total > self.chunk_overlap
                        || (total > 0 && total + len > self.chunk_size)
                    {
                        total -= char_len(current.remove(0));
                    }
                }
            }

            current.push(piece);
            total += len;
        }

        push_joined(&mut docs, &current);
        docs
    }
}

impl Default for RecursiveCharacterTextSplitter {
    fn default() -> Self {
        Self::new(1000, 100)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_joined(docs: &mut Vec<String>, pieces: &[&str]) {
    let joined = pieces.concat();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Split `text` on `separator`, keeping each separator at the start of the
/// piece that follows it. An empty separator splits into characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(content: &str, page: usize) -> Document {
        Document {
            page_content: content.to_string(),
            metadata: DocumentMetadata {
                source: "book.pdf".to_string(),
                page,
            },
        }
    }

    #[test]
    fn test_split_keeping_separator() {
        assert_eq!(
            split_keeping_separator("a\n\nb\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\nc"]
        );
        assert_eq!(split_keeping_separator("\n\nlead", "\n\n"), vec!["\n\nlead"]);
        assert_eq!(split_keeping_separator("héllo", ""), vec!["h", "é", "l", "l", "o"]);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = RecursiveCharacterTextSplitter::default();
        let chunks = splitter.split_text("  Paragraph one.\n\nParagraph two.  ");
        assert_eq!(chunks, vec!["Paragraph one.\n\nParagraph two."]);
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        let splitter = RecursiveCharacterTextSplitter::default();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("  \n\n \n ").is_empty());
    }

    #[test]
    fn test_words_are_packed_with_overlap() {
        let splitter = RecursiveCharacterTextSplitter::new(10, 4);
        let chunks = splitter.split_text("aaa bbb ccc ddd");
        // Each chunk repeats the last word of the previous one
        assert_eq!(chunks, vec!["aaa bbb", "bbb ccc", "ccc ddd"]);
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let splitter = RecursiveCharacterTextSplitter::new(1000, 100);
        let text = (0..400)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = splitter.split_text(&text);

        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000, "chunk too long: {}", chunk.len());
        }
        // Consecutive chunks share text
        for pair in chunks.windows(2) {
            let first_word_of_next = pair[1].split(' ').next().unwrap();
            assert!(pair[0].contains(first_word_of_next));
        }
    }

    #[test]
    fn test_paragraphs_preferred_over_lines() {
        let splitter = RecursiveCharacterTextSplitter::new(30, 0);
        let text = "first paragraph line\n\nsecond paragraph line";
        let chunks = splitter.split_text(text);
        assert_eq!(chunks, vec!["first paragraph line", "second paragraph line"]);
    }

    #[test]
    fn test_long_word_falls_back_to_characters() {
        let splitter = RecursiveCharacterTextSplitter::new(5, 0);
        let chunks = splitter.split_text("abcdefghijkl");
        assert_eq!(chunks, vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn test_multibyte_lengths_counted_in_chars() {
        let splitter = RecursiveCharacterTextSplitter::new(4, 0);
        let chunks = splitter.split_text("ééééé");
        assert_eq!(chunks, vec!["éééé", "é"]);
    }

    #[test]
    fn test_indivisible_piece_is_kept() {
        let splitter = RecursiveCharacterTextSplitter::new(3, 0).with_separators(&[" "]);
        let chunks = splitter.split_text("ab toolongword cd");
        assert!(chunks.contains(&"toolongword".to_string()));
    }

    #[test]
    fn test_split_documents_carries_metadata() {
        let splitter = RecursiveCharacterTextSplitter::new(12, 0);
        let pages = vec![page("alpha beta gamma", 0), page("", 1), page("delta", 2)];
        let chunks = splitter.split_documents(&pages);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].page_content, "alpha beta");
        assert_eq!(chunks[0].metadata.page, 0);
        assert_eq!(chunks[1].page_content, "gamma");
        assert_eq!(chunks[2].page_content, "delta");
        assert_eq!(chunks[2].metadata.page, 2);
        assert_eq!(
            chunks.iter().map(|c| c.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    #[should_panic(expected = "chunk_overlap")]
    fn test_overlap_must_be_smaller() {
        let _ = RecursiveCharacterTextSplitter::new(10, 10);
    }
}
