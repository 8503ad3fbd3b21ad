//! In-memory chat state for one user session.

use serde::Serialize;

use crate::pipeline::Answer;

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEntry {
    pub question: String,
    pub answer: String,
    /// Retrieved snippets, rendered as `- {page_content}`
    pub contexts: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ChatSession {
    history: Vec<ChatEntry>,
    uploaded: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that accepts questions straight away, for stores that
    /// were filled in an earlier run.
    pub fn preloaded() -> Self {
        Self {
            history: Vec::new(),
            uploaded: true,
        }
    }

    pub fn record(&mut self, question: &str, answer: &Answer) -> &ChatEntry {
        let contexts = answer
            .source_documents
            .iter()
            .map(|doc| format!("- {}", doc.page_content))
            .collect();
        self.history.push(ChatEntry {
            question: question.to_string(),
            answer: answer.answer.clone(),
            contexts,
        });
        &self.history[self.history.len() - 1]
    }

    /// Forget every exchange. The uploaded flag is kept.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &[ChatEntry] {
        &self.history
    }

    pub fn mark_uploaded(&mut self) {
        self.uploaded = true;
    }

    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }
}
