//! Chat prompt template for retrieval-augmented answers.
//!
//! A template is an ordered list of role-tagged message templates with
//! `{name}` placeholders. Some variables are fixed up front (partials), the
//! rest are supplied per question.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::llm::{ChatMessage, Role};
use crate::loader::Document;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder regex"));

/// Separator placed between stuffed documents.
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("missing value for prompt variable '{0}'")]
    MissingVariable(String),
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    messages: Vec<(Role, String)>,
    partials: HashMap<String, String>,
}

impl PromptTemplate {
    pub fn new(messages: Vec<(Role, String)>) -> Self {
        Self {
            messages,
            partials: HashMap::new(),
        }
    }

    /// The question-answering template with the assistant persona `role`.
    pub fn rag(role: &str) -> Self {
        Self::new(vec![
            (Role::System, "You experienced {role}".to_string()),
            (Role::Human, "What is your name?".to_string()),
            (
                Role::Ai,
                "My Name is domain knower, I primarily help you with Deep learning.".to_string(),
            ),
            (
                Role::Human,
                "Given this context: {context}\nPlease answer this question: {input}".to_string(),
            ),
        ])
        .with_partial("role", role)
    }

    #[must_use]
    pub fn with_partial(mut self, name: &str, value: &str) -> Self {
        self.partials.insert(name.to_string(), value.to_string());
        self
    }

    /// Placeholders that are not covered by partials, in first-use order.
    pub fn input_variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (_, template) in &self.messages {
            for caps in PLACEHOLDER.captures_iter(template) {
                let name = &caps[1];
                if !self.partials.contains_key(name) && !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// Render all messages. Supplied `vars` take precedence over partials.
    pub fn format(&self, vars: &HashMap<&str, String>) -> Result<Vec<ChatMessage>, PromptError> {
        self.messages
            .iter()
            .map(|(role, template)| Ok(ChatMessage::new(*role, self.render(template, vars)?)))
            .collect()
    }

    fn render(&self, template: &str, vars: &HashMap<&str, String>) -> Result<String, PromptError> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let whole = caps.get(0).expect("group 0 always matches");
            let name = &caps[1];
            let value = vars
                .get(name)
                .or_else(|| self.partials.get(name))
                .ok_or_else(|| PromptError::MissingVariable(name.to_string()))?;

            out.push_str(&template[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }
}

/// Concatenate the content of `docs` for the `{context}` variable.
pub fn stuff_documents(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| d.page_content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DocumentMetadata;

    fn vars(context: &str, input: &str) -> HashMap<&'static str, String> {
        HashMap::from([("context", context.to_string()), ("input", input.to_string())])
    }

    #[test]
    fn test_rag_template_messages() {
        let template = PromptTemplate::rag("LLM Expert");
        let messages = template
            .format(&vars("Dropout zeroes activations.", "What is dropout?"))
            .unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], ChatMessage::new(Role::System, "You experienced LLM Expert"));
        assert_eq!(messages[1].role, Role::Human);
        assert_eq!(messages[2].role, Role::Ai);
        assert_eq!(
            messages[3].content,
            "Given this context: Dropout zeroes activations.\nPlease answer this question: What is dropout?"
        );
    }

    #[test]
    fn test_input_variables_exclude_partials() {
        let template = PromptTemplate::rag("Tutor");
        assert_eq!(template.input_variables(), vec!["context", "input"]);
    }

    #[test]
    fn test_missing_variable() {
        let template = PromptTemplate::rag("Tutor");
        let mut only_input = HashMap::new();
        only_input.insert("input", "q".to_string());
        assert_eq!(
            template.format(&only_input).unwrap_err(),
            PromptError::MissingVariable("context".to_string())
        );
    }

    #[test]
    fn test_values_are_not_reinterpreted() {
        // Braces inside substituted values must survive untouched
        let template = PromptTemplate::new(vec![(Role::Human, "{input}!".to_string())]);
        let mut v = HashMap::new();
        v.insert("input", "{context}".to_string());
        let messages = template.format(&v).unwrap();
        assert_eq!(messages[0].content, "{context}!");
    }

    #[test]
    fn test_stuff_documents() {
        let meta = DocumentMetadata {
            source: "a.pdf".to_string(),
            page: 0,
        };
        let docs = vec![
            Document {
                page_content: "first".to_string(),
                metadata: meta.clone(),
            },
            Document {
                page_content: "second".to_string(),
                metadata: meta,
            },
        ];
        assert_eq!(stuff_documents(&docs), "first\n\nsecond");
        assert_eq!(stuff_documents(&[]), "");
    }
}
