//! Interactive terminal chat.
//!
//! Lines starting with `/` are commands; anything else is a question. Until
//! a PDF has been uploaded in the session only uploading is offered.

use std::path::PathBuf;

use anyhow::Result;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use tracing::warn;

use crate::app::AppContext;
use crate::pipeline::Answer;
use crate::session::ChatSession;

const HELP: &str = "\
Commands:
  /upload <path>   index a PDF
  /history         show this session's questions and answers
  /clear           clear the chat history
  /help            show this help
  /quit            leave
Anything else is asked as a question about the uploaded PDFs.";

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Upload(PathBuf),
    History,
    Clear,
    Help,
    Quit,
    Question(String),
    Empty,
    Invalid(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Question(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match name {
            "upload" if arg.is_empty() => Self::Invalid("usage: /upload <path>".to_string()),
            "upload" => Self::Upload(PathBuf::from(arg.trim_matches('"'))),
            "history" => Self::History,
            "clear" => Self::Clear,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Invalid(format!("unknown command: /{other} (try /help)")),
        }
    }
}

pub struct Repl {
    app: AppContext,
    session: ChatSession,
}

impl Repl {
    pub fn new(app: AppContext, session: ChatSession) -> Self {
        Self { app, session }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Handle one input line. Returns the text to print, or `None` to quit.
    pub async fn respond(&mut self, line: &str) -> Option<String> {
        let reply = match Input::parse(line) {
            Input::Quit => return None,
            Input::Empty => String::new(),
            Input::Help => HELP.to_string(),
            Input::Invalid(message) => message,
            Input::Upload(path) => match self.app.uploader().upload_file(&path).await {
                Ok(report) => {
                    self.session.mark_uploaded();
                    format!(
                        "File uploaded: {} ({} pages, {} chunks)",
                        report.source, report.pages, report.chunks
                    )
                }
                Err(e) => e.to_string(),
            },
            Input::History => self.render_history(),
            Input::Clear => {
                self.session.clear();
                "History cleared.".to_string()
            }
            Input::Question(_) if !self.session.is_uploaded() => {
                "Upload a PDF first: /upload <path>".to_string()
            }
            Input::Question(question) => match self.app.processor().process(&question).await {
                Ok(answer) => {
                    self.session.record(&question, &answer);
                    render_answer(&answer)
                }
                Err(e) => e.to_string(),
            },
        };
        Some(reply)
    }

    /// Newest exchange first.
    fn render_history(&self) -> String {
        if self.session.history().is_empty() {
            return "No questions yet.".to_string();
        }
        self.session
            .history()
            .iter()
            .rev()
            .map(|entry| {
                let mut block = format!("Q: {}\nA: {}", entry.question, entry.answer);
                for context in &entry.contexts {
                    block.push('\n');
                    block.push_str(context);
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Read lines until `/quit`, Ctrl-C or Ctrl-D.
    pub async fn run(mut self) -> Result<()> {
        println!("{HELP}");
        let mut rl = Editor::<(), DefaultHistory>::new()?;

        loop {
            match rl.readline("> ") {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    match self.respond(&line).await {
                        Some(reply) if reply.is_empty() => {}
                        Some(reply) => println!("{reply}\n"),
                        None => break,
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => {
                    warn!("Input error: {e}");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn render_answer(answer: &Answer) -> String {
    let mut out = answer.answer.clone();
    if !answer.source_documents.is_empty() {
        out.push_str("\n\nSources:");
        for doc in &answer.source_documents {
            out.push_str(&format!(
                "\n- {} (page {}): {}",
                doc.metadata.source,
                doc.metadata.page + 1,
                snippet(&doc.page_content, 160)
            ));
        }
    }
    out
}

/// First `max` chars of `text` on a single line.
fn snippet(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::Db;
    use crate::embedder::mock::MockEmbedder;
    use crate::llm::mock::ScriptedChat;
    use crate::loader::testing::build_pdf;
    use std::sync::Arc;

    fn repl(temp_dir: &std::path::Path, session: ChatSession) -> Repl {
        let config = Config {
            temp_dir: temp_dir.display().to_string(),
            ..Config::default()
        };
        let app = AppContext::new(
            config,
            Db::open_in_memory(384).unwrap(),
            Arc::new(MockEmbedder::default()),
            Arc::new(ScriptedChat::answering("Attention weighs tokens.")),
        );
        Repl::new(app, session)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Input::parse("  "), Input::Empty);
        assert_eq!(Input::parse("/help"), Input::Help);
        assert_eq!(Input::parse("/exit"), Input::Quit);
        assert_eq!(
            Input::parse("/upload  \"my notes.pdf\" "),
            Input::Upload(PathBuf::from("my notes.pdf"))
        );
        assert!(matches!(Input::parse("/upload"), Input::Invalid(_)));
        assert!(matches!(Input::parse("/frobnicate"), Input::Invalid(_)));
        assert_eq!(
            Input::parse(" what is attention? "),
            Input::Question("what is attention?".to_string())
        );
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("a\n b", 10), "a b");
        assert_eq!(snippet("abcdef", 3), "abc...");
    }

    #[tokio::test]
    async fn test_questions_wait_for_upload() {
        let dir = tempfile::tempdir().unwrap();
        let mut repl = repl(dir.path(), ChatSession::new());

        let reply = repl.respond("what is attention?").await.unwrap();
        assert!(reply.starts_with("Upload a PDF first"));
        assert!(repl.session().history().is_empty());
        assert!(repl.respond("/quit").await.is_none());
    }

    #[tokio::test]
    async fn test_upload_ask_history_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut repl = repl(&dir.path().join("temp"), ChatSession::new());

        let pdf = dir.path().join("attn.pdf");
        let bytes = build_pdf(&[&["Attention weighs tokens by relevance."]]).unwrap();
        std::fs::write(&pdf, bytes).unwrap();

        let reply = repl.respond(&format!("/upload {}", pdf.display())).await.unwrap();
        assert!(reply.starts_with("File uploaded: attn.pdf"), "{reply}");

        let reply = repl.respond("what is attention?").await.unwrap();
        assert!(reply.starts_with("Attention weighs tokens."));
        assert!(reply.contains("attn.pdf (page 1)"));

        repl.respond("why does it help?").await.unwrap();

        let history = repl.respond("/history").await.unwrap();
        assert!(history.starts_with("Q: why does it help?"), "{history}");
        let newest = history.find("Q: why does it help?").unwrap();
        let oldest = history.find("Q: what is attention?").unwrap();
        assert!(newest < oldest);
        assert!(history.contains("- Attention weighs tokens by relevance."));

        repl.respond("/clear").await.unwrap();
        assert!(repl.session().history().is_empty());
        assert_eq!(repl.respond("/history").await.unwrap(), "No questions yet.");
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_gate_closed() {
        let dir = tempfile::tempdir().unwrap();
        let mut repl = repl(dir.path(), ChatSession::new());

        let reply = repl.respond("/upload /definitely/missing.pdf").await.unwrap();
        assert!(reply.starts_with("File not uploaded"));
        assert!(!repl.session().is_uploaded());
    }

    #[tokio::test]
    async fn test_preloaded_session_accepts_questions() {
        let dir = tempfile::tempdir().unwrap();
        let mut repl = repl(dir.path(), ChatSession::preloaded());
        let reply = repl.respond("anything?").await.unwrap();
        assert_eq!(reply, "Attention weighs tokens.");
    }
}
