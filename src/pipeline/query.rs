use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use crate::db::Db;
use crate::db::search::SearchResult;
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::llm::ChatModel;
use crate::loader::{Document, DocumentMetadata};
use crate::prompt::{PromptTemplate, stuff_documents};

/// A generated answer and the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    #[serde(serialize_with = "serialize_sources")]
    pub source_documents: Vec<Document>,
}

#[derive(Serialize)]
struct SourceView<'a> {
    source: &'a str,
    page: usize,
    page_content: &'a str,
}

fn serialize_sources<S: serde::Serializer>(
    docs: &[Document],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(docs.iter().map(|d| SourceView {
        source: &d.metadata.source,
        page: d.metadata.page,
        page_content: &d.page_content,
    }))
}

impl From<SearchResult> for Document {
    fn from(hit: SearchResult) -> Self {
        Document {
            page_content: hit.content,
            metadata: DocumentMetadata {
                source: hit.source,
                page: hit.page,
            },
        }
    }
}

/// Answers questions from the chunks stored in one collection.
pub struct QuestionProcessor {
    pub db: Arc<TokioMutex<Db>>,
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatModel>,
    pub template: PromptTemplate,
    pub collection: String,
    pub top_k: usize,
}

impl QuestionProcessor {
    /// Retrieve context for `question`, fill the prompt and ask the model.
    pub async fn process(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::process_prompt("question is empty"));
        }
        info!("Processing question: {question}");

        let source_documents = self.retrieve(question).await?;
        if source_documents.is_empty() {
            warn!(
                "No context found in collection '{}'; answering without it",
                self.collection
            );
        }

        let vars = HashMap::from([
            ("context", stuff_documents(&source_documents)),
            ("input", question.to_string()),
        ]);
        let messages = self.template.format(&vars).map_err(Error::process_prompt)?;

        let answer = self
            .chat
            .chat(&messages)
            .await
            .map_err(Error::process_prompt)?;
        debug!(
            "Answer from {}: {} chars",
            self.chat.model_name(),
            answer.chars().count()
        );

        Ok(Answer {
            answer,
            source_documents,
        })
    }

    /// The `top_k` chunks closest to `question`, closest first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<Document>> {
        let query_vector = self.embedder.embed(question).map_err(Error::process_prompt)?;

        let db = self.db.lock().await;
        let hits = db
            .search(&self.collection, &query_vector, self.top_k)
            .map_err(Error::process_prompt)?;
        debug!("Retrieved {} chunks", hits.len());

        Ok(hits.into_iter().map(Document::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Chunk, NewUpload};
    use crate::embedder::mock::MockEmbedder;
    use crate::llm::Role;
    use crate::llm::mock::ScriptedChat;
    use chrono::Utc;

    async fn seeded_db(embedder: &MockEmbedder, contents: &[&str]) -> Arc<TokioMutex<Db>> {
        let mut db = Db::open_in_memory(embedder.dimensions).unwrap();
        if !contents.is_empty() {
            let chunks: Vec<Chunk> = contents
                .iter()
                .enumerate()
                .map(|(i, &content)| Chunk {
                    source: "dl.pdf",
                    page: i,
                    position: i,
                    content,
                })
                .collect();
            let vectors = embedder.embed_batch(contents).unwrap();
            let upload = NewUpload {
                source: "dl.pdf",
                page_count: contents.len(),
                uploaded_at: Utc::now(),
            };
            db.add_documents("papers", &upload, &chunks, &vectors)
                .unwrap();
        }
        Arc::new(TokioMutex::new(db))
    }

    fn processor(
        db: Arc<TokioMutex<Db>>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> QuestionProcessor {
        QuestionProcessor {
            db,
            embedder,
            chat,
            template: PromptTemplate::rag("LLM Expert"),
            collection: "papers".to_string(),
            top_k,
        }
    }

    #[tokio::test]
    async fn test_answer_with_sources() {
        let embedder = Arc::new(MockEmbedder::default());
        let db = seeded_db(&embedder, &["Dropout zeroes activations.", "Adam is an optimizer."]).await;
        let chat = Arc::new(ScriptedChat::answering("It is a regularizer."));
        let processor = processor(db, embedder, chat.clone(), 4);

        let answer = processor.process("Dropout zeroes activations.").await.unwrap();
        assert_eq!(answer.answer, "It is a regularizer.");
        assert_eq!(answer.source_documents.len(), 2);
        // Identical text embeds to the identical vector, so it ranks first
        assert_eq!(answer.source_documents[0].page_content, "Dropout zeroes activations.");
        assert_eq!(answer.source_documents[0].metadata.source, "dl.pdf");
        assert_eq!(answer.source_documents[0].metadata.page, 0);

        let requests = chat.requests();
        assert_eq!(requests.len(), 1);
        let messages = &requests[0];
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].content, "You experienced LLM Expert");
        assert_eq!(messages[3].role, Role::Human);
        assert_eq!(
            messages[3].content,
            "Given this context: Dropout zeroes activations.\n\nAdam is an optimizer.\n\
             Please answer this question: Dropout zeroes activations."
        );
    }

    #[tokio::test]
    async fn test_top_k_limits_context() {
        let embedder = Arc::new(MockEmbedder::default());
        let db = seeded_db(&embedder, &["one", "two", "three", "four", "five", "six"]).await;
        let chat = Arc::new(ScriptedChat::answering("ok"));
        let processor = processor(db, embedder, chat, 4);

        let answer = processor.process("two").await.unwrap();
        assert_eq!(answer.source_documents.len(), 4);
        assert_eq!(answer.source_documents[0].page_content, "two");
    }

    #[tokio::test]
    async fn test_empty_collection_still_asks_model() {
        let embedder = Arc::new(MockEmbedder::default());
        let db = seeded_db(&embedder, &[]).await;
        let chat = Arc::new(ScriptedChat::answering("I don't know."));
        let processor = processor(db, embedder, chat.clone(), 4);

        let answer = processor.process("anything?").await.unwrap();
        assert!(answer.source_documents.is_empty());
        assert!(chat.requests()[0][3].content.starts_with("Given this context: \n"));
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let embedder = Arc::new(MockEmbedder::default());
        let db = seeded_db(&embedder, &[]).await;
        let chat = Arc::new(ScriptedChat::answering("unused"));
        let processor = processor(db, embedder.clone(), chat.clone(), 4);

        let err = processor.process("   ").await.unwrap_err();
        assert!(matches!(err, Error::ProcessPrompt(_)));
        assert_eq!(embedder.calls(), 0);
        assert!(chat.requests().is_empty());
    }

    #[tokio::test]
    async fn test_chat_failure_is_process_prompt_error() {
        let embedder = Arc::new(MockEmbedder::default());
        let db = seeded_db(&embedder, &["context"]).await;
        let chat = Arc::new(ScriptedChat::failing("connection refused"));
        let processor = processor(db, embedder, chat, 4);

        let err = processor.process("question").await.unwrap_err();
        assert!(err.to_string().starts_with("There is error in ProcessPrompt : "));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_embedder_failure_skips_model() {
        let db = Arc::new(TokioMutex::new(Db::open_in_memory(384).unwrap()));
        let chat = Arc::new(ScriptedChat::answering("unused"));
        let processor = processor(
            db,
            Arc::new(MockEmbedder::failing("no model")),
            chat.clone(),
            4,
        );

        let err = processor.process("question").await.unwrap_err();
        assert!(matches!(err, Error::ProcessPrompt(_)));
        assert!(chat.requests().is_empty());
    }

    #[test]
    fn test_answer_serializes_sources() {
        let answer = Answer {
            answer: "yes".to_string(),
            source_documents: vec![Document {
                page_content: "text".to_string(),
                metadata: DocumentMetadata {
                    source: "a.pdf".to_string(),
                    page: 3,
                },
            }],
        };
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["answer"], "yes");
        assert_eq!(json["source_documents"][0]["source"], "a.pdf");
        assert_eq!(json["source_documents"][0]["page"], 3);
        assert_eq!(json["source_documents"][0]["page_content"], "text");
    }
}
