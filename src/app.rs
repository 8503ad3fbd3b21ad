/// Shared application state, built once at startup.
///
/// Every surface (one-shot CLI commands, the chat REPL, the MCP server)
/// talks to the pipelines through an [`AppContext`].
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex as TokioMutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Db;
use crate::embedder::Embedder;
use crate::embedder::download::ensure_model_files;
use crate::embedder::onnx::OnnxEmbedder;
use crate::llm::ChatModel;
use crate::llm::ollama::OllamaChat;
use crate::pipeline::{QuestionProcessor, Uploader};
use crate::prompt::PromptTemplate;
use crate::splitter::RecursiveCharacterTextSplitter;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub db: Arc<TokioMutex<Db>>,
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatModel>,
}

impl AppContext {
    /// Assemble a context from already built parts.
    pub fn new(
        config: Config,
        db: Db,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            db: Arc::new(TokioMutex::new(db)),
            embedder,
            chat,
        }
    }

    /// Open the store, fetch the embedding model if needed and connect the
    /// chat client.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = Db::open(&config.db_path, config.model.dimensions)
            .with_context(|| format!("failed to open database: {}", config.db_path))?;
        info!("Vector store: {}", config.db_path);

        let model_name = config.model.name.clone();
        let model_dir = config.model_dir();
        let dimensions = config.model.dimensions;
        let embedder = tokio::task::spawn_blocking(move || -> Result<OnnxEmbedder> {
            ensure_model_files(&model_name, &model_dir)?;
            OnnxEmbedder::new(&model_dir, dimensions).context("failed to load embedding model")
        })
        .await
        .context("embedding model loader panicked")??;

        let chat = OllamaChat::new(&config.llm).context("failed to create chat client")?;
        if !chat.health_check().await {
            warn!(
                "Ollama is not reachable at {}; questions will fail until it is running",
                config.llm.base_url
            );
        }

        Ok(Self::new(config, db, Arc::new(embedder), Arc::new(chat)))
    }

    pub fn uploader(&self) -> Uploader {
        Uploader {
            db: self.db.clone(),
            embedder: self.embedder.clone(),
            splitter: RecursiveCharacterTextSplitter::new(
                self.config.chunk_size,
                self.config.chunk_overlap,
            ),
            temp_dir: self.config.temp_dir(),
            collection: self.config.collection_name.clone(),
        }
    }

    pub fn processor(&self) -> QuestionProcessor {
        QuestionProcessor {
            db: self.db.clone(),
            embedder: self.embedder.clone(),
            chat: self.chat.clone(),
            template: PromptTemplate::rag(&self.config.role),
            collection: self.config.collection_name.clone(),
            top_k: self.config.search_top_k,
        }
    }
}
