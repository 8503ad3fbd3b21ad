//! # pdfqa — question answering over uploaded PDFs
//!
//! Uploaded PDFs are split into overlapping chunks, embedded locally and
//! stored in a persistent vector store. Questions are answered by a chat
//! model from the chunks closest to them.
//!
//! ## Architecture
//!
//! - **[`config`]** — JSON configuration with environment overrides
//! - **[`loader`]** / **[`splitter`]** — PDF pages to overlapping text chunks
//! - **[`embedder`]** — Text embedding via ONNX Runtime (all-MiniLM-L6-v2)
//! - **[`db`]** — SQLite + sqlite-vec vector store, one collection per name
//! - **[`prompt`]** / **[`llm`]** — Prompt template and Ollama chat client
//! - **[`pipeline`]** — The upload and question pipelines
//! - **[`session`]** — Chat history and upload state
//! - **[`repl`]** / **[`mcp`]** — Terminal chat and MCP server (stdio via rmcp)

pub mod app;
pub mod config;
pub mod db;
pub mod embedder;
pub mod error;
pub mod llm;
pub mod loader;
pub mod mcp;
pub mod pipeline;
pub mod prompt;
pub mod repl;
pub mod session;
pub mod splitter;

pub use error::{Error, Result};
