/// MCP tool handlers for pdfqa.
///
/// 1. upload_pdf    – index a PDF into the collection
/// 2. ask           – answer a question from the indexed PDFs
/// 3. chat_history  – the question/answer exchanges of this session
/// 4. clear_history – forget the session's exchanges
/// 5. list_uploads  – PDFs indexed in the collection
use crate::mcp::server::McpContext;
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct FilepathParam {
    /// Path to the PDF file
    filepath: String,
}

#[derive(Deserialize, JsonSchema)]
struct AskParams {
    /// Question about the uploaded documents
    question: String,
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Upload a PDF: split it into chunks, embed them and store them for question answering")]
    async fn upload_pdf(
        &self,
        params: Parameters<FilepathParam>,
    ) -> Result<CallToolResult, McpError> {
        let filepath = params.0.filepath.trim();
        if filepath.is_empty() {
            return error_result("filepath is required");
        }

        let path = Path::new(filepath);
        if !path.is_file() {
            return error_result(&format!("file not found: {filepath}"));
        }

        match self.ctx.app.uploader().upload_file(path).await {
            Ok(report) => {
                self.ctx.session.lock().await.mark_uploaded();
                json_result(serde_json::json!({
                    "status": "uploaded",
                    "source": report.source,
                    "pages": report.pages,
                    "chunks": report.chunks,
                }))
            }
            Err(e) => {
                warn!("Upload of {filepath} failed: {e}");
                error_result(&e.to_string())
            }
        }
    }

    #[tool(description = "Ask a question; the answer is generated from the most relevant chunks of the uploaded PDFs")]
    async fn ask(&self, params: Parameters<AskParams>) -> Result<CallToolResult, McpError> {
        let question = params.0.question;
        if question.trim().is_empty() {
            return error_result("question is required");
        }
        if !self.ctx.session.lock().await.is_uploaded() {
            return error_result("No PDF uploaded yet. Call upload_pdf first.");
        }

        let answer = match self.ctx.app.processor().process(&question).await {
            Ok(answer) => answer,
            Err(e) => return error_result(&e.to_string()),
        };

        let entry = self.ctx.session.lock().await.record(&question, &answer).clone();
        json_result(serde_json::json!({
            "answer": entry.answer,
            "contexts": entry.contexts,
            "sources": answer.source_documents.iter().map(|d| serde_json::json!({
                "source": d.metadata.source,
                "page": d.metadata.page,
            })).collect::<Vec<_>>(),
        }))
    }

    #[tool(description = "Show the questions and answers of this session")]
    async fn chat_history(&self) -> Result<CallToolResult, McpError> {
        let session = self.ctx.session.lock().await;
        json_result(serde_json::json!({ "history": session.history() }))
    }

    #[tool(description = "Clear the chat history of this session")]
    async fn clear_history(&self) -> Result<CallToolResult, McpError> {
        let mut session = self.ctx.session.lock().await;
        let cleared = session.history().len();
        session.clear();
        json_result(serde_json::json!({ "cleared": cleared }))
    }

    #[tool(description = "List the PDFs indexed in the current collection")]
    async fn list_uploads(&self) -> Result<CallToolResult, McpError> {
        let collection = &self.ctx.app.config.collection_name;
        let db = self.ctx.app.db.lock().await;
        let uploads = db
            .list_uploads(collection)
            .map_err(|e| McpError::internal_error(format!("list failed: {e}"), None))?;

        let uploads: Vec<serde_json::Value> = uploads
            .iter()
            .map(|u| {
                serde_json::json!({
                    "source": u.source,
                    "pages": u.page_count,
                    "chunks": u.chunk_count,
                    "uploaded_at": u.uploaded_at.to_rfc3339(),
                })
            })
            .collect();

        json_result(serde_json::json!({
            "collection": collection,
            "uploads": uploads,
        }))
    }
}
