//! MCP surface: a stdio server whose tools drive the upload and query
//! pipelines and one chat session.
pub mod server;
pub mod tools;
