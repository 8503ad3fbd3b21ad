use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdfqa::app::AppContext;
use pdfqa::config::Config;
use pdfqa::db::Db;
use pdfqa::mcp::server::{McpContext, McpServer};
use pdfqa::repl::Repl;
use pdfqa::session::ChatSession;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pdfqa", version, about = "Ask questions about your PDFs")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the MCP tools on stdio
    Serve {
        /// Accept questions before anything is uploaded in this session
        #[arg(long)]
        skip_upload: bool,
    },
    /// Interactive chat in the terminal
    Chat {
        /// Accept questions before anything is uploaded in this session
        #[arg(long)]
        skip_upload: bool,
    },
    /// Index a PDF
    Upload { path: PathBuf },
    /// Ask one question about the indexed PDFs
    Ask { question: String },
    /// List indexed PDFs
    Uploads,
    /// Delete everything stored in the configured collection
    Reset,
}

fn session(skip_upload: bool) -> ChatSession {
    if skip_upload {
        ChatSession::preloaded()
    } else {
        ChatSession::new()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the MCP transport, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    match cli.command {
        Command::Uploads => {
            let db = Db::open(&config.db_path, config.model.dimensions)
                .context("failed to open database")?;
            let stats = db.collection_stats(&config.collection_name)?;
            println!(
                "Collection {}: {} uploads, {} chunks",
                config.collection_name, stats.uploads, stats.chunks
            );
            for upload in db.list_uploads(&config.collection_name)? {
                println!(
                    "  {}  {} pages, {} chunks, {}",
                    upload.source,
                    upload.page_count,
                    upload.chunk_count,
                    upload.uploaded_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Reset => {
            let mut db = Db::open(&config.db_path, config.model.dimensions)
                .context("failed to open database")?;
            if db.reset_collection(&config.collection_name)? {
                println!("Collection {} cleared", config.collection_name);
            } else {
                println!("Collection {} does not exist", config.collection_name);
            }
        }
        Command::Upload { path } => {
            let app = AppContext::from_config(config).await?;
            let report = app.uploader().upload_file(&path).await?;
            println!(
                "File uploaded: {} ({} pages, {} chunks)",
                report.source, report.pages, report.chunks
            );
        }
        Command::Ask { question } => {
            let app = AppContext::from_config(config).await?;
            let answer = app.processor().process(&question).await?;
            println!("{}", answer.answer);
            for doc in &answer.source_documents {
                println!("- {} (page {})", doc.metadata.source, doc.metadata.page + 1);
            }
        }
        Command::Chat { skip_upload } => {
            let app = AppContext::from_config(config).await?;
            Repl::new(app, session(skip_upload)).run().await?;
        }
        Command::Serve { skip_upload } => {
            info!("Starting pdfqa MCP server...");
            let app = AppContext::from_config(config).await?;
            McpServer::new(McpContext::new(app, session(skip_upload)))
                .start()
                .await?;
        }
    }

    Ok(())
}
