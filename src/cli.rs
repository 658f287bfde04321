//! Command line arguments and logging setup

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ragstream_core::Variant;

pub const DEFAULT_SOURCE_URL: &str = "https://lilianweng.github.io/posts/2023-06-23-agent/";

#[derive(Parser, Debug, Clone)]
#[command(name = "ragstream")]
#[command(about = "Streaming retrieval-augmented question answering over server-sent events", long_about = None)]
pub struct Cli {
    /// Address to bind
    #[arg(long, env = "RAGSTREAM_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "RAGSTREAM_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Pipeline variant: basic or contextualized
    #[arg(long, env = "RAGSTREAM_VARIANT", default_value = "contextualized")]
    pub variant: Variant,

    /// Only contextualize questions that come with chat history
    #[arg(long)]
    pub contextualize_with_history_only: bool,

    /// Directory holding index.html
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Web page to index (repeatable)
    #[arg(long = "source-url", default_value = DEFAULT_SOURCE_URL)]
    pub source_urls: Vec<String>,

    /// Local text or markdown file to index (repeatable)
    #[arg(long = "source-file")]
    pub source_files: Vec<PathBuf>,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared by neighbouring chunks
    #[arg(long, default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Documents returned per question
    #[arg(long, default_value_t = 4)]
    pub top_k: usize,

    /// Minimum cosine similarity for a retrieved document
    #[arg(long)]
    pub score_threshold: Option<f32>,

    /// Default log level; RUST_LOG overrides it
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: Level,
}

impl Cli {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

pub fn init_logging(level: Level) -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(level).into())
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")
}
