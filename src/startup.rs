//! Builds the application context: index the sources, wire the chain

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use ragstream_chain::{ContextualizePolicy, RagChain};
use ragstream_core::{
    ChatModel, DocumentLoader, Embedder, IndexingConfig, Retriever, VectorStore,
};
use ragstream_openai::{ChatOpenAI, OpenAIConfig, OpenAIEmbeddings};
use ragstream_rag::{DocumentIndexer, FileLoader, LocalVectorStore, VectorStoreRetriever, WebLoader};

use crate::AppState;
use crate::cli::Cli;

pub async fn build_state(cli: &Cli) -> Result<AppState> {
    let config = OpenAIConfig::from_env().context("Failed to load OpenAI configuration")?;
    info!(
        "Using chat model {} and embedding model {} at {}",
        config.chat_model, config.embedding_model, config.api_base
    );
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbeddings::new(config.clone())?);
    let model: Arc<dyn ChatModel> = Arc::new(ChatOpenAI::new(config)?);

    let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::new());
    let indexing = IndexingConfig {
        chunk_size: cli.chunk_size,
        chunk_overlap: cli.chunk_overlap,
        ..Default::default()
    };
    let indexer = DocumentIndexer::new(embedder.clone(), store.clone(), indexing)
        .context("Invalid chunking settings")?;

    let mut loaders: Vec<Box<dyn DocumentLoader>> = Vec::new();
    if !cli.source_urls.is_empty() {
        loaders.push(Box::new(WebLoader::new(&cli.source_urls)?));
    }
    if !cli.source_files.is_empty() {
        loaders.push(Box::new(FileLoader::new(cli.source_files.clone())));
    }
    for loader in &loaders {
        let result = indexer
            .index(loader.as_ref())
            .await
            .context("Failed to index documents")?;
        for error in &result.errors {
            warn!("Indexing error: {}", error);
        }
    }

    let chunks = store.count().await?;
    if chunks == 0 {
        warn!("The index is empty; answers will have no retrieved context");
    }
    info!("Index ready with {} chunks", chunks);

    let mut retriever = VectorStoreRetriever::new(embedder, store).with_top_k(cli.top_k);
    if let Some(threshold) = cli.score_threshold {
        retriever = retriever.with_score_threshold(threshold);
    }
    let retriever: Arc<dyn Retriever> = Arc::new(retriever);
    let policy = if cli.contextualize_with_history_only {
        ContextualizePolicy::WhenHistoryPresent
    } else {
        ContextualizePolicy::Always
    };
    let chain = RagChain::for_variant(cli.variant, model, retriever).with_policy(policy);
    info!("Pipeline variant: {}", cli.variant);

    Ok(AppState::new(Arc::new(chain)))
}
