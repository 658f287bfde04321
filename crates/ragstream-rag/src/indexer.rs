//! Document indexer: split, embed, store

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use ragstream_core::{
    Document, DocumentLoader, Embedder, IndexingConfig, IndexingResult, Result, VectorDocument,
    VectorStore,
};

use crate::RecursiveTextSplitter;

/// Builds the retrieval index once at startup
pub struct DocumentIndexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    splitter: RecursiveTextSplitter,
    config: IndexingConfig,
}

impl DocumentIndexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: IndexingConfig,
    ) -> Result<Self> {
        let splitter = RecursiveTextSplitter::from_config(&config)?;
        Ok(Self {
            embedder,
            store,
            splitter,
            config,
        })
    }

    /// Load everything from `loader` and index it
    pub async fn index(&self, loader: &dyn DocumentLoader) -> Result<IndexingResult> {
        let documents = loader.load().await?;
        self.index_documents(documents).await
    }

    /// Split, embed and store documents in batches.
    ///
    /// A batch that fails to embed or store is recorded in
    /// [`IndexingResult::errors`] and the remaining batches still run.
    pub async fn index_documents(&self, documents: Vec<Document>) -> Result<IndexingResult> {
        let mut result = IndexingResult {
            documents_indexed: documents.len(),
            ..Default::default()
        };

        let mut chunks = self.splitter.split_documents(&documents);
        for chunk in &mut chunks {
            let index = chunk.metadata.get("chunk_index").cloned().unwrap_or(json!(0));
            let id = format!("{:x}-{}", md5::compute(chunk.source.as_bytes()), index);
            chunk.metadata.insert("chunk_id".to_string(), json!(id));
        }
        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        let batch_size = self.config.batch_size.max(1);
        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = match self.embedder.embed_documents(&texts).await {
                Ok(embeddings) => embeddings,
                Err(e) => {
                    warn!("Failed to embed batch {}: {}", batch_no, e);
                    result.errors.push(format!("Failed to embed batch {}: {}", batch_no, e));
                    continue;
                }
            };

            let vector_docs: Vec<VectorDocument> = batch
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(document, embedding)| VectorDocument {
                    document,
                    embedding,
                })
                .collect();

            match self.store.store_batch(vector_docs).await {
                Ok(stored) => result.chunks_indexed += stored,
                Err(e) => {
                    warn!("Failed to store batch {}: {}", batch_no, e);
                    result.errors.push(format!("Failed to store batch {}: {}", batch_no, e));
                }
            }
        }

        info!(
            "Indexed {} chunks from {} documents ({} errors)",
            result.chunks_indexed,
            result.documents_indexed,
            result.errors.len()
        );
        Ok(result)
    }
}
