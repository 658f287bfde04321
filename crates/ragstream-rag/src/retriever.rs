//! Similarity-search retriever over a vector store

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use ragstream_core::{Document, Embedder, Result, Retriever, SearchConfig, VectorStore};

/// Embeds the query and returns the closest chunks, best first
pub struct VectorStoreRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    search: SearchConfig,
}

impl VectorStoreRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            search: SearchConfig::default(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.search.top_k = top_k;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.search.score_threshold = Some(threshold);
        self
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let query_vector = self.embedder.embed_query(query).await?;
        let hits = self.store.search_by_vector(&query_vector, &self.search).await?;
        debug!("Retrieved {} documents for query", hits.len());
        Ok(hits.into_iter().map(|hit| hit.document).collect())
    }
}
