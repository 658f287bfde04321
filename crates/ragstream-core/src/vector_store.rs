//! Vector store trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Document, Result};

/// A document stored in the vector store alongside its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDocument {
    pub document: Document,
    pub embedding: Vec<f32>,
}

/// A search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Configuration for vector search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub top_k: usize,
    pub score_threshold: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            score_threshold: None,
        }
    }
}

/// Trait for vector stores
///
/// Stores are filled once at startup and only searched afterwards, so every
/// method takes `&self`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store multiple documents in batch, returning how many were stored
    async fn store_batch(&self, documents: Vec<VectorDocument>) -> Result<usize>;

    /// Search using a vector embedding, best match first
    async fn search_by_vector(
        &self,
        vector: &[f32],
        config: &SearchConfig,
    ) -> Result<Vec<ScoredDocument>>;

    /// Get the total number of documents
    async fn count(&self) -> Result<usize>;

    /// Clear all documents from the store
    async fn clear(&self) -> Result<()>;
}
