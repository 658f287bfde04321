//! Document loader and retriever traits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Document, Result};

/// Result of an indexing operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingResult {
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    pub errors: Vec<String>,
}

/// Configuration for document splitting and indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_size: 64,
        }
    }
}

/// Trait for document loaders (web pages, local files, ...)
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load every document this loader points at
    async fn load(&self) -> Result<Vec<Document>>;
}

/// Trait for retrievers
///
/// Returned documents are ordered by relevance, most relevant first. The
/// relay forwards them to the client in exactly this order.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>>;
}
