//! In-memory vector store

use async_trait::async_trait;
use std::sync::RwLock;

use ragstream_core::{Error, Result, ScoredDocument, SearchConfig, VectorDocument, VectorStore};

/// Local in-memory vector store implementation.
///
/// Documents keep their insertion order, so hits with equal scores come back
/// in the order they were stored.
pub struct LocalVectorStore {
    documents: RwLock<Vec<VectorDocument>>,
}

impl LocalVectorStore {
    /// Create a new local vector store
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
        }
    }
}

impl Default for LocalVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity; zero for mismatched or zero-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn store_batch(&self, documents: Vec<VectorDocument>) -> Result<usize> {
        let mut docs = self
            .documents
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        let count = documents.len();
        docs.extend(documents);
        Ok(count)
    }

    async fn search_by_vector(
        &self,
        vector: &[f32],
        config: &SearchConfig,
    ) -> Result<Vec<ScoredDocument>> {
        let docs = self
            .documents
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let mut results: Vec<ScoredDocument> = docs
            .iter()
            .map(|doc| ScoredDocument {
                score: cosine_similarity(vector, &doc.embedding),
                document: doc.document.clone(),
            })
            .filter(|hit| match config.score_threshold {
                Some(threshold) => hit.score >= threshold,
                None => true,
            })
            .collect();

        // stable sort keeps insertion order among ties
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(config.top_k);

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let docs = self
            .documents
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(docs.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut docs = self
            .documents
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        docs.clear();
        Ok(())
    }
}
