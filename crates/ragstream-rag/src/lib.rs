//! Retrieval building blocks for ragstream
//!
//! Loaders turn web pages and local files into documents, the splitter cuts
//! them into overlapping chunks, the indexer embeds the chunks into a vector
//! store, and the retriever answers similarity queries against it.

mod indexer;
mod loader;
mod retriever;
mod splitter;
mod vector_store;


pub use indexer::DocumentIndexer;
pub use loader::{DEFAULT_CONTENT_SELECTORS, FileLoader, WebLoader, markdown_to_text, parse_html};
pub use retriever::VectorStoreRetriever;
pub use splitter::RecursiveTextSplitter;
pub use vector_store::{LocalVectorStore, cosine_similarity};

// Re-export core types for convenience
pub use ragstream_core::{Document, DocumentLoader, IndexingConfig, IndexingResult, Retriever};
