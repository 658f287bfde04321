//! Core traits and types for ragstream
//!
//! This crate defines the types shared across the workspace: chat model and
//! embedding provider traits, vector stores, loaders and retrievers, and the
//! pipeline event model consumed by the SSE relay.

pub mod document;
pub mod error;
pub mod event;
pub mod llm;
pub mod loader;
pub mod pipeline;
pub mod vector_store;

pub use document::{Document, format_docs};
pub use error::{Error, Result};
pub use event::{EventKind, EventPayload, PipelineEvent, StageKind, StageLabel, Tag, Tags};
pub use llm::{ChatMessage, ChatModel, ChunkStream, Embedder, GenerationConfig, MessageChunk, Role};
pub use loader::{DocumentLoader, IndexingConfig, IndexingResult, Retriever};
pub use pipeline::{ChainInput, EventStream, Pipeline, Variant};
pub use vector_store::{ScoredDocument, SearchConfig, VectorDocument, VectorStore};
