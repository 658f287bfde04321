//! OpenAI-compatible model clients for ragstream
//!
//! This crate provides the OpenAI implementations of the `ChatModel` and
//! `Embedder` traits. Any server speaking the same HTTP API works by pointing
//! `OPENAI_API_BASE` at it.

mod client;
mod config;
mod embeddings;
mod sse;


pub use client::ChatOpenAI;
pub use config::{DEFAULT_API_BASE, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, OpenAIConfig};
pub use embeddings::OpenAIEmbeddings;

// Re-export core types for convenience
pub use ragstream_core::{ChatModel, Embedder, Error, GenerationConfig, MessageChunk, Result};
