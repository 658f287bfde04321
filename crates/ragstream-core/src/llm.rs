//! Chat model and embedding provider traits and types

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Result;

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Assistant,
}

/// One message of a chat prompt or of the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A partial unit of generated text, as streamed by a chat model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageChunk {
    pub content: String,
}

impl MessageChunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Stream of message chunks returned by [`ChatModel::stream_chat`]
pub type ChunkStream = BoxStream<'static, Result<MessageChunk>>;

/// Configuration for text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Trait for streaming chat models (e.g., OpenAI-compatible endpoints)
///
/// Implementations start the request eagerly and hand back a stream of
/// chunks; dropping the stream must abandon the upstream request.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start a streaming completion for the given messages
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream>;

    /// Get the model ID being used
    fn model_id(&self) -> &str;
}

/// Trait for text embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of documents, one vector per input in the same order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
