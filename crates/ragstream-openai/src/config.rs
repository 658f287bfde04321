//! OpenAI client configuration

use ragstream_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Configuration for the OpenAI-compatible clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub api_base: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
    pub embedding_batch_size: usize,
}

impl OpenAIConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            Error::Configuration("OPENAI_API_KEY environment variable not found".to_string())
        })?;

        let mut config = Self::new(api_key);

        if let Ok(api_base) = env::var("OPENAI_API_BASE") {
            config.api_base = api_base.trim_end_matches('/').to_string();
        }
        if let Ok(model) = env::var("OPENAI_CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Ok(model) = env::var("OPENAI_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(secs) = env::var("OPENAI_TIMEOUT_SECS") {
            config.timeout_secs = secs.parse().map_err(|_| {
                Error::Configuration(format!("OPENAI_TIMEOUT_SECS is not a number: {}", secs))
            })?;
        }

        Ok(config)
    }

    /// Create configuration with explicit values
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout_secs: 120,
            embedding_batch_size: 100,
        }
    }

    /// Point the clients at another OpenAI-compatible server
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let config = OpenAIConfig::new("key").with_api_base("http://localhost:8080/v1/");
        assert_eq!(config.endpoint("/chat/completions"), "http://localhost:8080/v1/chat/completions");
        assert_eq!(config.endpoint("embeddings"), "http://localhost:8080/v1/embeddings");
    }
}
