//! Streaming chat completions client

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

use ragstream_core::{
    ChatMessage, ChatModel, ChunkStream, Error, GenerationConfig, MessageChunk, Result,
};

use crate::config::OpenAIConfig;
use crate::sse::SseDecoder;

/// Chat model client for OpenAI-compatible `/chat/completions` endpoints.
///
/// Always requests a streamed response and yields one [`MessageChunk`] per
/// upstream delta. Role-only and finish deltas become empty chunks.
pub struct ChatOpenAI {
    config: OpenAIConfig,
    generation: GenerationConfig,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamError {
    error: serde_json::Value,
}

impl ChatOpenAI {
    /// Create a new chat client from configuration
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let generation = GenerationConfig {
            model_id: config.chat_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            ..Default::default()
        };

        let client = Client::builder()
            .timeout(generation.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            config,
            generation,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for ChatOpenAI {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream> {
        let request_body = ChatRequest {
            model: &self.generation.model_id,
            messages,
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_tokens,
            stream: true,
        };

        debug!(model = %self.generation.model_id, messages = messages.len(), "Starting chat completion stream");

        let response = self
            .client
            .post(self.config.endpoint("/chat/completions"))
            .header("Accept", "text/event-stream")
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(e.to_string())
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::LlmProvider(format!(
                "Chat completion request failed with status {}: {}",
                status, error_text
            )));
        }

        let bytes = response
            .bytes_stream()
            .map(|r| r.map_err(|e| Error::Network(e.to_string())))
            .boxed();

        Ok(chunk_stream(bytes))
    }

    fn model_id(&self) -> &str {
        &self.generation.model_id
    }
}

struct ChunkState {
    bytes: BoxStream<'static, Result<Bytes>>,
    decoder: SseDecoder,
    queue: VecDeque<String>,
    finished: bool,
}

/// Turn an upstream SSE byte stream into message chunks.
///
/// Ends at `[DONE]` or when the body ends. A transport or decoding error is
/// yielded once and ends the stream.
pub(crate) fn chunk_stream(bytes: BoxStream<'static, Result<Bytes>>) -> ChunkStream {
    let state = ChunkState {
        bytes,
        decoder: SseDecoder::new(),
        queue: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.queue.pop_front() {
                let data = data.trim();
                if data == "[DONE]" {
                    return None;
                }
                match parse_delta(data) {
                    Ok(Some(chunk)) => return Some((Ok(chunk), state)),
                    Ok(None) => continue,
                    Err(e) => {
                        state.queue.clear();
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
            }

            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    let payloads = state.decoder.push(&bytes);
                    state.queue.extend(payloads);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.finished = true;
                    state.queue.extend(state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}

fn parse_delta(data: &str) -> Result<Option<MessageChunk>> {
    if data.is_empty() {
        return Ok(None);
    }

    if let Ok(StreamError { error }) = serde_json::from_str::<StreamError>(data) {
        return Err(Error::LlmProvider(format!("Upstream stream error: {}", error)));
    }

    let response: StreamResponse = serde_json::from_str(data)
        .map_err(|e| Error::Serialization(format!("Bad stream payload {}: {}", data, e)))?;

    Ok(response
        .choices
        .into_iter()
        .next()
        .map(|choice| MessageChunk::new(choice.delta.content.unwrap_or_default())))
}
