//! The pipeline collaborator interface

use std::fmt;
use std::str::FromStr;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::{ChatMessage, Error, PipelineEvent, Result};

/// Stream of lifecycle events produced by one pipeline run
pub type EventStream = BoxStream<'static, Result<PipelineEvent>>;

/// The two recognized pipeline configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// retrieve → prompt → generate
    Basic,
    /// contextualize → retrieve → prompt → generate
    Contextualized,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Basic => f.write_str("basic"),
            Variant::Contextualized => f.write_str("contextualized"),
        }
    }
}

impl FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(Variant::Basic),
            "contextualized" | "advanced" => Ok(Variant::Contextualized),
            _ => Err(Error::InvalidInput(format!("Unknown pipeline variant: {}", s))),
        }
    }
}

/// Input record for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainInput {
    pub question: String,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
}

impl ChainInput {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            chat_history: Vec::new(),
        }
    }

    pub fn with_history(mut self, chat_history: Vec<ChatMessage>) -> Self {
        self.chat_history = chat_history;
        self
    }
}

/// A runnable question answering pipeline.
///
/// `stream_events` starts a run and returns its event sequence rather than a
/// single answer. A failure inside the run shows up as an `Err` item, after
/// which the stream ends. Dropping the stream cancels the run.
pub trait Pipeline: Send + Sync {
    fn stream_events(&self, input: ChainInput) -> EventStream;

    /// Which configuration this pipeline was built as
    fn variant(&self) -> Variant;
}
