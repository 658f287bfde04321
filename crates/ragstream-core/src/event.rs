//! Pipeline lifecycle events
//!
//! A running pipeline reports what it is doing as a sequence of
//! [`PipelineEvent`]s: a stage starts, optionally streams chunks, and ends
//! with its output. Every event carries the [`Tags`] of the stage that
//! produced it plus those of every enclosing chain, so consumers can tell a
//! nested contextualization model apart from the final answer model.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ChatMessage, Document, Error, MessageChunk};

/// Lifecycle phase of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    Stream,
    End,
}

/// What kind of runnable produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Chain,
    Prompt,
    ChatModel,
    Retriever,
    Parser,
}

/// A stage identifier attached to events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    /// The top-level question answering chain
    MainChain,
    /// The question contextualization sub-chain
    ContextualizeChain,
    /// The document retriever
    Retriever,
    /// 1-based position of a stage inside its enclosing sequence
    Step(u8),
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::MainChain => f.write_str("main_chain"),
            Tag::ContextualizeChain => f.write_str("contextualize_q_chain"),
            Tag::Retriever => f.write_str("retriever"),
            Tag::Step(n) => write!(f, "seq:step:{}", n),
        }
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main_chain" => Ok(Tag::MainChain),
            "contextualize_q_chain" => Ok(Tag::ContextualizeChain),
            "retriever" => Ok(Tag::Retriever),
            _ => s
                .strip_prefix("seq:step:")
                .and_then(|n| n.parse::<u8>().ok())
                .map(Tag::Step)
                .ok_or_else(|| Error::InvalidInput(format!("Unknown tag: {}", s))),
        }
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The set of tags carried by an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeSet<Tag>);

impl Tags {
    pub fn contains(&self, tag: Tag) -> bool {
        self.0.contains(&tag)
    }

    /// True when every tag in `required` is present
    pub fn contains_all(&self, required: &[Tag]) -> bool {
        required.iter().all(|tag| self.0.contains(tag))
    }

    /// Tags of a child stage: the parent's tags plus the child's own
    pub fn merged(&self, own: &Tags) -> Tags {
        Tags(self.0.union(&own.0).copied().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Tags(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Tag; N]> for Tags {
    fn from(tags: [Tag; N]) -> Self {
        tags.into_iter().collect()
    }
}

/// The data carried by an event. Which variant appears depends on the event
/// kind and the stage: model stream events carry message chunks, retriever
/// end events carry documents, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EventPayload {
    MessageChunk(MessageChunk),
    Text(String),
    Messages(Vec<ChatMessage>),
    Documents(Vec<Document>),
    Empty,
}

impl EventPayload {
    /// Name of the payload variant, used in shape mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::MessageChunk(_) => "MessageChunk",
            EventPayload::Text(_) => "Text",
            EventPayload::Messages(_) => "Messages",
            EventPayload::Documents(_) => "Documents",
            EventPayload::Empty => "Empty",
        }
    }
}

/// One lifecycle event emitted by a running pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub kind: EventKind,
    pub stage: StageKind,
    pub name: String,
    pub tags: Tags,
    pub payload: EventPayload,
}

/// Identity of one stage inside a constructed pipeline.
///
/// Built once when the pipeline is assembled, with the tags of every
/// enclosing chain already folded in, and then stamped onto each event the
/// stage emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLabel {
    pub stage: StageKind,
    pub name: String,
    pub tags: Tags,
}

impl StageLabel {
    pub fn new(stage: StageKind, name: impl Into<String>, tags: Tags) -> Self {
        Self {
            stage,
            name: name.into(),
            tags,
        }
    }

    /// Label of a stage nested inside this one
    pub fn child(&self, stage: StageKind, name: impl Into<String>, own: Tags) -> Self {
        Self::new(stage, name, self.tags.merged(&own))
    }

    pub fn event(&self, kind: EventKind, payload: EventPayload) -> PipelineEvent {
        PipelineEvent {
            kind,
            stage: self.stage,
            name: self.name.clone(),
            tags: self.tags.clone(),
            payload,
        }
    }

    pub fn start(&self, payload: EventPayload) -> PipelineEvent {
        self.event(EventKind::Start, payload)
    }

    pub fn stream(&self, payload: EventPayload) -> PipelineEvent {
        self.event(EventKind::Stream, payload)
    }

    pub fn end(&self, payload: EventPayload) -> PipelineEvent {
        self.event(EventKind::End, payload)
    }
}
