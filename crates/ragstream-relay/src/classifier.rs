//! Event classifier
//!
//! Turns pipeline events into client messages using a small rule table
//! built once per pipeline variant. Rules are checked in order and the first
//! one whose event kind, stage and required tags all match decides the
//! outcome. Events no rule matches are dropped.

use ragstream_core::{
    Error, EventKind, EventPayload, PipelineEvent, Result, StageKind, Tag, Variant,
};

use crate::{OutboundMessage, serialize_chunk};

/// What the relay should do with one event
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Send this message to the client
    Emit(OutboundMessage),
    /// The answer model finished; log it, send nothing
    GenerationComplete,
    /// Nothing to send
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Answer,
    Reformulated,
    Context,
    GenerationEnd,
}

#[derive(Debug, Clone)]
struct Rule {
    kind: EventKind,
    stage: StageKind,
    required: Vec<Tag>,
    /// Only match when the payload is a document list
    needs_documents: bool,
    category: Category,
}

impl Rule {
    fn new(kind: EventKind, stage: StageKind, category: Category) -> Self {
        Self {
            kind,
            stage,
            required: Vec::new(),
            needs_documents: false,
            category,
        }
    }

    fn tagged(mut self, required: &[Tag]) -> Self {
        self.required = required.to_vec();
        self
    }

    fn with_documents(mut self) -> Self {
        self.needs_documents = true;
        self
    }

    fn matches(&self, event: &PipelineEvent) -> bool {
        event.kind == self.kind
            && event.stage == self.stage
            && event.tags.contains_all(&self.required)
            && (!self.needs_documents || matches!(event.payload, EventPayload::Documents(_)))
    }
}

/// Classifies events for one pipeline variant
#[derive(Debug, Clone)]
pub struct EventClassifier {
    variant: Variant,
    rules: Vec<Rule>,
}

impl EventClassifier {
    pub fn new(variant: Variant) -> Self {
        let rules = match variant {
            Variant::Contextualized => vec![
                Rule::new(EventKind::Stream, StageKind::ChatModel, Category::Answer)
                    .tagged(&[Tag::Step(3), Tag::MainChain]),
                Rule::new(EventKind::Stream, StageKind::ChatModel, Category::Reformulated)
                    .tagged(&[Tag::Step(2), Tag::MainChain, Tag::ContextualizeChain]),
                Rule::new(EventKind::End, StageKind::Retriever, Category::Context)
                    .tagged(&[Tag::MainChain, Tag::Retriever])
                    .with_documents(),
                Rule::new(EventKind::End, StageKind::ChatModel, Category::GenerationEnd),
            ],
            Variant::Basic => vec![
                Rule::new(EventKind::Stream, StageKind::ChatModel, Category::Answer),
                Rule::new(EventKind::End, StageKind::Retriever, Category::Context),
                Rule::new(EventKind::End, StageKind::ChatModel, Category::GenerationEnd),
            ],
        };
        Self { variant, rules }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Classify one event.
    ///
    /// Depends only on the event, so classifying the same event twice gives
    /// the same answer. Fails when a token event does not carry a message
    /// chunk, or a context event does not carry documents.
    pub fn classify(&self, event: &PipelineEvent) -> Result<Classification> {
        let Some(rule) = self.rules.iter().find(|rule| rule.matches(event)) else {
            return Ok(Classification::Discard);
        };

        let message = match rule.category {
            Category::Answer => {
                non_empty(serialize_chunk(&event.payload)?).map(OutboundMessage::answer)
            }
            Category::Reformulated => {
                non_empty(serialize_chunk(&event.payload)?).map(OutboundMessage::reformulated)
            }
            Category::Context => match &event.payload {
                EventPayload::Documents(documents) => Some(OutboundMessage::context(documents)),
                other => {
                    return Err(Error::PayloadShape {
                        actual: other.type_name(),
                    });
                }
            },
            Category::GenerationEnd => return Ok(Classification::GenerationComplete),
        };
        Ok(message.map_or(Classification::Discard, Classification::Emit))
    }
}

/// Empty tokens are suppressed
fn non_empty(text: &str) -> Option<&str> {
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragstream_core::{Document, MessageChunk, Tags};

    fn event(kind: EventKind, stage: StageKind, tags: &[Tag], payload: EventPayload) -> PipelineEvent {
        PipelineEvent {
            kind,
            stage,
            name: "test".to_string(),
            tags: tags.iter().copied().collect::<Tags>(),
            payload,
        }
    }

    fn chunk(text: &str) -> EventPayload {
        EventPayload::MessageChunk(MessageChunk::new(text))
    }

    #[test]
    fn test_answer_token() {
        let classifier = EventClassifier::new(Variant::Contextualized);
        let ev = event(
            EventKind::Stream,
            StageKind::ChatModel,
            &[Tag::MainChain, Tag::Step(3)],
            chunk("Paris"),
        );
        assert_eq!(
            classifier.classify(&ev).unwrap(),
            Classification::Emit(OutboundMessage::answer("Paris"))
        );
    }

    #[test]
    fn test_reformulated_token() {
        let classifier = EventClassifier::new(Variant::Contextualized);
        let ev = event(
            EventKind::Stream,
            StageKind::ChatModel,
            &[Tag::MainChain, Tag::Step(1), Tag::ContextualizeChain, Tag::Step(2)],
            chunk("What is"),
        );
        assert_eq!(
            classifier.classify(&ev).unwrap(),
            Classification::Emit(OutboundMessage::reformulated("What is"))
        );
    }

    #[test]
    fn test_reformulation_needs_contextualize_tag() {
        let classifier = EventClassifier::new(Variant::Contextualized);
        let ev = event(
            EventKind::Stream,
            StageKind::ChatModel,
            &[Tag::MainChain, Tag::Step(2)],
            chunk("x"),
        );
        assert_eq!(classifier.classify(&ev).unwrap(), Classification::Discard);
    }

    #[test]
    fn test_parser_stream_is_not_a_token() {
        let classifier = EventClassifier::new(Variant::Contextualized);
        let ev = event(
            EventKind::Stream,
            StageKind::Parser,
            &[Tag::MainChain, Tag::ContextualizeChain, Tag::Step(1), Tag::Step(3)],
            EventPayload::Text("What".into()),
        );
        assert_eq!(classifier.classify(&ev).unwrap(), Classification::Discard);
    }

    #[test]
    fn test_context_batch_keeps_order() {
        let classifier = EventClassifier::new(Variant::Contextualized);
        let docs = vec![
            Document::new("one", "a"),
            Document::new("two", "b"),
            Document::new("three", "c"),
        ];
        let ev = event(
            EventKind::End,
            StageKind::Retriever,
            &[Tag::MainChain, Tag::Retriever, Tag::Step(2)],
            EventPayload::Documents(docs.clone()),
        );
        let Classification::Emit(OutboundMessage::ContextBatch(entries)) =
            classifier.classify(&ev).unwrap()
        else {
            panic!("expected a context batch");
        };
        let contents: Vec<&str> = entries.iter().map(|d| d.page_content.as_str()).collect();
        let sources: Vec<&str> = entries.iter().map(|d| d.metadata.source.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(sources, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_contextualized_retriever_end_without_documents_is_dropped() {
        let classifier = EventClassifier::new(Variant::Contextualized);
        let ev = event(
            EventKind::End,
            StageKind::Retriever,
            &[Tag::MainChain, Tag::Retriever],
            EventPayload::Empty,
        );
        assert_eq!(classifier.classify(&ev).unwrap(), Classification::Discard);
    }

    #[test]
    fn test_basic_retriever_end_without_documents_fails() {
        let classifier = EventClassifier::new(Variant::Basic);
        let ev = event(EventKind::End, StageKind::Retriever, &[], EventPayload::Empty);
        assert!(matches!(
            classifier.classify(&ev),
            Err(Error::PayloadShape { actual: "Empty" })
        ));
    }

    #[test]
    fn test_empty_tokens_suppressed() {
        for variant in [Variant::Basic, Variant::Contextualized] {
            let classifier = EventClassifier::new(variant);
            let ev = event(
                EventKind::Stream,
                StageKind::ChatModel,
                &[Tag::MainChain, Tag::Step(3)],
                chunk(""),
            );
            assert_eq!(classifier.classify(&ev).unwrap(), Classification::Discard);
        }
    }

    #[test]
    fn test_generation_end_only_logs() {
        for variant in [Variant::Basic, Variant::Contextualized] {
            let classifier = EventClassifier::new(variant);
            let ev = event(
                EventKind::End,
                StageKind::ChatModel,
                &[Tag::MainChain, Tag::Step(3)],
                chunk("full answer"),
            );
            assert_eq!(
                classifier.classify(&ev).unwrap(),
                Classification::GenerationComplete
            );
        }
    }

    #[test]
    fn test_basic_ignores_tags() {
        let classifier = EventClassifier::new(Variant::Basic);
        let ev = event(EventKind::Stream, StageKind::ChatModel, &[], chunk("hi"));
        assert_eq!(
            classifier.classify(&ev).unwrap(),
            Classification::Emit(OutboundMessage::answer("hi"))
        );

        let ev = event(
            EventKind::End,
            StageKind::Retriever,
            &[],
            EventPayload::Documents(vec![Document::new("d", "s")]),
        );
        assert_eq!(
            classifier.classify(&ev).unwrap(),
            Classification::Emit(OutboundMessage::context(&[Document::new("d", "s")]))
        );
    }

    #[test]
    fn test_start_events_discarded() {
        let classifier = EventClassifier::new(Variant::Contextualized);
        let ev = event(
            EventKind::Start,
            StageKind::ChatModel,
            &[Tag::MainChain, Tag::Step(3)],
            EventPayload::Messages(vec![]),
        );
        assert_eq!(classifier.classify(&ev).unwrap(), Classification::Discard);
    }

    #[test]
    fn test_wrong_chunk_shape_is_an_error() {
        let classifier = EventClassifier::new(Variant::Contextualized);
        let ev = event(
            EventKind::Stream,
            StageKind::ChatModel,
            &[Tag::MainChain, Tag::Step(3)],
            EventPayload::Text("not a chunk".into()),
        );
        assert!(matches!(
            classifier.classify(&ev),
            Err(Error::PayloadShape { actual: "Text" })
        ));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let classifier = EventClassifier::new(Variant::Contextualized);
        let ev = event(
            EventKind::Stream,
            StageKind::ChatModel,
            &[Tag::MainChain, Tag::Step(3)],
            chunk("same"),
        );
        assert_eq!(classifier.classify(&ev).unwrap(), classifier.classify(&ev).unwrap());
    }
}
