//! End-to-end relay scenarios over scripted event sequences

#[cfg(test)]
mod relay_scenarios {
    use futures::{StreamExt, stream};

    use crate::{EventClassifier, OutboundMessage, SseRelay};
    use ragstream_core::{
        Document, EventKind, EventPayload, MessageChunk, PipelineEvent, Result, StageKind, Tag,
        Tags, Variant,
    };

    fn event<const N: usize>(
        kind: EventKind,
        stage: StageKind,
        tags: [Tag; N],
        payload: EventPayload,
    ) -> Result<PipelineEvent> {
        Ok(PipelineEvent {
            kind,
            stage,
            name: format!("{:?}", stage),
            tags: Tags::from(tags),
            payload,
        })
    }

    fn chunk(text: &str) -> EventPayload {
        EventPayload::MessageChunk(MessageChunk::new(text))
    }

    async fn run(variant: Variant, events: Vec<Result<PipelineEvent>>) -> Vec<String> {
        SseRelay::new(stream::iter(events).boxed(), EventClassifier::new(variant))
            .collect()
            .await
    }

    /// What a contextualized run looks like from the outside, trimmed to the
    /// stages the relay cares about plus a few it must ignore
    fn contextualized_run() -> Vec<Result<PipelineEvent>> {
        let ctx_model = [Tag::MainChain, Tag::Step(1), Tag::ContextualizeChain, Tag::Step(2)];
        let ctx_parser = [Tag::MainChain, Tag::Step(1), Tag::ContextualizeChain, Tag::Step(3)];
        let retriever = [Tag::MainChain, Tag::Step(1), Tag::Retriever, Tag::Step(2)];
        let model = [Tag::MainChain, Tag::Step(3)];
        vec![
            event(EventKind::Start, StageKind::Chain, [Tag::MainChain], EventPayload::Text("q".into())),
            event(EventKind::Start, StageKind::ChatModel, ctx_model, EventPayload::Messages(vec![])),
            event(EventKind::Stream, StageKind::ChatModel, ctx_model, chunk("Where is ")),
            event(EventKind::Stream, StageKind::Parser, ctx_parser, EventPayload::Text("Where is ".into())),
            event(EventKind::Stream, StageKind::ChatModel, ctx_model, chunk("it?")),
            event(EventKind::Stream, StageKind::Parser, ctx_parser, EventPayload::Text("it?".into())),
            event(EventKind::End, StageKind::ChatModel, ctx_model, chunk("Where is it?")),
            event(EventKind::Start, StageKind::Retriever, retriever, EventPayload::Text("Where is it?".into())),
            event(
                EventKind::End,
                StageKind::Retriever,
                retriever,
                EventPayload::Documents(vec![
                    Document::new("Eiffel Tower facts", "wiki"),
                    Document::new("Paris guide", "guide"),
                ]),
            ),
            event(EventKind::Stream, StageKind::ChatModel, model, chunk("")),
            event(EventKind::Stream, StageKind::ChatModel, model, chunk("Paris")),
            event(EventKind::Stream, StageKind::Chain, [Tag::MainChain], chunk("Paris")),
            event(EventKind::Stream, StageKind::ChatModel, model, chunk(".")),
            event(EventKind::End, StageKind::ChatModel, model, chunk("Paris.")),
            event(EventKind::End, StageKind::Chain, [Tag::MainChain], chunk("Paris.")),
        ]
    }

    #[tokio::test]
    async fn test_answer_scenario() {
        let frames = run(
            Variant::Contextualized,
            vec![event(
                EventKind::Stream,
                StageKind::ChatModel,
                [Tag::MainChain, Tag::Step(3)],
                chunk("Paris"),
            )],
        )
        .await;
        assert_eq!(frames, vec!["data: {\"data\": \"Paris\"}\n\n".to_string()]);
    }

    #[tokio::test]
    async fn test_context_scenario() {
        let frames = run(
            Variant::Contextualized,
            vec![event(
                EventKind::End,
                StageKind::Retriever,
                [Tag::MainChain, Tag::Retriever],
                EventPayload::Documents(vec![Document::new("Eiffel Tower facts", "wiki")]),
            )],
        )
        .await;
        assert_eq!(
            frames,
            vec![
                "data: {\"context\": [{\"page_content\": \"Eiffel Tower facts\", \"metadata\": {\"source\": \"wiki\"}, \"type\": \"Document\"}]}\n\n"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_contextualized_run() {
        let frames = run(Variant::Contextualized, contextualized_run()).await;
        let messages: Vec<OutboundMessage> = frames
            .iter()
            .map(|f| OutboundMessage::from_sse_frame(f).unwrap())
            .collect();

        assert_eq!(
            messages,
            vec![
                OutboundMessage::reformulated("Where is "),
                OutboundMessage::reformulated("it?"),
                OutboundMessage::context(&[
                    Document::new("Eiffel Tower facts", "wiki"),
                    Document::new("Paris guide", "guide"),
                ]),
                OutboundMessage::answer("Paris"),
                OutboundMessage::answer("."),
            ]
        );
    }

    #[tokio::test]
    async fn test_basic_variant_relays_every_model_token() {
        let frames = run(Variant::Basic, contextualized_run()).await;
        let messages: Vec<OutboundMessage> = frames
            .iter()
            .map(|f| OutboundMessage::from_sse_frame(f).unwrap())
            .collect();

        // without tag checks the contextualize model's tokens count as answer tokens
        assert_eq!(
            messages,
            vec![
                OutboundMessage::answer("Where is "),
                OutboundMessage::answer("it?"),
                OutboundMessage::context(&[
                    Document::new("Eiffel Tower facts", "wiki"),
                    Document::new("Paris guide", "guide"),
                ]),
                OutboundMessage::answer("Paris"),
                OutboundMessage::answer("."),
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_after_bad_payload() {
        let mut events = contextualized_run();
        events.insert(
            10,
            event(
                EventKind::Stream,
                StageKind::ChatModel,
                [Tag::MainChain, Tag::Step(3)],
                EventPayload::Text("raw".into()),
            ),
        );
        let frames = run(Variant::Contextualized, events).await;
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| !f.contains("\"data\"")));
    }
}
