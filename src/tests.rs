//! HTTP endpoint tests against a scripted pipeline

#[cfg(test)]
mod router_tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use futures::{StreamExt, stream};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    use crate::{AppState, router};
    use ragstream_core::{
        ChainInput, Document, Error, EventKind, EventPayload, EventStream, MessageChunk, Pipeline,
        PipelineEvent, Result, Role, StageKind, Tag, Tags, Variant,
    };

    /// Replays a fixed event list and remembers what it was asked
    struct ScriptedPipeline {
        variant: Variant,
        events: Vec<std::result::Result<PipelineEvent, String>>,
        inputs: Mutex<Vec<ChainInput>>,
    }

    impl ScriptedPipeline {
        fn new(variant: Variant, events: Vec<std::result::Result<PipelineEvent, String>>) -> Arc<Self> {
            Arc::new(Self {
                variant,
                events,
                inputs: Mutex::new(Vec::new()),
            })
        }

        fn last_input(&self) -> ChainInput {
            self.inputs.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Pipeline for ScriptedPipeline {
        fn stream_events(&self, input: ChainInput) -> EventStream {
            self.inputs.lock().unwrap().push(input);
            let events: Vec<Result<PipelineEvent>> = self
                .events
                .iter()
                .cloned()
                .map(|e| e.map_err(Error::LlmProvider))
                .collect();
            stream::iter(events).boxed()
        }

        fn variant(&self) -> Variant {
            self.variant
        }
    }

    fn answer(text: &str) -> std::result::Result<PipelineEvent, String> {
        Ok(PipelineEvent {
            kind: EventKind::Stream,
            stage: StageKind::ChatModel,
            name: "model".to_string(),
            tags: Tags::from([Tag::MainChain, Tag::Step(3)]),
            payload: EventPayload::MessageChunk(MessageChunk::new(text)),
        })
    }

    fn context(docs: Vec<Document>) -> std::result::Result<PipelineEvent, String> {
        Ok(PipelineEvent {
            kind: EventKind::End,
            stage: StageKind::Retriever,
            name: "retriever".to_string(),
            tags: Tags::from([Tag::MainChain, Tag::Retriever]),
            payload: EventPayload::Documents(docs),
        })
    }

    fn static_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static")
    }

    fn app(pipeline: Arc<ScriptedPipeline>) -> axum::Router {
        router(AppState::new(pipeline), &static_dir())
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_get_chat_stream() {
        let pipeline = ScriptedPipeline::new(
            Variant::Contextualized,
            vec![
                context(vec![Document::new("Eiffel Tower facts", "wiki")]),
                answer("Paris"),
                answer(""),
                answer("!"),
            ],
        );
        let response = app(pipeline.clone())
            .oneshot(
                Request::builder()
                    .uri("/chat_stream/Where%20is%20the%20Eiffel%20Tower%3F")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert!(response.headers().contains_key("x-request-id"));

        let body = body_text(response).await;
        assert_eq!(
            body,
            concat!(
                "data: {\"context\": [{\"page_content\": \"Eiffel Tower facts\", \"metadata\": {\"source\": \"wiki\"}, \"type\": \"Document\"}]}\n\n",
                "data: {\"data\": \"Paris\"}\n\n",
                "data: {\"data\": \"!\"}\n\n",
            )
        );

        let input = pipeline.last_input();
        assert_eq!(input.question, "Where is the Eiffel Tower?");
        assert!(input.chat_history.is_empty());
    }

    #[tokio::test]
    async fn test_post_chat_stream_with_history() {
        let pipeline = ScriptedPipeline::new(Variant::Contextualized, vec![answer("Yes.")]);
        let payload = serde_json::json!({
            "question": "Is it tall?",
            "chat_history": [
                {"role": "human", "content": "Tell me about the Eiffel Tower"},
                {"role": "ai", "content": "It is in Paris."}
            ]
        });
        let response = app(pipeline.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat_stream")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "data: {\"data\": \"Yes.\"}\n\n");

        let input = pipeline.last_input();
        assert_eq!(input.question, "Is it tall?");
        let roles: Vec<Role> = input.chat_history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_pipeline_failure_truncates_stream() {
        let pipeline = ScriptedPipeline::new(
            Variant::Basic,
            vec![
                answer("Par"),
                Err("upstream closed".to_string()),
                answer("is"),
            ],
        );
        let response = app(pipeline)
            .oneshot(
                Request::builder()
                    .uri("/chat_stream/capital")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "data: {\"data\": \"Par\"}\n\n");
    }

    #[tokio::test]
    async fn test_health() {
        let pipeline = ScriptedPipeline::new(Variant::Basic, vec![]);
        let response = app(pipeline)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Ok");
    }

    #[tokio::test]
    async fn test_root_serves_landing_page() {
        let pipeline = ScriptedPipeline::new(Variant::Basic, vec![]);
        let response = app(pipeline)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("/chat_stream/"));
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let pipeline = ScriptedPipeline::new(Variant::Basic, vec![]);
        let response = app(pipeline)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
