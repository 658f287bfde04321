//! Question answering chains

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use ragstream_core::{
    ChainInput, ChatMessage, ChatModel, Error, EventPayload, EventStream, MessageChunk,
    Pipeline, PipelineEvent, Retriever, StageKind, StageLabel, Tag, Tags, Variant, format_docs,
};

use crate::ChatPromptTemplate;

/// When the contextualized chain rewrites the question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextualizePolicy {
    /// Every question goes through the contextualize model
    #[default]
    Always,
    /// Questions without chat history are used verbatim
    WhenHistoryPresent,
}

/// Labels of the question contextualization sub-chain
#[derive(Debug, Clone)]
struct ContextualizeLabels {
    chain: StageLabel,
    prompt: StageLabel,
    model: StageLabel,
    parser: StageLabel,
}

/// Every stage label of a chain, resolved when the chain is built
#[derive(Debug, Clone)]
struct ChainLabels {
    main: StageLabel,
    context: StageLabel,
    contextualize: Option<ContextualizeLabels>,
    retriever: StageLabel,
    format_docs: StageLabel,
    qa_prompt: StageLabel,
    model: StageLabel,
}

impl ChainLabels {
    fn basic(model_name: &str) -> Self {
        let main = StageLabel::new(StageKind::Chain, "RunnableSequence", Tags::from([Tag::MainChain]));
        let context = main.child(StageKind::Chain, "RunnableParallel", Tags::from([Tag::Step(1)]));
        Self {
            retriever: context.child(
                StageKind::Retriever,
                "VectorStoreRetriever",
                Tags::from([Tag::Step(1), Tag::Retriever]),
            ),
            format_docs: context.child(StageKind::Chain, "format_docs", Tags::from([Tag::Step(2)])),
            qa_prompt: main.child(StageKind::Prompt, "ChatPromptTemplate", Tags::from([Tag::Step(2)])),
            model: main.child(StageKind::ChatModel, model_name, Tags::from([Tag::Step(3)])),
            contextualize: None,
            context,
            main,
        }
    }

    fn contextualized(model_name: &str) -> Self {
        let main = StageLabel::new(StageKind::Chain, "RunnableSequence", Tags::from([Tag::MainChain]));
        let context = main.child(StageKind::Chain, "RunnableAssign", Tags::from([Tag::Step(1)]));
        let chain = context.child(
            StageKind::Chain,
            "contextualize_q_chain",
            Tags::from([Tag::Step(1), Tag::ContextualizeChain]),
        );
        let contextualize = ContextualizeLabels {
            prompt: chain.child(StageKind::Prompt, "ChatPromptTemplate", Tags::from([Tag::Step(1)])),
            model: chain.child(StageKind::ChatModel, model_name, Tags::from([Tag::Step(2)])),
            parser: chain.child(StageKind::Parser, "StrOutputParser", Tags::from([Tag::Step(3)])),
            chain,
        };
        Self {
            retriever: context.child(
                StageKind::Retriever,
                "VectorStoreRetriever",
                Tags::from([Tag::Step(2), Tag::Retriever]),
            ),
            format_docs: context.child(StageKind::Chain, "format_docs", Tags::from([Tag::Step(3)])),
            qa_prompt: main.child(StageKind::Prompt, "ChatPromptTemplate", Tags::from([Tag::Step(2)])),
            model: main.child(StageKind::ChatModel, model_name, Tags::from([Tag::Step(3)])),
            contextualize: Some(contextualize),
            context,
            main,
        }
    }
}

/// Why a run stopped early
enum Halt {
    /// The event stream was dropped
    Cancelled,
    Failed(Error),
}

impl From<Error> for Halt {
    fn from(err: Error) -> Self {
        Halt::Failed(err)
    }
}

type RunResult<T> = std::result::Result<T, Halt>;

#[derive(Clone)]
struct ChainInner {
    variant: Variant,
    model: Arc<dyn ChatModel>,
    retriever: Arc<dyn Retriever>,
    contextualize_prompt: ChatPromptTemplate,
    qa_prompt: ChatPromptTemplate,
    policy: ContextualizePolicy,
    labels: ChainLabels,
}

/// Retrieval-augmented question answering chain.
///
/// Cheap to clone; every clone shares the same model and retriever. Each
/// call to [`Pipeline::stream_events`] starts an independent run on its own
/// task.
#[derive(Clone)]
pub struct RagChain {
    inner: Arc<ChainInner>,
}

impl RagChain {
    /// retrieve → prompt → generate
    pub fn basic(model: Arc<dyn ChatModel>, retriever: Arc<dyn Retriever>) -> Self {
        let labels = ChainLabels::basic(model.model_id());
        Self::build(Variant::Basic, model, retriever, labels)
    }

    /// contextualize → retrieve → prompt → generate
    pub fn contextualized(model: Arc<dyn ChatModel>, retriever: Arc<dyn Retriever>) -> Self {
        let labels = ChainLabels::contextualized(model.model_id());
        Self::build(Variant::Contextualized, model, retriever, labels)
    }

    pub fn for_variant(
        variant: Variant,
        model: Arc<dyn ChatModel>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        match variant {
            Variant::Basic => Self::basic(model, retriever),
            Variant::Contextualized => Self::contextualized(model, retriever),
        }
    }

    fn build(
        variant: Variant,
        model: Arc<dyn ChatModel>,
        retriever: Arc<dyn Retriever>,
        labels: ChainLabels,
    ) -> Self {
        Self {
            inner: Arc::new(ChainInner {
                variant,
                model,
                retriever,
                contextualize_prompt: ChatPromptTemplate::contextualize(),
                qa_prompt: ChatPromptTemplate::question_answering(),
                policy: ContextualizePolicy::default(),
                labels,
            }),
        }
    }

    /// Set the contextualize policy. Has no effect on the basic chain.
    pub fn with_policy(self, policy: ContextualizePolicy) -> Self {
        let mut inner = (*self.inner).clone();
        inner.policy = policy;
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn policy(&self) -> ContextualizePolicy {
        self.inner.policy
    }
}

impl Pipeline for RagChain {
    fn stream_events(&self, input: ChainInput) -> EventStream {
        let (tx, rx) = mpsc::channel(1);
        let inner = self.inner.clone();

        tokio::spawn(async move {
            let sink = EventSink { tx: &tx };
            tokio::select! {
                _ = tx.closed() => debug!("Event stream dropped, cancelling run"),
                result = inner.run(input, &sink) => match result {
                    Ok(()) => debug!("Chain run finished"),
                    Err(Halt::Cancelled) => debug!("Event stream dropped, run stopped"),
                    Err(Halt::Failed(e)) => {
                        warn!("Chain run failed: {}", e);
                        let _ = tx.send(Err(e)).await;
                    }
                },
            }
        });

        ReceiverStream::new(rx).boxed()
    }

    fn variant(&self) -> Variant {
        self.inner.variant
    }
}

struct EventSink<'a> {
    tx: &'a mpsc::Sender<ragstream_core::Result<PipelineEvent>>,
}

impl EventSink<'_> {
    async fn emit(&self, event: PipelineEvent) -> RunResult<()> {
        self.tx.send(Ok(event)).await.map_err(|_| Halt::Cancelled)
    }
}

impl ChainInner {
    async fn run(&self, input: ChainInput, sink: &EventSink<'_>) -> RunResult<()> {
        let labels = &self.labels;
        sink.emit(labels.main.start(EventPayload::Text(input.question.clone())))
            .await?;
        sink.emit(labels.context.start(EventPayload::Text(input.question.clone())))
            .await?;

        let question = match &labels.contextualize {
            Some(ctx) if self.should_contextualize(&input) => {
                self.contextualize(ctx, &input, sink).await?
            }
            _ => input.question.clone(),
        };

        sink.emit(labels.retriever.start(EventPayload::Text(question.clone())))
            .await?;
        let documents = self.retriever.retrieve(&question).await?;
        sink.emit(labels.retriever.end(EventPayload::Documents(documents.clone())))
            .await?;

        sink.emit(labels.format_docs.start(EventPayload::Documents(documents.clone())))
            .await?;
        let context = format_docs(&documents);
        sink.emit(labels.format_docs.end(EventPayload::Text(context.clone())))
            .await?;
        sink.emit(labels.context.end(EventPayload::Text(context.clone())))
            .await?;

        // the rewritten question only drives retrieval
        sink.emit(labels.qa_prompt.start(EventPayload::Text(input.question.clone())))
            .await?;
        let messages =
            self.qa_prompt
                .format_messages(&input.question, &input.chat_history, Some(&context));
        sink.emit(labels.qa_prompt.end(EventPayload::Messages(messages.clone())))
            .await?;

        let answer = self
            .generate(&labels.model, &messages, Some(&labels.main), None, sink)
            .await?;
        sink.emit(labels.main.end(EventPayload::MessageChunk(answer)))
            .await?;
        Ok(())
    }

    fn should_contextualize(&self, input: &ChainInput) -> bool {
        match self.policy {
            ContextualizePolicy::Always => true,
            ContextualizePolicy::WhenHistoryPresent => !input.chat_history.is_empty(),
        }
    }

    /// Run the contextualize sub-chain and return the standalone question
    async fn contextualize(
        &self,
        labels: &ContextualizeLabels,
        input: &ChainInput,
        sink: &EventSink<'_>,
    ) -> RunResult<String> {
        sink.emit(labels.chain.start(EventPayload::Text(input.question.clone())))
            .await?;
        sink.emit(labels.prompt.start(EventPayload::Text(input.question.clone())))
            .await?;
        let messages =
            self.contextualize_prompt
                .format_messages(&input.question, &input.chat_history, None);
        sink.emit(labels.prompt.end(EventPayload::Messages(messages.clone())))
            .await?;

        sink.emit(labels.parser.start(EventPayload::Empty)).await?;
        let reformulated = self
            .generate(&labels.model, &messages, None, Some(&labels.parser), sink)
            .await?;
        sink.emit(labels.parser.end(EventPayload::Text(reformulated.content.clone())))
            .await?;
        sink.emit(labels.chain.end(EventPayload::Text(reformulated.content.clone())))
            .await?;

        debug!("Reformulated question: {}", reformulated.content);
        Ok(reformulated.content)
    }

    /// Stream one model call under `stage`. Each chunk is also reported by
    /// the enclosing chain or the parser stage when given.
    async fn generate(
        &self,
        stage: &StageLabel,
        messages: &[ChatMessage],
        chain: Option<&StageLabel>,
        parser: Option<&StageLabel>,
        sink: &EventSink<'_>,
    ) -> RunResult<MessageChunk> {
        sink.emit(stage.start(EventPayload::Messages(messages.to_vec())))
            .await?;

        let mut chunks = self.model.stream_chat(messages).await?;
        let mut full = MessageChunk::default();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            full.content.push_str(&chunk.content);
            sink.emit(stage.stream(EventPayload::MessageChunk(chunk.clone())))
                .await?;
            if let Some(parser) = parser {
                sink.emit(parser.stream(EventPayload::Text(chunk.content.clone())))
                    .await?;
            }
            if let Some(chain) = chain {
                sink.emit(chain.stream(EventPayload::MessageChunk(chunk)))
                    .await?;
            }
        }

        sink.emit(stage.end(EventPayload::MessageChunk(full.clone())))
            .await?;
        Ok(full)
    }
}
