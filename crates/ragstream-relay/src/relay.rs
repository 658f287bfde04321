//! SSE relay
//!
//! Pulls events from a running pipeline, classifies them and yields one SSE
//! record per client message. The relay only pulls the next event when it is
//! polled, so a slow client slows the pipeline down instead of filling a
//! buffer, and dropping the relay drops the pipeline's event stream.

use futures::stream::{FusedStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tracing::{debug, error, info};

use ragstream_core::{EventStream, PipelineEvent, Result};

use crate::{Classification, EventClassifier};

enum RelayState {
    Streaming(EventStream),
    Terminated,
}

/// Stream of `data: <json>\n\n` records for one client request.
///
/// Any error, whether from the pipeline or from classifying an event, ends
/// the stream. The client sees the stream close; no error record is sent.
/// Once terminated the relay stays terminated.
pub struct SseRelay {
    state: RelayState,
    classifier: EventClassifier,
}

impl SseRelay {
    pub fn new(events: EventStream, classifier: EventClassifier) -> Self {
        Self {
            state: RelayState::Streaming(events),
            classifier,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, RelayState::Streaming(_))
    }

    /// Frame for one event, if it produces a client message
    fn frame(&self, event: &PipelineEvent) -> Result<Option<String>> {
        match self.classifier.classify(event)? {
            Classification::Emit(message) => message.to_sse_frame().map(Some),
            Classification::GenerationComplete => {
                info!("Chat model has completed one response.");
                Ok(None)
            }
            Classification::Discard => Ok(None),
        }
    }

    fn terminate(&mut self) {
        // drops the event stream, which cancels the pipeline run
        self.state = RelayState::Terminated;
    }
}

impl Stream for SseRelay {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        let this = &mut *self;
        loop {
            let RelayState::Streaming(events) = &mut this.state else {
                return Poll::Ready(None);
            };

            let event = match ready!(events.poll_next_unpin(cx)) {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    error!("Pipeline failed, closing event stream: {}", e);
                    this.terminate();
                    return Poll::Ready(None);
                }
                None => {
                    debug!("Pipeline finished, closing event stream");
                    this.terminate();
                    return Poll::Ready(None);
                }
            };

            match this.frame(&event) {
                Ok(Some(frame)) => return Poll::Ready(Some(frame)),
                Ok(None) => continue,
                Err(e) => {
                    error!("Failed to relay {:?} event from {}: {}", event.kind, event.name, e);
                    this.terminate();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl FusedStream for SseRelay {
    fn is_terminated(&self) -> bool {
        !self.is_streaming()
    }
}
