//! Pipeline event relay for ragstream
//!
//! Consumes the tagged lifecycle events of a running pipeline and re-emits
//! the parts a browser cares about (answer tokens, the reformulated
//! question, the retrieved context) as a server-sent-events stream.

mod classifier;
mod message;
mod relay;
mod serializer;

#[cfg(test)]
mod tests;

pub use classifier::{Classification, EventClassifier};
pub use message::{ContextDocument, ContextMetadata, DocumentKind, OutboundMessage};
pub use relay::SseRelay;
pub use serializer::serialize_chunk;
