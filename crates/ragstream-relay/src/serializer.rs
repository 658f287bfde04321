//! Chunk serializer

use ragstream_core::{Error, EventPayload, Result};

/// Plain text of a model message chunk.
///
/// Any other payload is rejected with [`Error::PayloadShape`] naming the
/// payload it actually got.
pub fn serialize_chunk(payload: &EventPayload) -> Result<&str> {
    match payload {
        EventPayload::MessageChunk(chunk) => Ok(&chunk.content),
        other => Err(Error::PayloadShape {
            actual: other.type_name(),
        }),
    }
}
