//! Outbound messages and their SSE wire format

use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, Serializer};
use std::io;

use ragstream_core::{Document, Error, Result};

/// One message sent to the client.
///
/// On the wire each variant is a JSON object with a single key: `data`,
/// `reformulated` or `context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutboundMessage {
    /// A token of the final answer
    #[serde(rename = "data")]
    AnswerToken(String),
    /// A token of the contextualized (standalone) question
    #[serde(rename = "reformulated")]
    ReformulatedToken(String),
    /// The retrieved documents, in retriever order
    #[serde(rename = "context")]
    ContextBatch(Vec<ContextDocument>),
}

/// A retrieved document as the client sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub page_content: String,
    pub metadata: ContextMetadata,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub source: String,
}

/// Always serialized as `"Document"`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    #[default]
    Document,
}

impl From<&Document> for ContextDocument {
    fn from(doc: &Document) -> Self {
        Self {
            page_content: doc.content.clone(),
            metadata: ContextMetadata {
                source: doc.source.clone(),
            },
            kind: DocumentKind::Document,
        }
    }
}

impl OutboundMessage {
    pub fn answer(text: impl Into<String>) -> Self {
        OutboundMessage::AnswerToken(text.into())
    }

    pub fn reformulated(text: impl Into<String>) -> Self {
        OutboundMessage::ReformulatedToken(text.into())
    }

    pub fn context(documents: &[Document]) -> Self {
        OutboundMessage::ContextBatch(documents.iter().map(ContextDocument::from).collect())
    }

    /// The JSON object carried in the `data:` field
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::with_capacity(64);
        self.write_json(&mut buf)?;
        into_string(buf)
    }

    /// A complete SSE record: `data: <json>\n\n`
    pub fn to_sse_frame(&self) -> Result<String> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(b"data: ");
        self.write_json(&mut buf)?;
        buf.extend_from_slice(b"\n\n");
        into_string(buf)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a record produced by [`OutboundMessage::to_sse_frame`]
    pub fn from_sse_frame(frame: &str) -> Result<Self> {
        let json = frame
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .ok_or_else(|| Error::Serialization(format!("Not an SSE data record: {:?}", frame)))?;
        Self::from_json(json)
    }

    fn write_json(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut serializer = Serializer::with_formatter(buf, WireFormatter);
        self.serialize(&mut serializer)?;
        Ok(())
    }
}

fn into_string(buf: Vec<u8>) -> Result<String> {
    String::from_utf8(buf).map_err(|e| Error::Serialization(e.to_string()))
}

/// Compact JSON with `", "` and `": "` separators and every character
/// outside printable ASCII escaped as `\uXXXX`.
struct WireFormatter;

impl Formatter for WireFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if (' '..='~').contains(&ch) {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_frame() {
        let frame = OutboundMessage::answer("Paris").to_sse_frame().unwrap();
        assert_eq!(frame, "data: {\"data\": \"Paris\"}\n\n");
    }

    #[test]
    fn test_reformulated_frame() {
        let frame = OutboundMessage::reformulated("What is it?").to_sse_frame().unwrap();
        assert_eq!(frame, "data: {\"reformulated\": \"What is it?\"}\n\n");
    }

    #[test]
    fn test_context_frame() {
        let docs = vec![Document::new("Eiffel Tower facts", "wiki")];
        let frame = OutboundMessage::context(&docs).to_sse_frame().unwrap();
        assert_eq!(
            frame,
            "data: {\"context\": [{\"page_content\": \"Eiffel Tower facts\", \"metadata\": {\"source\": \"wiki\"}, \"type\": \"Document\"}]}\n\n"
        );
    }

    #[test]
    fn test_context_entries_separated_by_comma_space() {
        let docs = vec![Document::new("a", "1"), Document::new("b", "2")];
        let json = OutboundMessage::context(&docs).to_json().unwrap();
        assert!(json.contains("\"Document\"}, {\"page_content\": \"b\""));
    }

    #[test]
    fn test_empty_context_batch() {
        let json = OutboundMessage::context(&[]).to_json().unwrap();
        assert_eq!(json, "{\"context\": []}");
    }

    #[test]
    fn test_non_ascii_is_escaped() {
        let json = OutboundMessage::answer("caf\u{e9} \u{1f600}").to_json().unwrap();
        assert_eq!(json, "{\"data\": \"caf\\u00e9 \\ud83d\\ude00\"}");
        assert!(json.is_ascii());
    }

    #[test]
    fn test_control_characters_are_escaped() {
        let json = OutboundMessage::answer("a\n\"b\"\u{7f}").to_json().unwrap();
        assert_eq!(json, "{\"data\": \"a\\n\\\"b\\\"\\u007f\"}");
    }

    #[test]
    fn test_round_trip() {
        let messages = vec![
            OutboundMessage::answer("caf\u{e9} \u{1f600}\n"),
            OutboundMessage::reformulated("What is \"memory\"?"),
            OutboundMessage::context(&[
                Document::new("first", "a.html"),
                Document::new("zweite \u{fc}", "b.html"),
            ]),
        ];
        for message in messages {
            let frame = message.to_sse_frame().unwrap();
            assert_eq!(OutboundMessage::from_sse_frame(&frame).unwrap(), message);
        }
    }

    #[test]
    fn test_from_sse_frame_rejects_other_text() {
        assert!(OutboundMessage::from_sse_frame("event: ping\n\n").is_err());
        assert!(OutboundMessage::from_sse_frame("data: {\"unknown\": 1}\n\n").is_err());
    }
}
