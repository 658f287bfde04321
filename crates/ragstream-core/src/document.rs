//! Document types shared by loaders, stores and the relay

use serde::{Deserialize, Serialize};

/// A piece of source text together with where it came from.
///
/// Loaders produce whole documents, the splitter produces chunks of them and
/// the retriever hands chunks back out. Once created a document is only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Create a document with no extra metadata
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach one metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Join document contents with blank lines, the way the QA prompt expects
/// its `{context}` variable.
pub fn format_docs(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|doc| doc.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
