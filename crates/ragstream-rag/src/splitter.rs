//! Recursive character text splitter

use serde_json::json;

use ragstream_core::{Document, Error, IndexingConfig, Result};

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text into chunks of at most `chunk_size` characters.
///
/// Tries the coarsest separator first (paragraphs), falls back to lines,
/// then words, then single characters for pieces that are still too long.
/// Neighbouring pieces are merged back up to `chunk_size`, and consecutive
/// chunks share up to `chunk_overlap` characters.
#[derive(Debug, Clone)]
pub struct RecursiveTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn from_config(config: &IndexingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split every document, tagging chunks with their position
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        let mut chunks = Vec::new();
        for document in documents {
            let texts = self.split_text(&document.content);
            let total = texts.len();
            for (i, text) in texts.into_iter().enumerate() {
                let mut chunk = Document {
                    content: text,
                    source: document.source.clone(),
                    metadata: document.metadata.clone(),
                };
                chunk.metadata.insert("chunk_index".to_string(), json!(i));
                chunk.metadata.insert("total_chunks".to_string(), json!(total));
                chunks.push(chunk);
            }
        }
        chunks
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut short_pieces: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                short_pieces.push(piece);
                continue;
            }
            if !short_pieces.is_empty() {
                chunks.extend(self.merge(&short_pieces));
                short_pieces.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !short_pieces.is_empty() {
            chunks.extend(self.merge(&short_pieces));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, carrying a tail of the previous
    /// chunk forward as overlap.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut window_len = 0usize;
        let mut head = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if window_len + len > self.chunk_size && head < window.len() {
                push_trimmed(&mut chunks, &window[head..]);
                while head < window.len()
                    && (window_len > self.chunk_overlap
                        || (window_len + len > self.chunk_size && window_len > 0))
                {
                    window_len -= char_len(window[head]);
                    head += 1;
                }
            }
            window.push(piece);
            window_len += len;
        }
        push_trimmed(&mut chunks, &window[head..]);
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_trimmed(chunks: &mut Vec<String>, pieces: &[&str]) {
    let joined = pieces.concat();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split on `separator`, keeping it at the start of the piece that follows
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(text[start..idx].to_string());
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces
}
