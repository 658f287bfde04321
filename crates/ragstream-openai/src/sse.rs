//! Incremental decoder for upstream server-sent event bodies

/// Splits a byte stream into SSE blocks and extracts their `data` fields.
///
/// Network chunks can end anywhere, including inside a multi-byte character,
/// so bytes are buffered until a blank line closes the block.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the data payloads of every completed block
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(pos) = find_block_end(&self.pending) {
            let block: Vec<u8> = self.pending.drain(..pos + 2).collect();
            if let Some(data) = block_data(&block[..pos]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a trailing block that was not terminated by a blank line
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        block_data(&rest)
    }
}

fn find_block_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn block_data(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let lines: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
