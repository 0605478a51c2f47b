//! Incremental server-sent-event line feed
//!
//! Converts a raw byte stream into complete `data:` payload strings. Event
//! boundaries may split anywhere, including mid-line; partial lines stay
//! buffered until the terminating newline arrives.

/// Incremental line feed over an SSE byte stream
#[derive(Debug, Default)]
pub struct SseLineFeed {
    line_buffer: String,
}

impl SseLineFeed {
    /// Create a new line feed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes; returns the `data:` payloads completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(chunk);
        let mut payloads = Vec::new();

        for ch in text.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line_buffer);
                if let Some(payload) = data_payload(&line) {
                    payloads.push(payload.to_string());
                }
            } else {
                self.line_buffer.push(ch);
            }
        }

        payloads
    }

    /// Flush a trailing payload when the stream ends without a final newline
    pub fn flush(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.line_buffer);
        data_payload(&line).map(ToString::to_string)
    }
}

/// Extract the payload of a `data:` line, if it is one
///
/// Comment lines, `event:`/`id:` fields, and blank separator lines carry no
/// payload for this transport and are skipped.
fn data_payload(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let value = line.strip_prefix("data:")?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_yields_payload() {
        let mut feed = SseLineFeed::new();
        let payloads = feed.push(b"data: hello\n\n");
        assert_eq!(payloads, vec!["hello"]);
    }

    #[test]
    fn line_split_across_chunks_is_rebuffered() {
        let mut feed = SseLineFeed::new();
        assert!(feed.push(b"data: hel").is_empty());
        assert_eq!(feed.push(b"lo\n"), vec!["hello"]);
    }

    #[test]
    fn crlf_lines_are_stripped() {
        let mut feed = SseLineFeed::new();
        assert_eq!(feed.push(b"data: hello\r\n"), vec!["hello"]);
    }

    #[test]
    fn non_data_lines_are_skipped() {
        let mut feed = SseLineFeed::new();
        let payloads = feed.push(b": comment\nevent: delta\ndata: x\n\n");
        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn no_space_after_colon() {
        let mut feed = SseLineFeed::new();
        assert_eq!(feed.push(b"data:{\"a\":1}\n"), vec!["{\"a\":1}"]);
    }

    #[test]
    fn flush_returns_trailing_payload() {
        let mut feed = SseLineFeed::new();
        assert!(feed.push(b"data: tail").is_empty());
        assert_eq!(feed.flush().as_deref(), Some("tail"));
        assert!(feed.flush().is_none());
    }

    #[test]
    fn multiple_payloads_in_one_chunk() {
        let mut feed = SseLineFeed::new();
        let payloads = feed.push(b"data: one\n\ndata: two\n\n");
        assert_eq!(payloads, vec!["one", "two"]);
    }
}
