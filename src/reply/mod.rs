//! Incremental reply assembly
//!
//! Streamed reply fragments are concatenated into a running reply string
//! while the same string is scanned for fenced command blocks. A block is
//! emitted the moment its closing fence arrives, before the stream
//! finishes, so commerce actions can begin while the assistant is still
//! speaking. At completion the recognized block markers are stripped from
//! the text handed to speech synthesis; surrounding prose stays verbatim.
//!
//! Wire format: `:::<type>` on its own line opens a block, a bare `:::`
//! line closes it, and the lines between carry `key: value` attributes.
//! Lines without a delimiter are skipped, never fatal; unknown type tags
//! are stripped from speech but never dispatched.

use std::collections::HashMap;
use std::ops::Range;

use crate::commands::{CommandBlock, CommandKind};

/// Fence marker opening and closing a command block
pub const BLOCK_FENCE: &str = ":::";

/// Incremental parser separating spoken text from structured commands
#[derive(Debug, Default)]
pub struct ReplyParser {
    text: String,
    scan_from: usize,
    block_spans: Vec<Range<usize>>,
}

impl ReplyParser {
    /// Create a parser for one streamed reply
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decoded fragment
    ///
    /// Returns the command blocks whose closing fence arrived with this
    /// fragment, in source order.
    pub fn push_fragment(&mut self, fragment: &str) -> Vec<CommandBlock> {
        self.text.push_str(fragment);
        self.scan(false)
    }

    /// Finalize the reply at end of stream
    ///
    /// Returns any block closed exactly at the end of the text (a closing
    /// fence without a trailing newline only becomes unambiguous here).
    pub fn finalize(&mut self) -> Vec<CommandBlock> {
        self.scan(true)
    }

    /// The raw reply text accumulated so far
    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.text
    }

    /// Speakable text: the reply with every recognized block removed
    ///
    /// Prose outside the blocks is preserved verbatim.
    #[must_use]
    pub fn speakable_text(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for span in &self.block_spans {
            out.push_str(&self.text[cursor..span.start]);
            cursor = span.end;
        }
        out.push_str(&self.text[cursor..]);
        out.trim().to_string()
    }

    /// Scan the running text for newly closed blocks
    fn scan(&mut self, at_eof: bool) -> Vec<CommandBlock> {
        let mut emitted = Vec::new();

        loop {
            let Some(open) = find_fence_line(&self.text, self.scan_from) else {
                break;
            };

            let tag_start = open + BLOCK_FENCE.len();
            // The opening line must be complete before the tag is known
            let Some(tag_len) = line_len(&self.text[tag_start..], at_eof) else {
                break;
            };
            let tag = self.text[tag_start..tag_start + tag_len].trim().to_string();
            if tag.is_empty() {
                // Stray close marker outside a block; skip past it
                self.scan_from = tag_start;
                continue;
            }

            let body_start = (tag_start + tag_len + 1).min(self.text.len());
            let Some((body_end, close_end)) = find_close(&self.text, body_start, at_eof) else {
                break;
            };

            let span = open..close_end;
            if let Some(kind) = CommandKind::from_tag(&tag) {
                emitted.push(CommandBlock::new(
                    kind,
                    parse_attrs(&self.text[body_start..body_end]),
                ));
            } else {
                tracing::debug!(tag = %tag, "ignoring unknown command block");
            }
            self.block_spans.push(span);
            self.scan_from = close_end;
        }

        emitted
    }
}

/// Find the next fence that begins a line at or after `from`
fn find_fence_line(text: &str, from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(rel) = text[search..].find(BLOCK_FENCE) {
        let pos = search + rel;
        if pos == 0 || text.as_bytes()[pos - 1] == b'\n' {
            return Some(pos);
        }
        search = pos + BLOCK_FENCE.len();
    }
    None
}

/// Length of the line starting at the slice, if the line is complete
fn line_len(slice: &str, at_eof: bool) -> Option<usize> {
    match slice.find('\n') {
        Some(idx) => Some(idx),
        None if at_eof => Some(slice.len()),
        None => None,
    }
}

/// Find the closing fence line for a block body starting at `from`
///
/// Returns `(body_end, span_end)`: the byte just before the closing fence
/// line, and the byte just past it (including its newline when present).
fn find_close(text: &str, from: usize, at_eof: bool) -> Option<(usize, usize)> {
    let mut line_start = from;
    while line_start <= text.len() {
        let rest = &text[line_start..];
        let len = line_len(rest, at_eof)?;
        let line = rest[..len].trim_end_matches('\r');

        if line.trim() == BLOCK_FENCE {
            let has_newline = line_start + len < text.len();
            let span_end = line_start + len + usize::from(has_newline);
            return Some((line_start, span_end));
        }

        if line_start + len >= text.len() {
            return None;
        }
        line_start += len + 1;
    }
    None
}

/// Parse `key: value` attribute lines
///
/// Splits on the first `:` so values may contain colons (links, times).
/// Lines without a delimiter are skipped.
fn parse_attrs(body: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for line in body.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        attrs.insert(key.to_string(), value.trim().to_string());
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_blocks_with_interleaved_prose_round_trip() {
        let mut parser = ReplyParser::new();
        let reply = "Here you go!\n:::open_product\nhandle: blue-runner\n:::\nIt pairs well with this.\n:::add_to_cart\nname: Wool Socks\n:::\nEnjoy!";

        let mut blocks = parser.push_fragment(reply);
        blocks.extend(parser.finalize());

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, CommandKind::OpenProduct);
        assert_eq!(blocks[0].attr("handle"), Some("blue-runner"));
        assert_eq!(blocks[1].kind, CommandKind::AddToCart);
        assert_eq!(blocks[1].attr("name"), Some("Wool Socks"));

        assert_eq!(
            parser.speakable_text(),
            "Here you go!\nIt pairs well with this.\nEnjoy!"
        );
    }

    #[test]
    fn block_emits_before_stream_end() {
        let mut parser = ReplyParser::new();

        assert!(parser.push_fragment("Adding that now.\n:::add_to").is_empty());
        assert!(parser.push_fragment("_cart\nhandle: tea").is_empty());
        let blocks = parser.push_fragment("-sampler\n:::\nAnything else?");

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, CommandKind::AddToCart);
        assert_eq!(blocks[0].attr("handle"), Some("tea-sampler"));
    }

    #[test]
    fn malformed_attribute_lines_are_skipped() {
        let mut parser = ReplyParser::new();
        parser.push_fragment(
            ":::open_product\nthis line has no delimiter\nhandle: mug\nanother stray\n:::\n",
        );
        let blocks = parser.finalize();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].attrs.len(), 1);
        assert_eq!(blocks[0].attr("handle"), Some("mug"));
    }

    #[test]
    fn unknown_block_type_is_stripped_but_not_emitted() {
        let mut parser = ReplyParser::new();
        parser.push_fragment("Before.\n:::do_a_dance\nmove: spin\n:::\nAfter.");
        let blocks = parser.finalize();

        assert!(blocks.is_empty());
        assert_eq!(parser.speakable_text(), "Before.\nAfter.");
    }

    #[test]
    fn closing_fence_at_end_of_stream_without_newline() {
        let mut parser = ReplyParser::new();
        assert!(
            parser
                .push_fragment("Done.\n:::navigate_to_cart\n:::")
                .is_empty()
        );
        let blocks = parser.finalize();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, CommandKind::NavigateToCart);
        assert_eq!(parser.speakable_text(), "Done.");
    }

    #[test]
    fn attribute_values_may_contain_colons() {
        let mut parser = ReplyParser::new();
        parser.push_fragment(
            ":::open_product\nlink: https://shop.example/products/mug\n:::\n",
        );
        let blocks = parser.finalize();
        assert_eq!(
            blocks[0].attr("link"),
            Some("https://shop.example/products/mug")
        );
    }

    #[test]
    fn fence_mid_line_is_prose() {
        let mut parser = ReplyParser::new();
        parser.push_fragment("We use ::: as a divider sometimes.");
        assert!(parser.finalize().is_empty());
        assert_eq!(
            parser.speakable_text(),
            "We use ::: as a divider sometimes."
        );
    }

    #[test]
    fn unclosed_block_never_emits() {
        let mut parser = ReplyParser::new();
        parser.push_fragment("Hold on.\n:::open_product\nhandle: mug\n");
        assert!(parser.finalize().is_empty());
    }
}
