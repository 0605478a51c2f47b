//! Shared test helpers

use patter::{CommandBlock, ReplyParser};

/// Feed a reply through the parser in small chunks, the way network frames
/// arrive, and return the blocks plus the finalized speakable text.
pub fn stream_reply(reply: &str, chunk_size: usize) -> (Vec<CommandBlock>, String) {
    let mut parser = ReplyParser::new();
    let mut blocks = Vec::new();

    let chars: Vec<char> = reply.chars().collect();
    for chunk in chars.chunks(chunk_size) {
        let fragment: String = chunk.iter().collect();
        blocks.extend(parser.push_fragment(&fragment));
    }
    blocks.extend(parser.finalize());

    let speakable = parser.speakable_text();
    (blocks, speakable)
}
