//! Conversational backend HTTP clients
//!
//! Three external collaborators, each specified only at its interface:
//! transcription, the streaming conversational call, and speech synthesis.

mod chat;
mod speech;
mod sse;
mod transcribe;

pub use chat::{CONVERSATION_ID_HEADER, ChatClient, ChatStream, ChatTurn};
pub use speech::{SpeechClient, SpokenAudio};
pub use sse::SseLineFeed;
pub use transcribe::{Transcriber, Transcript};
