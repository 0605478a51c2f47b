//! Patter - voice shopping engine for live storefronts
//!
//! This library provides the core of a voice-driven shopping assistant:
//! - Turn-taking state machine (idle / listening / processing / speaking)
//! - Voice-activity-triggered audio capture
//! - Incremental streaming reply parsing with embedded command extraction
//! - Command dispatch against a pluggable host platform
//! - Session persistence across page navigations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Host surface                        │
//! │   Storefront page │ Headless storefront │ Tests     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ capability contract
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Voice engine                         │
//! │   Turn machine │ Capture/VAD │ Reply parser │       │
//! │   Dispatcher   │ Session store                      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │          Conversational backend (HTTP)               │
//! │   Transcription │ Chat (SSE) │ Speech synthesis     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod reply;
pub mod scheduler;
pub mod session;
pub mod voice;

pub use commands::{CommandBlock, CommandKind, Dispatcher, NavigationTarget};
pub use config::Config;
pub use engine::{TurnPhase, VoiceEngine};
pub use error::{Error, Result};
pub use host::{Ack, Capability, HostPlatform, NullHost, PageContext, PageKind, ProductInfo, StorefrontHost};
pub use reply::ReplyParser;
pub use scheduler::{CallbackRequest, CallbackScheduler};
pub use session::{Message, MessageRole, Session, SessionStore};
