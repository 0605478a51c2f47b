//! Conversational session state
//!
//! The [`Session`] is the only long-lived mutable state in the engine. It is
//! owned exclusively by the engine, persisted on every state-relevant
//! mutation, and destroyed on explicit close.

mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use store::SessionStore;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Wire name used in backend requests
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in the turn history
///
/// Immutable once appended; ordering is conversation order. The full history
/// is resent to the stateless backend on every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Persisted cross-navigation conversational state for one browsing session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Stable identifier for this browsing session
    pub session_id: String,

    /// Backend correlation token; assigned at most once
    pub conversation_id: Option<String>,

    /// Whether the conversation surface is open
    pub is_open: bool,

    /// Ordered turn history
    pub turn_history: Vec<Message>,

    /// Most recent assistant reply text
    pub last_assistant_text: String,

    /// Whether the one-time welcome turn has been sent
    pub welcome_sent: bool,

    /// Set immediately before a checkout-bound navigation; instructs the
    /// engine to attempt the native checkout control once the next page
    /// finishes loading
    pub checkout_intent: bool,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            conversation_id: None,
            is_open: false,
            turn_history: Vec::new(),
            last_assistant_text: String::new(),
            welcome_sent: false,
            checkout_intent: false,
            updated_at: Utc::now(),
        }
    }

    /// Record the backend correlation token
    ///
    /// The first non-empty value wins and is never overwritten. Returns
    /// whether the id was assigned.
    pub fn assign_conversation_id(&mut self, id: &str) -> bool {
        if self.conversation_id.is_some() || id.trim().is_empty() {
            return false;
        }
        self.conversation_id = Some(id.trim().to_string());
        self.touch();
        true
    }

    /// Append a user message
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turn_history.push(Message::user(content));
        self.touch();
    }

    /// Append an assistant message and remember it as the latest reply
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        let content = content.into();
        self.last_assistant_text.clone_from(&content);
        self.turn_history.push(Message::assistant(content));
        self.touch();
    }

    /// Whether any turns have been exchanged
    #[must_use]
    pub fn has_history(&self) -> bool {
        !self.turn_history.is_empty()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_assigned_at_most_once() {
        let mut session = Session::new();
        assert!(session.assign_conversation_id("conv_1"));
        assert!(!session.assign_conversation_id("conv_2"));
        assert_eq!(session.conversation_id.as_deref(), Some("conv_1"));
    }

    #[test]
    fn empty_conversation_id_does_not_assign() {
        let mut session = Session::new();
        assert!(!session.assign_conversation_id("  "));
        assert!(session.conversation_id.is_none());
        assert!(session.assign_conversation_id("conv_9"));
    }

    #[test]
    fn push_assistant_updates_last_text() {
        let mut session = Session::new();
        session.push_user("show me sneakers");
        session.push_assistant("Here are some sneakers.");
        assert_eq!(session.last_assistant_text, "Here are some sneakers.");
        assert_eq!(session.turn_history.len(), 2);
        assert_eq!(session.turn_history[0].role, MessageRole::User);
        assert_eq!(session.turn_history[1].role, MessageRole::Assistant);
    }
}
