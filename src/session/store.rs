//! File-backed session persistence
//!
//! The session record is a flat JSON file scoped to one browsing session.
//! Every mutation that must survive a page navigation is flushed
//! synchronously before the navigation is triggered; an asynchronous-only
//! flush could lose state if the page unloads first.

use std::path::{Path, PathBuf};

use crate::session::Session;
use crate::{Error, Result};

/// Persists the [`Session`] record across page navigations
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at the given data directory
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("session.json"),
        }
    }

    /// Load a previously persisted session, if any
    ///
    /// A missing file is not an error; an unreadable or unparseable record
    /// is discarded so a corrupt file can never wedge startup.
    #[must_use]
    pub fn load(&self) -> Option<Session> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => {
                tracing::debug!(path = %self.path.display(), "restored session");
                Some(session)
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable session record");
                None
            }
        }
    }

    /// Synchronously flush the session record to disk
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be serialized or written
    pub fn flush(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(session)?;
        std::fs::write(&self.path, content)
            .map_err(|e| Error::Session(format!("flush failed: {e}")))?;
        Ok(())
    }

    /// Delete the persisted record
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be removed
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Session(format!("clear failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let mut session = Session::new();
        session.is_open = true;
        session.push_user("hello");
        assert!(session.assign_conversation_id("conv_42"));
        store.flush(&session).unwrap();

        let restored = store.load().unwrap();
        assert_eq!(restored.session_id, session.session_id);
        assert_eq!(restored.conversation_id.as_deref(), Some("conv_42"));
        assert!(restored.is_open);
        assert_eq!(restored.turn_history.len(), 1);
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load().is_none());
    }

    #[test]
    fn corrupt_record_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::write(dir.path().join("session.json"), "not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.flush(&Session::new()).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
    }
}
