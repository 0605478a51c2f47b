//! Headless host surface
//!
//! Answers every probe as unavailable and records navigations and
//! acknowledgments. Used by tests and as the surface for one-shot CLI
//! turns.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::Result;
use crate::host::{Ack, HostPlatform, PageContext};

/// A host with no affordances that records what the engine asked of it
#[derive(Debug, Default)]
pub struct NullHost {
    page: Mutex<PageContext>,
    navigations: Mutex<Vec<String>>,
    acks: Mutex<Vec<Ack>>,
}

impl NullHost {
    /// Create a null host on a blank landing page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a null host pinned to a specific page
    #[must_use]
    pub fn on_page(page: PageContext) -> Self {
        Self {
            page: Mutex::new(page),
            navigations: Mutex::new(Vec::new()),
            acks: Mutex::new(Vec::new()),
        }
    }

    /// Navigations requested so far, in order
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.navigations
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    /// Acknowledgments surfaced so far, in order
    #[must_use]
    pub fn acks(&self) -> Vec<Ack> {
        self.acks.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HostPlatform for NullHost {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn page(&self) -> PageContext {
        self.page.lock().map(|p| p.clone()).unwrap_or_default()
    }

    async fn navigate(&self, path: &str) -> Result<()> {
        if let Ok(mut navigations) = self.navigations.lock() {
            navigations.push(path.to_string());
        }
        Ok(())
    }

    async fn acknowledge(&self, ack: Ack) {
        if let Ok(mut acks) = self.acks.lock() {
            acks.push(ack);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Capability;

    #[tokio::test]
    async fn probes_degrade_to_unavailable() {
        let host = NullHost::new();
        assert_eq!(host.click_add_to_cart().await, Capability::Unavailable);
        assert_eq!(host.click_checkout().await, Capability::Unavailable);
        assert_eq!(host.cart_count().await, Capability::Unavailable);
        assert!(!host.resolve_product("mug").await.is_available());
        assert!(!host.cart_add("mug").await.is_available());
    }

    #[tokio::test]
    async fn records_navigations_in_order() {
        let host = NullHost::new();
        host.navigate("/cart").await.unwrap();
        host.navigate("/checkout").await.unwrap();
        assert_eq!(host.navigations(), vec!["/cart", "/checkout"]);
    }
}
