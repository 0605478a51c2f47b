//! Host platform capability contract
//!
//! The storefront page the engine is embedded in exposes a set of optional
//! affordances. The engine probes them and uses what is present; every
//! probe degrades to [`Capability::Unavailable`] rather than erroring when
//! the affordance is absent, so one state machine can run against very
//! different host surfaces.

mod null;
mod storefront;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use null::NullHost;
pub use storefront::StorefrontHost;

use crate::Result;

/// Outcome of probing an optional host affordance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability<T> {
    /// The affordance exists and produced a value
    Available(T),
    /// The affordance is absent on this surface
    Unavailable,
}

impl<T> Capability<T> {
    /// Convert to an option
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable => None,
        }
    }

    /// Whether the affordance answered
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unavailable, Self::Available)
    }
}

/// Broad page type the engine adapts its behavior to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// Landing or any page without special handling
    #[default]
    Landing,
    Product,
    Collection,
    Search,
    Cart,
    Checkout,
}

impl PageKind {
    /// Whether this page type differs meaningfully from a blank start
    #[must_use]
    pub const fn is_notable(self) -> bool {
        matches!(self, Self::Product | Self::Cart | Self::Checkout)
    }
}

/// Where the shopper currently is
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContext {
    pub kind: PageKind,
    /// Product or collection handle, when the page has one
    pub handle: Option<String>,
    pub url: Option<String>,
}

/// A product surfaced by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfo {
    pub handle: String,
    pub title: String,
    pub price: Option<String>,
    pub image: Option<String>,
    pub available: bool,
}

/// Transient user-visible acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub text: String,
    pub ok: bool,
}

impl Ack {
    /// A success acknowledgment
    #[must_use]
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ok: true,
        }
    }

    /// A failure acknowledgment
    #[must_use]
    pub fn failed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ok: false,
        }
    }
}

/// Trait for host platform adapters
#[async_trait]
pub trait HostPlatform: Send + Sync {
    /// Get the host surface name
    fn name(&self) -> &'static str;

    /// Current page context
    async fn page(&self) -> PageContext;

    /// Click the page's native add-to-cart control, if present
    async fn click_add_to_cart(&self) -> Capability<()> {
        Capability::Unavailable
    }

    /// Click the page's native checkout control, if present
    async fn click_checkout(&self) -> Capability<()> {
        Capability::Unavailable
    }

    /// Read the current cart item count
    async fn cart_count(&self) -> Capability<u32> {
        Capability::Unavailable
    }

    /// Fetch a product's canonical price/image/availability by handle
    async fn product_by_handle(&self, _handle: &str) -> Capability<ProductInfo> {
        Capability::Unavailable
    }

    /// Resolve a product name to a handle via storefront search
    async fn resolve_product(&self, _name: &str) -> Capability<String> {
        Capability::Unavailable
    }

    /// Add a product to the cart through the storefront cart API
    ///
    /// Returns the new cart item count when the affordance exists.
    async fn cart_add(&self, _handle: &str) -> Capability<u32> {
        Capability::Unavailable
    }

    /// Trigger a page navigation; ends the current page's lifetime
    ///
    /// # Errors
    ///
    /// Returns error if the navigation cannot be performed at all
    async fn navigate(&self, path: &str) -> Result<()>;

    /// Surface a transient acknowledgment
    ///
    /// Default implementation only logs; surfaces that can render toasts
    /// override this.
    async fn acknowledge(&self, ack: Ack) {
        tracing::info!(ok = ack.ok, text = %ack.text, "ack");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_into_option() {
        assert_eq!(Capability::Available(3).into_option(), Some(3));
        assert_eq!(Capability::<u32>::Unavailable.into_option(), None);
    }

    #[test]
    fn notable_page_kinds() {
        assert!(PageKind::Product.is_notable());
        assert!(PageKind::Cart.is_notable());
        assert!(PageKind::Checkout.is_notable());
        assert!(!PageKind::Landing.is_notable());
        assert!(!PageKind::Search.is_notable());
    }

    #[test]
    fn page_context_serializes_for_backend() {
        let page = PageContext {
            kind: PageKind::Product,
            handle: Some("blue-runner".to_string()),
            url: Some("/products/blue-runner".to_string()),
        };
        let json = serde_json::to_string(&page).unwrap();
        assert!(json.contains("\"product\""));
        assert!(json.contains("blue-runner"));
    }
}
