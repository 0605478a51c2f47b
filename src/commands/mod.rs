//! Command interpretation and dispatch
//!
//! Commands extracted from reply text are interpreted against the host
//! platform's capability contract. Navigational commands are deferred until
//! speech playback completes so the shopper hears the reply before the page
//! changes; cart and scheduling commands run immediately.

pub mod fallback;

use std::collections::HashMap;
use std::sync::Arc;

use crate::Result;
use crate::host::{Ack, Capability, HostPlatform};
use crate::scheduler::{CallbackRequest, CallbackScheduler};

/// Recognized command type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    OpenProduct,
    NavigateToSearch,
    NavigateToCollection,
    NavigateToCart,
    NavigateToCheckout,
    AddToCart,
    ScheduleCall,
}

impl CommandKind {
    /// Parse a block type tag; unknown tags yield `None` and are ignored
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "open_product" => Some(Self::OpenProduct),
            "navigate_to_search" => Some(Self::NavigateToSearch),
            "navigate_to_collection" => Some(Self::NavigateToCollection),
            "navigate_to_cart" => Some(Self::NavigateToCart),
            "navigate_to_checkout" => Some(Self::NavigateToCheckout),
            "add_to_cart" => Some(Self::AddToCart),
            "schedule_call" => Some(Self::ScheduleCall),
            _ => None,
        }
    }

    /// Whether this command changes the page
    #[must_use]
    pub const fn is_navigational(self) -> bool {
        matches!(
            self,
            Self::OpenProduct
                | Self::NavigateToSearch
                | Self::NavigateToCollection
                | Self::NavigateToCart
                | Self::NavigateToCheckout
        )
    }
}

/// A structured instruction decoded from reply text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBlock {
    pub kind: CommandKind,
    pub attrs: HashMap<String, String>,
}

impl CommandBlock {
    /// Create a block from a kind and attribute pairs
    #[must_use]
    pub fn new(kind: CommandKind, attrs: HashMap<String, String>) -> Self {
        Self { kind, attrs }
    }

    /// Look up an attribute value
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }
}

/// The single deferred page-transition target for the current turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    Product { handle: String },
    Search { query: String },
    Collection { handle: String },
    Cart,
    Checkout,
}

impl NavigationTarget {
    /// Storefront URL path for this target
    #[must_use]
    pub fn url_path(&self) -> String {
        match self {
            Self::Product { handle } => format!("/products/{handle}"),
            Self::Search { query } => format!("/search?q={}", urlencoding::encode(query)),
            Self::Collection { handle } => format!("/collections/{handle}"),
            Self::Cart => "/cart".to_string(),
            Self::Checkout => "/checkout".to_string(),
        }
    }
}

/// Interprets command blocks with a deterministic precedence policy
pub struct Dispatcher {
    host: Arc<dyn HostPlatform>,
    scheduler: Option<CallbackScheduler>,
    pending: Option<NavigationTarget>,
}

impl Dispatcher {
    /// Create a dispatcher bound to a host surface
    #[must_use]
    pub fn new(host: Arc<dyn HostPlatform>, scheduler: Option<CallbackScheduler>) -> Self {
        Self {
            host,
            scheduler,
            pending: None,
        }
    }

    /// The deferred navigation, if any
    #[must_use]
    pub const fn pending_navigation(&self) -> Option<&NavigationTarget> {
        self.pending.as_ref()
    }

    /// Take the deferred navigation for execution
    pub fn take_pending(&mut self) -> Option<NavigationTarget> {
        self.pending.take()
    }

    /// Discard the deferred navigation without executing it
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// Record a navigation target directly (fallback path)
    pub fn set_pending(&mut self, target: NavigationTarget) {
        tracing::debug!(target = ?target, "pending navigation set");
        self.pending = Some(target);
    }

    /// Interpret one command block
    ///
    /// Navigational commands overwrite the pending target (last wins) and
    /// never execute here; `add_to_cart` and `schedule_call` run
    /// immediately. A block with missing required attributes is logged and
    /// dropped, never fatal.
    pub async fn dispatch(&mut self, block: &CommandBlock) {
        tracing::debug!(kind = ?block.kind, "dispatching command");

        match block.kind {
            CommandKind::OpenProduct => {
                if let Some(handle) = self.product_handle(block).await {
                    self.set_pending(NavigationTarget::Product { handle });
                } else {
                    tracing::warn!("open_product without resolvable handle, dropping");
                }
            }
            CommandKind::NavigateToSearch => {
                if let Some(query) = block.attr("query").or_else(|| block.attr("q")) {
                    self.set_pending(NavigationTarget::Search {
                        query: query.to_string(),
                    });
                } else {
                    tracing::warn!("navigate_to_search without query, dropping");
                }
            }
            CommandKind::NavigateToCollection => {
                if let Some(handle) = block.attr("handle").or_else(|| block.attr("collection")) {
                    self.set_pending(NavigationTarget::Collection {
                        handle: handle.to_string(),
                    });
                } else {
                    tracing::warn!("navigate_to_collection without handle, dropping");
                }
            }
            CommandKind::NavigateToCart => self.set_pending(NavigationTarget::Cart),
            CommandKind::NavigateToCheckout => self.set_pending(NavigationTarget::Checkout),
            CommandKind::AddToCart => self.add_to_cart(block).await,
            CommandKind::ScheduleCall => self.schedule_call(block),
        }
    }

    /// Execute a navigation target against the host
    ///
    /// The single funnel for all page transitions: a checkout target prefers
    /// the native on-page control and falls back to the known URL; every
    /// other target uses its URL pattern directly.
    ///
    /// # Errors
    ///
    /// Returns error if the host navigation fails
    pub async fn navigate(&self, target: &NavigationTarget) -> Result<()> {
        if *target == NavigationTarget::Checkout {
            if let Capability::Available(()) = self.host.click_checkout().await {
                tracing::info!("checkout via native control");
                return Ok(());
            }
        }

        let path = target.url_path();
        tracing::info!(path = %path, "navigating");
        self.host.navigate(&path).await
    }

    /// Resolve the product handle for a block, by attribute then by search
    async fn product_handle(&self, block: &CommandBlock) -> Option<String> {
        if let Some(handle) = block.attr("handle") {
            return Some(handle.to_string());
        }
        if let Some(link) = block.attr("link") {
            if let Some(handle) = handle_from_link(link) {
                return Some(handle);
            }
        }
        let name = block.attr("name").or_else(|| block.attr("title"))?;
        self.host.resolve_product(name).await.into_option()
    }

    /// Add a product to the cart, native affordance first
    async fn add_to_cart(&self, block: &CommandBlock) {
        if let Capability::Available(()) = self.host.click_add_to_cart().await {
            self.ack(true, "Added to your cart.").await;
            return;
        }

        // Not on a product page (or no native control): fall back to the
        // cart API keyed by product name/link
        let Some(handle) = self.product_handle(block).await else {
            tracing::warn!("add_to_cart without resolvable product, dropping");
            self.ack(false, "Sorry, I couldn't find that product.").await;
            return;
        };

        match self.host.cart_add(&handle).await {
            Capability::Available(count) => {
                self.ack(true, &format!("Added to your cart ({count} items)."))
                    .await;
            }
            Capability::Unavailable => {
                tracing::warn!(handle = %handle, "cart add unavailable");
                self.ack(false, "Sorry, I couldn't add that to your cart.")
                    .await;
            }
        }
    }

    /// Fire-and-forget callback scheduling; never blocks the conversation
    fn schedule_call(&self, block: &CommandBlock) {
        let Some(scheduler) = self.scheduler.clone() else {
            tracing::warn!("schedule_call with no scheduler configured, dropping");
            return;
        };

        let (Some(phone), Some(time)) = (block.attr("phone"), block.attr("time")) else {
            tracing::warn!("schedule_call missing phone or time, dropping");
            return;
        };

        let request = CallbackRequest {
            phone: phone.to_string(),
            time: time.to_string(),
            note: block.attr("note").map(ToString::to_string),
        };
        let host = Arc::clone(&self.host);

        tokio::spawn(async move {
            match scheduler.schedule(&request).await {
                Ok(()) => {
                    host.acknowledge(Ack::ok("You're booked - we'll call you.")).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "callback scheduling failed");
                    host.acknowledge(Ack::failed("Sorry, I couldn't book that call."))
                        .await;
                }
            }
        });
    }

    async fn ack(&self, ok: bool, text: &str) {
        let ack = if ok { Ack::ok(text) } else { Ack::failed(text) };
        self.host.acknowledge(ack).await;
    }
}

/// Last path segment of a product link
fn handle_from_link(link: &str) -> Option<String> {
    let trimmed = link.trim_end_matches('/');
    let segment = trimmed.rsplit('/').next()?;
    let segment = segment.split('?').next().unwrap_or(segment);
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}
