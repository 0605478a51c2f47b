//! Storefront HTTP host surface
//!
//! Answers the read-only capability probes over the storefront's public
//! JSON endpoints and performs cart mutations through the cart API. Native
//! click affordances exist only on a rendered page, so this surface reports
//! them as unavailable and the dispatcher takes its fallback paths.
//!
//! Navigation reclassifies the tracked page context from the target URL,
//! which stands in for the page reload a browser surface would perform.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::host::{Capability, HostPlatform, PageContext, PageKind, ProductInfo};
use crate::{Error, Result};

#[derive(Deserialize)]
struct ProductResponse {
    handle: String,
    title: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default = "default_available")]
    available: bool,
}

const fn default_available() -> bool {
    true
}

#[derive(Deserialize)]
struct SuggestResponse {
    #[serde(default)]
    products: Vec<SuggestProduct>,
}

#[derive(Deserialize)]
struct SuggestProduct {
    handle: String,
}

#[derive(Deserialize)]
struct CartResponse {
    item_count: u32,
}

/// Host surface backed by a storefront's HTTP endpoints
pub struct StorefrontHost {
    client: reqwest::Client,
    base_url: Url,
    page: Mutex<PageContext>,
}

impl StorefrontHost {
    /// Create a host for the given storefront base URL
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is invalid
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid storefront url: {e}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            page: Mutex::new(PageContext::default()),
        })
    }

    fn endpoint(&self, path: &str) -> Option<Url> {
        self.base_url.join(path).ok()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Option<T> {
        let url = self.endpoint(path)?;
        let response = self.client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().await.ok()
    }
}

#[async_trait]
impl HostPlatform for StorefrontHost {
    fn name(&self) -> &'static str {
        "storefront"
    }

    async fn page(&self) -> PageContext {
        self.page.lock().map(|p| p.clone()).unwrap_or_default()
    }

    async fn cart_count(&self) -> Capability<u32> {
        self.get_json::<CartResponse>("/cart.js")
            .await
            .map(|cart| cart.item_count)
            .into()
    }

    async fn product_by_handle(&self, handle: &str) -> Capability<ProductInfo> {
        self.get_json::<ProductResponse>(&format!("/products/{handle}.js"))
            .await
            .map(|p| ProductInfo {
                handle: p.handle,
                title: p.title,
                price: p.price,
                image: p.image,
                available: p.available,
            })
            .into()
    }

    async fn resolve_product(&self, name: &str) -> Capability<String> {
        let path = format!("/search/suggest.json?q={}", urlencoding::encode(name));
        self.get_json::<SuggestResponse>(&path)
            .await
            .and_then(|s| s.products.into_iter().next())
            .map(|p| p.handle)
            .into()
    }

    async fn cart_add(&self, handle: &str) -> Capability<u32> {
        let Some(url) = self.endpoint("/cart/add.js") else {
            return Capability::Unavailable;
        };

        let body = serde_json::json!({ "handle": handle, "quantity": 1 });
        let response = match self.client.post(url).json(&body).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(status = %r.status(), handle, "cart add rejected");
                return Capability::Unavailable;
            }
            Err(e) => {
                tracing::warn!(error = %e, handle, "cart add failed");
                return Capability::Unavailable;
            }
        };

        response
            .json::<CartResponse>()
            .await
            .ok()
            .map(|cart| cart.item_count)
            .into()
    }

    async fn navigate(&self, path: &str) -> Result<()> {
        let url = self
            .endpoint(path)
            .ok_or_else(|| Error::Host(format!("unresolvable path: {path}")))?;

        let context = classify_url(&url);
        tracing::info!(url = %url, kind = ?context.kind, "page navigation");

        if let Ok(mut page) = self.page.lock() {
            *page = context;
        }
        Ok(())
    }
}

/// Derive a page context from a storefront URL
fn classify_url(url: &Url) -> PageContext {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let (kind, handle) = match segments.as_slice() {
        ["products", handle, ..] => (PageKind::Product, Some((*handle).to_string())),
        ["collections", handle, ..] => (PageKind::Collection, Some((*handle).to_string())),
        ["search", ..] => (PageKind::Search, None),
        ["cart", ..] => (PageKind::Cart, None),
        ["checkout", ..] => (PageKind::Checkout, None),
        _ => (PageKind::Landing, None),
    };

    PageContext {
        kind,
        handle,
        url: Some(url.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(path: &str) -> PageContext {
        let url = Url::parse("https://shop.example").unwrap().join(path).unwrap();
        classify_url(&url)
    }

    #[test]
    fn product_urls_classify_with_handle() {
        let page = classify("/products/blue-runner");
        assert_eq!(page.kind, PageKind::Product);
        assert_eq!(page.handle.as_deref(), Some("blue-runner"));
    }

    #[test]
    fn cart_and_checkout_classify() {
        assert_eq!(classify("/cart").kind, PageKind::Cart);
        assert_eq!(classify("/checkout").kind, PageKind::Checkout);
    }

    #[test]
    fn search_with_query_classifies() {
        assert_eq!(classify("/search?q=tea").kind, PageKind::Search);
    }

    #[test]
    fn unknown_paths_are_landing() {
        assert_eq!(classify("/pages/about-us").kind, PageKind::Landing);
        assert_eq!(classify("/").kind, PageKind::Landing);
    }

    #[tokio::test]
    async fn navigation_updates_page_context() {
        let host = StorefrontHost::new("https://shop.example").unwrap();
        host.navigate("/products/blue-runner").await.unwrap();

        let page = host.page().await;
        assert_eq!(page.kind, PageKind::Product);
        assert_eq!(page.handle.as_deref(), Some("blue-runner"));
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        assert!(StorefrontHost::new("not a url").is_err());
    }
}
