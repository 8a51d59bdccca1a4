//! Site extraction adapters and their dispatch.
//!
//! Each configured site declares a method tag selecting one adapter:
//!
//! | Method | Module | Mechanism |
//! |---------|-------------|----------------------------------------|
//! | `rss` | [`rss`] | feed-rs parse, lenient XML scan fallback |
//! | `html` | [`html`] | CSS-selector extraction per config |
//! | `browser` | [`browser`] | pluggable page renderer + selectors |
//!
//! All adapters return the same shape: a list of [`RawRecord`]s with dates
//! already normalized. [`fetch_site`] is the single entry point; it catches
//! every adapter failure so one unreachable site can never cancel its
//! siblings, and the pipeline still produces partial results.

pub mod browser;
pub mod html;
pub mod rss;

use crate::config::{FetchMethod, SiteConfig};
use crate::models::RawRecord;
use browser::PageRenderer;
use reqwest::Client;
use std::collections::BTreeMap;
use std::error::Error;
use tracing::{error, info, instrument, warn};

/// Errors crossing an adapter boundary. Adapters run inside
/// `buffer_unordered` tasks, so their failures must be `Send`.
pub type FetchError = Box<dyn Error + Send + Sync>;

/// Fetch one site's records through the adapter its config selects.
///
/// Never fails: adapter errors and unknown method tags are logged and
/// yield an empty list for that site only.
#[instrument(level = "info", skip_all, fields(site = %site_name))]
pub async fn fetch_site(
    client: &Client,
    renderer: Option<&dyn PageRenderer>,
    site_name: &str,
    site: &SiteConfig,
    tzinfos: &BTreeMap<String, String>,
) -> Vec<RawRecord> {
    let result = match site.method {
        FetchMethod::Rss => rss::fetch(client, site, tzinfos).await,
        FetchMethod::Html => html::fetch(client, site, tzinfos).await,
        FetchMethod::Browser => browser::fetch(renderer, site, tzinfos).await,
        FetchMethod::Unknown => {
            error!(url = %site.url, "Unknown fetch method in site config; skipping site");
            return Vec::new();
        }
    };

    match result {
        Ok(records) => {
            info!(count = records.len(), "Fetched site records");
            records
        }
        Err(e) => {
            error!(error = %e, url = %site.url, "Site fetch failed; contributing zero records");
            Vec::new()
        }
    }
}

/// Build the shared HTTP client used by every adapter and by linked-page
/// enrichment. The hard timeout is the per-call deadline that keeps a hung
/// fetch from stalling the worker pool.
pub fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .user_agent(concat!("vulnwatch/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "HTTP client builder failed; falling back to defaults");
            Client::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Selectors;

    fn site(method: FetchMethod, url: &str) -> SiteConfig {
        SiteConfig {
            method,
            url: url.to_string(),
            selectors: Selectors::default(),
            max_entries: None,
            date_formats: Vec::new(),
            filter_title_keywords: Vec::new(),
            filter_description_keywords: Vec::new(),
            remove_words: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_unknown_method_yields_empty() {
        let client = build_client(2);
        let s = site(FetchMethod::Unknown, "https://example.invalid/");
        let records = fetch_site(&client, None, "Bad Site", &s, &BTreeMap::new()).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_site_yields_empty_not_error() {
        let client = build_client(2);
        // Nothing listens here; the adapter error is absorbed at the boundary.
        let s = site(FetchMethod::Rss, "http://127.0.0.1:1/feed.xml");
        let records = fetch_site(&client, None, "Dead Site", &s, &BTreeMap::new()).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_browser_without_renderer_yields_empty() {
        let client = build_client(2);
        let s = site(FetchMethod::Browser, "https://example.invalid/");
        let records = fetch_site(&client, None, "JS Site", &s, &BTreeMap::new()).await;
        assert!(records.is_empty());
    }
}
