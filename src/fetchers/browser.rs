//! JS-rendered page extraction.
//!
//! Sites that build their advisory list client-side need a real browser
//! session to produce HTML worth scraping. That machinery stays outside
//! this crate: callers register a [`PageRenderer`] and the adapter applies
//! the same selector extraction the plain HTML adapter uses to whatever the
//! renderer returns. With no renderer registered the site contributes zero
//! records, logged once per run.

use crate::config::SiteConfig;
use crate::models::RawRecord;
use super::html;
use super::FetchError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{instrument, warn};

/// Capability for rendering a JS-driven page to final HTML.
///
/// Implementations wrap a headless-browser session (or a test stub). The
/// renderer owns its own timeouts; the dispatcher treats any error as a
/// normal per-site fetch failure.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, FetchError>;
}

#[instrument(level = "debug", skip_all, fields(url = %site.url))]
pub async fn fetch(
    renderer: Option<&dyn PageRenderer>,
    site: &SiteConfig,
    tzinfos: &BTreeMap<String, String>,
) -> Result<Vec<RawRecord>, FetchError> {
    let renderer = match renderer {
        Some(r) => r,
        None => {
            warn!("Site requires a browser but no page renderer is registered; skipping");
            return Ok(Vec::new());
        }
    };

    let body = renderer.render(&site.url).await?;
    Ok(html::extract_records(&body, site, tzinfos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchMethod, Selectors};

    struct StubRenderer(&'static str);

    #[async_trait]
    impl PageRenderer for StubRenderer {
        async fn render(&self, _url: &str) -> Result<String, FetchError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingRenderer;

    #[async_trait]
    impl PageRenderer for FailingRenderer {
        async fn render(&self, _url: &str) -> Result<String, FetchError> {
            Err("browser session crashed".into())
        }
    }

    fn site() -> SiteConfig {
        SiteConfig {
            method: FetchMethod::Browser,
            url: "https://example.com/spa".to_string(),
            selectors: Selectors {
                rows: "div.adv".to_string(),
                title: "a".to_string(),
                link: "a".to_string(),
                date: "time".to_string(),
                description: String::new(),
            },
            max_entries: None,
            date_formats: Vec::new(),
            filter_title_keywords: Vec::new(),
            filter_description_keywords: Vec::new(),
            remove_words: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_rendered_page_goes_through_selector_extraction() {
        let rendered = r#"<div class="adv"><a href="/a1">Rendered advisory</a>
                          <time>2024-01-05</time></div>"#;
        let stub = StubRenderer(rendered);
        let records = fetch(Some(&stub), &site(), &BTreeMap::new()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Rendered advisory");
        assert_eq!(records[0].date, "2024/01/05");
    }

    #[tokio::test]
    async fn test_missing_renderer_is_empty_not_error() {
        let records = fetch(None, &site(), &BTreeMap::new()).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_renderer_error_propagates_to_dispatch() {
        let err = fetch(Some(&FailingRenderer), &site(), &BTreeMap::new()).await;
        assert!(err.is_err());
    }
}
