//! Selector-driven HTML extraction.
//!
//! The generic adapter for sites that publish advisories as a static
//! listing page. The site config names a `rows` selector plus per-field
//! selectors applied within each row; link values are resolved against the
//! site URL. Rows missing a title or a link are skipped with a warning
//! rather than producing half-empty records.

use crate::config::SiteConfig;
use crate::dates;
use crate::models::{RawRecord, INVALID_DATE};
use crate::utils::{clean_text, truncate_for_log};
use super::FetchError;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};
use url::Url;

#[instrument(level = "debug", skip_all, fields(url = %site.url))]
pub async fn fetch(
    client: &Client,
    site: &SiteConfig,
    tzinfos: &BTreeMap<String, String>,
) -> Result<Vec<RawRecord>, FetchError> {
    let body = client.get(&site.url).send().await?.error_for_status()?.text().await?;
    Ok(extract_records(&body, site, tzinfos))
}

/// Apply the configured selectors to a fetched page.
///
/// Split from the fetch so the browser adapter can reuse it on rendered
/// HTML, and so extraction is testable without a network.
pub fn extract_records(
    body: &str,
    site: &SiteConfig,
    tzinfos: &BTreeMap<String, String>,
) -> Vec<RawRecord> {
    let document = Html::parse_document(body);

    let rows_selector = match parse_selector(&site.selectors.rows, "rows") {
        Some(s) => s,
        None => return Vec::new(),
    };

    let limit = site.max_entries.unwrap_or(usize::MAX);
    let mut records = Vec::new();

    for row in document.select(&rows_selector).take(limit) {
        let title = select_text(&row, &site.selectors.title);
        let link = select_link(&row, &site.selectors.link, &site.url);

        if title.is_empty() || link.is_empty() {
            warn!(row = %truncate_for_log(&clean_text(&row.html()), 120),
                  "Row missing title or link; skipping");
            continue;
        }

        let date = match select_text(&row, &site.selectors.date) {
            s if s.is_empty() => INVALID_DATE.to_string(),
            s => dates::normalize(&s, &site.date_formats, tzinfos),
        };
        let description = select_text(&row, &site.selectors.description);

        records.push(
            RawRecord {
                title,
                link,
                date,
                description,
                cve: String::new(),
                cvss: String::new(),
            }
            .cleaned(),
        );
    }

    debug!(count = records.len(), "Extracted rows from listing page");
    records
}

fn parse_selector(selector: &str, field: &str) -> Option<Selector> {
    if selector.is_empty() {
        warn!(field, "Empty selector in site config");
        return None;
    }
    match Selector::parse(selector) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(field, selector, error = %e, "Invalid selector in site config");
            None
        }
    }
}

/// Text of the first element the selector matches within the row; empty
/// selector or no match yields the empty string.
fn select_text(row: &ElementRef, selector: &str) -> String {
    if selector.is_empty() {
        return String::new();
    }
    let parsed = match Selector::parse(selector) {
        Ok(s) => s,
        Err(_) => return String::new(),
    };
    row.select(&parsed)
        .next()
        .map(|el| clean_text(&el.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default()
}

/// Resolve the row's link: the `href` of the first match (or of the row
/// itself when the row element carries it), joined against the site URL.
fn select_link(row: &ElementRef, selector: &str, base: &str) -> String {
    let href = if selector.is_empty() {
        row.value().attr("href").map(|s| s.to_string())
    } else {
        match Selector::parse(selector) {
            Ok(s) => row
                .select(&s)
                .next()
                .and_then(|el| el.value().attr("href"))
                .map(|s| s.to_string())
                .or_else(|| row.value().attr("href").map(|s| s.to_string())),
            Err(_) => None,
        }
    };

    let href = match href {
        Some(h) => h.trim().to_string(),
        None => return String::new(),
    };

    match Url::parse(base).and_then(|b| b.join(&href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchMethod, Selectors};

    fn site() -> SiteConfig {
        SiteConfig {
            method: FetchMethod::Html,
            url: "https://example.com/news/".to_string(),
            selectors: Selectors {
                rows: "div.item".to_string(),
                title: "a.t".to_string(),
                link: "a.t".to_string(),
                date: "span.d".to_string(),
                description: "p.s".to_string(),
            },
            max_entries: Some(10),
            date_formats: vec!["%d %b %Y".to_string()],
            filter_title_keywords: Vec::new(),
            filter_description_keywords: Vec::new(),
            remove_words: Vec::new(),
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <div class="item">
            <a class="t" href="/advisories/a1">First advisory</a>
            <span class="d">05 Jan 2024</span>
            <p class="s">Fixes CVE-2024-0001.</p>
          </div>
          <div class="item">
            <a class="t" href="https://other.example.org/a2">Second
               advisory</a>
            <span class="d">garbage date</span>
          </div>
          <div class="item">
            <span class="d">06 Jan 2024</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_extracts_rows_with_resolved_links() {
        let records = extract_records(PAGE, &site(), &BTreeMap::new());
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].title, "First advisory");
        assert_eq!(records[0].link, "https://example.com/advisories/a1");
        assert_eq!(records[0].date, "2024/01/05");
        assert_eq!(records[0].description, "Fixes CVE-2024-0001.");

        // Absolute links pass through; whitespace in titles collapses.
        assert_eq!(records[1].title, "Second advisory");
        assert_eq!(records[1].link, "https://other.example.org/a2");
        assert_eq!(records[1].date, INVALID_DATE);
        assert_eq!(records[1].description, "");
    }

    #[test]
    fn test_row_without_link_is_skipped() {
        let records = extract_records(PAGE, &site(), &BTreeMap::new());
        assert!(records.iter().all(|r| !r.link.is_empty()));
    }

    #[test]
    fn test_max_entries_caps_rows() {
        let mut s = site();
        s.max_entries = Some(1);
        let records = extract_records(PAGE, &s, &BTreeMap::new());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_missing_rows_selector_yields_empty() {
        let mut s = site();
        s.selectors.rows = String::new();
        assert!(extract_records(PAGE, &s, &BTreeMap::new()).is_empty());
        s.selectors.rows = ":::not a selector".to_string();
        assert!(extract_records(PAGE, &s, &BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_row_element_carrying_href() {
        let mut s = site();
        s.selectors = Selectors {
            rows: "a.row".to_string(),
            title: "span.t".to_string(),
            link: String::new(),
            date: "span.d".to_string(),
            description: String::new(),
        };
        let page = r#"<a class="row" href="/x"><span class="t">T</span>
                      <span class="d">05 Jan 2024</span></a>"#;
        let records = extract_records(page, &s, &BTreeMap::new());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].link, "https://example.com/x");
    }
}
