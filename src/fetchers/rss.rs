//! RSS/Atom feed extraction.
//!
//! Primary path: parse the fetched body with feed-rs, which understands
//! RSS 0.9x/1.0/2.0 and Atom. Some advisory feeds are malformed enough
//! that feed-rs yields nothing; for those a lenient `<item>` scan over the
//! raw XML recovers title/link/pubDate/description (the same two-step the
//! listing sites need in practice).

use crate::config::SiteConfig;
use crate::dates;
use crate::models::{RawRecord, INVALID_DATE};
use crate::utils::html_to_text;
use super::FetchError;
use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

#[instrument(level = "debug", skip_all, fields(url = %site.url))]
pub async fn fetch(
    client: &Client,
    site: &SiteConfig,
    tzinfos: &BTreeMap<String, String>,
) -> Result<Vec<RawRecord>, FetchError> {
    let body = client.get(&site.url).send().await?.error_for_status()?.text().await?;

    let records = extract_records(&body);
    if !records.is_empty() {
        return Ok(records);
    }

    debug!("feed-rs produced no entries; trying lenient item scan");
    Ok(extract_records_lenient(&body, site, tzinfos))
}

/// Map feed-rs entries to raw records. Timestamps arrive already parsed,
/// so no site-format pass is needed on this path.
pub fn extract_records(body: &str) -> Vec<RawRecord> {
    let feed = match parser::parse(body.as_bytes()) {
        Ok(feed) => feed,
        Err(e) => {
            warn!(error = %e, "Feed parse failed");
            return Vec::new();
        }
    };

    feed.entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let link = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();
            if link.is_empty() {
                warn!(%title, "Feed entry without link; skipping");
                return None;
            }

            let date = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.format(crate::models::DATE_FMT).to_string())
                .unwrap_or_else(|| INVALID_DATE.to_string());

            let description = entry
                .summary
                .map(|s| html_to_text(&s.content))
                .unwrap_or_default();

            Some(
                RawRecord {
                    title,
                    link,
                    date,
                    description,
                    cve: String::new(),
                    cvss: String::new(),
                }
                .cleaned(),
            )
        })
        .collect()
}

/// Lenient scan for `<item>` blocks in raw XML that feed-rs rejected.
///
/// Collects the text (including CDATA) of title/link/pubDate/description
/// children; dates go through the site's normalizer since nothing parsed
/// them yet.
pub fn extract_records_lenient(
    body: &str,
    site: &SiteConfig,
    tzinfos: &BTreeMap<String, String>,
) -> Vec<RawRecord> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut in_item = false;
    let mut field: Option<String> = None;
    let mut item: BTreeMap<String, String> = BTreeMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    in_item = true;
                    item.clear();
                } else if in_item {
                    field = Some(name);
                }
            }
            Ok(Event::Text(t)) => {
                if let (true, Some(name)) = (in_item, field.as_ref()) {
                    let text = t.unescape().unwrap_or_default().to_string();
                    item.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let (true, Some(name)) = (in_item, field.as_ref()) {
                    let text = String::from_utf8_lossy(&t.into_inner()).to_string();
                    item.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    in_item = false;
                    if let Some(record) = item_to_record(&item, site, tzinfos) {
                        records.push(record);
                    }
                } else if field.as_deref() == Some(name.as_str()) {
                    field = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "Lenient feed scan aborted");
                break;
            }
            _ => {}
        }
    }

    debug!(count = records.len(), "Lenient feed scan complete");
    records
}

fn item_to_record(
    item: &BTreeMap<String, String>,
    site: &SiteConfig,
    tzinfos: &BTreeMap<String, String>,
) -> Option<RawRecord> {
    let title = item.get("title").cloned().unwrap_or_default();
    let link = item.get("link").cloned().unwrap_or_default();
    if link.trim().is_empty() {
        return None;
    }

    let date = match item.get("pubDate").or_else(|| item.get("date")) {
        Some(raw) => dates::normalize(raw, &site.date_formats, tzinfos),
        None => INVALID_DATE.to_string(),
    };
    let description = item
        .get("description")
        .map(|d| html_to_text(d))
        .unwrap_or_default();

    Some(
        RawRecord {
            title,
            link,
            date,
            description,
            cve: String::new(),
            cvss: String::new(),
        }
        .cleaned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchMethod, Selectors};

    fn site() -> SiteConfig {
        SiteConfig {
            method: FetchMethod::Rss,
            url: "https://example.com/feed.xml".to_string(),
            selectors: Selectors::default(),
            max_entries: None,
            date_formats: Vec::new(),
            filter_title_keywords: Vec::new(),
            filter_description_keywords: Vec::new(),
            remove_words: Vec::new(),
        }
    }

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Advisories</title>
    <link>https://example.com</link>
    <description>Security notices</description>
    <item>
      <title>Critical fix for widget parser</title>
      <link>https://example.com/advisories/a1</link>
      <pubDate>Tue, 09 Jan 2024 10:00:00 +0000</pubDate>
      <description>&lt;p&gt;Addresses CVE-2024-0001 (CVSS 9.8)&lt;/p&gt;</description>
    </item>
    <item>
      <title>Minor update</title>
      <link>https://example.com/advisories/a2</link>
      <pubDate>Wed, 10 Jan 2024 08:30:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_feed_entries_mapped() {
        let records = extract_records(FEED);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Critical fix for widget parser");
        assert_eq!(records[0].link, "https://example.com/advisories/a1");
        assert_eq!(records[0].date, "2024/01/09");
        assert_eq!(records[0].description, "Addresses CVE-2024-0001 (CVSS 9.8)");
        assert_eq!(records[1].date, "2024/01/10");
        assert_eq!(records[1].description, "");
    }

    #[test]
    fn test_unparsable_body_yields_empty() {
        assert!(extract_records("not xml at all").is_empty());
    }

    #[test]
    fn test_lenient_scan_recovers_items() {
        // Missing the <rss> root: feed-rs rejects it, the scan does not.
        let broken = r#"<channel><item>
            <title>Orphan advisory</title>
            <link>https://example.com/advisories/a3</link>
            <pubDate>Thu, 11 Jan 2024 09:00:00 +0000</pubDate>
            <description><![CDATA[Patch for <b>CVE-2024-0002</b>]]></description>
          </item></channel>"#;
        let records = extract_records_lenient(broken, &site(), &BTreeMap::new());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Orphan advisory");
        assert_eq!(records[0].date, "2024/01/11");
        assert_eq!(records[0].description, "Patch for CVE-2024-0002");
    }

    #[test]
    fn test_lenient_scan_skips_linkless_items() {
        let broken = "<item><title>No link</title></item>";
        assert!(extract_records_lenient(broken, &site(), &BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_lenient_scan_decodes_entity_references() {
        let broken = r#"<item>
            <title>Fix &amp; patch &lt;parser&gt;</title>
            <link>https://example.com/advisories/a4</link>
            <pubDate>Fri, 12 Jan 2024 09:00:00 +0000</pubDate>
          </item>"#;
        let records = extract_records_lenient(broken, &site(), &BTreeMap::new());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Fix & patch <parser>");
    }
}
