//! Site configuration loading.
//!
//! Configuration is one YAML file, loaded once at process start and treated
//! as immutable for the run. It carries the per-site extraction descriptors,
//! keyword filter lists, and a table of named timezone abbreviations used by
//! the date normalizer.
//!
//! ```yaml
//! timezones:
//!   JST: "+0900"
//!   PST: "-0800"
//! sites:
//!   NGINX News:
//!     method: html
//!     url: https://nginx.org/news.html
//!     selectors:
//!       rows: "div.news-item"
//!       title: "a.title"
//!       link: "a.title"
//!       date: "span.date"
//!       description: "p.summary"
//!     max_entries: 10
//!     date_formats: ["%d %b %Y"]
//!     filter_title_keywords: ["security"]
//!     remove_words: ["webinar"]
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use tracing::{info, instrument};

/// Extraction method tag for a site.
///
/// Unrecognized tags deserialize to [`FetchMethod::Unknown`] so a single
/// misconfigured site cannot abort loading; the dispatcher logs it and
/// contributes zero records for that site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    Rss,
    Html,
    Browser,
    #[serde(other)]
    Unknown,
}

/// CSS selector descriptors for the `html` and `browser` methods.
///
/// `rows` selects one element per article; the per-field selectors are
/// applied within each row. Empty selectors mean the field is not present
/// on that site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selectors {
    #[serde(default)]
    pub rows: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
}

/// Per-site configuration, consumed read-only by the whole pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub method: FetchMethod,
    pub url: String,
    #[serde(default)]
    pub selectors: Selectors,
    /// Cap on rows taken from a listing page. None means take all.
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// Site-specific date format strings, tried in order before the
    /// permissive parser.
    #[serde(default)]
    pub date_formats: Vec<String>,
    #[serde(default)]
    pub filter_title_keywords: Vec<String>,
    #[serde(default)]
    pub filter_description_keywords: Vec<String>,
    #[serde(default)]
    pub remove_words: Vec<String>,
}

/// Whole configuration file: the timezone-abbreviation table plus the site
/// map. `BTreeMap` keeps site iteration order deterministic.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timezones: BTreeMap<String, String>,
    pub sites: BTreeMap<String, SiteConfig>,
}

impl Config {
    /// Load and parse the configuration file.
    ///
    /// A missing or malformed file is the one unrecoverable error in the
    /// pipeline; everything downstream degrades gracefully instead.
    #[instrument(level = "info")]
    pub fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&text)?;
        info!(
            sites = config.sites.len(),
            timezones = config.timezones.len(),
            "Loaded site configuration"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
timezones:
  JST: "+0900"
sites:
  Example RSS:
    method: rss
    url: https://example.com/feed.xml
    date_formats: ["%a, %d %b %Y %H:%M:%S %z"]
    filter_title_keywords: ["Critical"]
    remove_words: ["Beta"]
  Example HTML:
    method: html
    url: https://example.com/news
    selectors:
      rows: "div.item"
      title: "a"
      link: "a"
      date: "span.date"
    max_entries: 5
  Example Future:
    method: quantum
    url: https://example.com/q
"#;

    #[test]
    fn test_parse_sample_config() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.sites.len(), 3);
        assert_eq!(config.timezones.get("JST").unwrap(), "+0900");

        let rss = &config.sites["Example RSS"];
        assert_eq!(rss.method, FetchMethod::Rss);
        assert_eq!(rss.filter_title_keywords, vec!["Critical"]);
        assert_eq!(rss.remove_words, vec!["Beta"]);
        assert!(rss.filter_description_keywords.is_empty());

        let html = &config.sites["Example HTML"];
        assert_eq!(html.method, FetchMethod::Html);
        assert_eq!(html.selectors.rows, "div.item");
        assert_eq!(html.max_entries, Some(5));
    }

    #[test]
    fn test_unknown_method_does_not_fail_load() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.sites["Example Future"].method, FetchMethod::Unknown);
    }

    #[test]
    fn test_sites_iterate_in_name_order() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let names: Vec<&String> = config.sites.keys().collect();
        assert_eq!(names, vec!["Example Future", "Example HTML", "Example RSS"]);
    }
}
