//! Data models for advisory records as they move through the pipeline.
//!
//! - [`RawRecord`]: what a site adapter extracts (date already normalized)
//! - [`CanonicalRecord`]: a raw record attached to its site identity
//! - [`FilteredRecord`]: a canonical record that passed keyword policy and
//!   enrichment
//!
//! The single "absent" representation for every text field is the empty
//! string. The single failed-date representation is [`INVALID_DATE`].

use crate::utils::clean_text;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel for a date that could not be normalized.
///
/// Records carrying this value are excluded from every time-windowed store.
pub const INVALID_DATE: &str = "Invalid Date";

/// Canonical date format used everywhere in the pipeline.
pub const DATE_FMT: &str = "%Y/%m/%d";

/// An article as extracted by a site adapter.
///
/// The `date` field holds the already-normalized `YYYY/MM/DD` string (or
/// [`INVALID_DATE`]); adapters run the date normalizer inline. All other
/// fields are free text with whitespace collapsed; empty means absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub title: String,
    pub link: String,
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cve: String,
    #[serde(default)]
    pub cvss: String,
}

impl RawRecord {
    /// Collapse whitespace in every text field and trim the link.
    ///
    /// Adapters call this once before returning, so downstream code can rely
    /// on single-line fields.
    pub fn cleaned(self) -> Self {
        Self {
            title: clean_text(&self.title),
            link: self.link.trim().to_string(),
            date: self.date,
            description: clean_text(&self.description),
            cve: clean_text(&self.cve),
            cvss: clean_text(&self.cvss),
        }
    }
}

/// A raw record bound to the site it came from.
///
/// `link` is the identity key for dedup within a site-month partition; the
/// rolling aggregate dedups by `(date, link)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub date: String,
    pub site: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub cve: String,
    pub cvss: String,
}

impl CanonicalRecord {
    pub fn from_raw(site: &str, raw: RawRecord) -> Self {
        Self {
            date: raw.date,
            site: site.to_string(),
            title: raw.title,
            link: raw.link,
            description: raw.description,
            cve: raw.cve,
            cvss: raw.cvss,
        }
    }

    /// Parse the canonical date, if valid.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, DATE_FMT).ok()
    }

    pub fn has_valid_date(&self) -> bool {
        self.parsed_date().is_some()
    }
}

/// A canonical record that passed the site's keyword policy, with CVE/CVSS
/// enrichment resolved as far as the configured policy allows.
///
/// Sinks may dedup against their own persisted state but must not mutate the
/// semantic fields.
pub type FilteredRecord = CanonicalRecord;

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: &str, link: &str) -> RawRecord {
        RawRecord {
            title: "Example  advisory\n title".to_string(),
            link: format!(" {link} "),
            date: date.to_string(),
            description: "line one\nline two".to_string(),
            cve: String::new(),
            cvss: String::new(),
        }
    }

    #[test]
    fn test_cleaned_collapses_fields() {
        let r = raw("2024/01/05", "https://example.com/a").cleaned();
        assert_eq!(r.title, "Example advisory title");
        assert_eq!(r.link, "https://example.com/a");
        assert_eq!(r.description, "line one line two");
    }

    #[test]
    fn test_from_raw_attaches_site() {
        let rec = CanonicalRecord::from_raw("Example Site", raw("2024/01/05", "https://x/a").cleaned());
        assert_eq!(rec.site, "Example Site");
        assert_eq!(rec.date, "2024/01/05");
        assert!(rec.has_valid_date());
        assert_eq!(
            rec.parsed_date(),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
    }

    #[test]
    fn test_invalid_date_is_not_parsable() {
        let rec = CanonicalRecord::from_raw("S", raw(INVALID_DATE, "https://x/a").cleaned());
        assert!(!rec.has_valid_date());
        assert!(rec.parsed_date().is_none());
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let rec = CanonicalRecord {
            date: "2024/02/10".to_string(),
            site: "S".to_string(),
            title: "T".to_string(),
            link: "https://x/a".to_string(),
            description: String::new(),
            cve: "CVE-2024-0001".to_string(),
            cvss: "7.5".to_string(),
        };
        let json = serde_json::to_string(&rec).unwrap();
        let back: CanonicalRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_raw_record_defaults_absent_fields() {
        let json = r#"{"title":"T","link":"https://x/a","date":"2024/01/01"}"#;
        let r: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.description, "");
        assert_eq!(r.cve, "");
        assert_eq!(r.cvss, "");
    }
}
