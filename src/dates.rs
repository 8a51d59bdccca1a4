//! Date normalization.
//!
//! Every date string scraped from an advisory site passes through
//! [`normalize`], which produces either the canonical `YYYY/MM/DD` form or
//! the [`INVALID_DATE`] sentinel. The function is total: no input raises,
//! and callers treat the sentinel as a droppable value.
//!
//! Resolution order, first success wins:
//! 1. strip ordinal suffixes and known boilerplate prefixes
//! 2. site-specific format strings, in configured order
//! 3. a permissive pass over common formats, resolving trailing named
//!    timezone abbreviations through the configured table
//! 4. the permissive pass again with any trailing zone token dropped
//! 5. `"Invalid Date"`

use crate::models::{DATE_FMT, INVALID_DATE};
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)(st|nd|rd|th)").expect("ordinal regex"));

/// Boilerplate the sites prepend to otherwise-parsable dates.
const STRIP_PREFIXES: &[&str] = &["Last updated", "Security Bulletin - "];

/// Formats tried by the permissive pass when no site format matched.
/// Ordered from most to least specific so a timestamped string is not
/// truncated by a date-only pattern with a partial match.
const COMMON_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y年%m月%d日",
    "%A, %B %d, %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%m/%d/%Y",
];

/// Zoned formats tried after a timezone abbreviation has been replaced with
/// its numeric offset.
const ZONED_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%B %d, %Y %H:%M:%S %z",
];

/// Normalize an arbitrary date string to `YYYY/MM/DD` or [`INVALID_DATE`].
///
/// `site_formats` are chrono format strings from the site's configuration;
/// `tzinfos` maps timezone abbreviations (`"JST"`) to numeric offsets
/// (`"+0900"`).
pub fn normalize(raw: &str, site_formats: &[String], tzinfos: &BTreeMap<String, String>) -> String {
    let cleaned = preclean(raw);
    if cleaned.is_empty() {
        return INVALID_DATE.to_string();
    }

    for fmt in site_formats {
        if let Some(date) = try_format(&cleaned, fmt) {
            return date.format(DATE_FMT).to_string();
        }
    }

    if let Some(date) = permissive_parse(&cleaned, tzinfos) {
        return date.format(DATE_FMT).to_string();
    }

    // Trailing zone tokens ("GMT", "AEST", ...) outside the configured table
    // defeat the zoned formats; drop the token and retry.
    if let Some(stripped) = strip_trailing_zone(&cleaned) {
        if let Some(date) = permissive_parse(&stripped, tzinfos) {
            return date.format(DATE_FMT).to_string();
        }
    }

    INVALID_DATE.to_string()
}

fn preclean(raw: &str) -> String {
    let mut s = ORDINAL_RE.replace_all(raw, "$1").to_string();
    for prefix in STRIP_PREFIXES {
        s = s.replace(prefix, "");
    }
    s.trim().to_string()
}

fn try_format(text: &str, fmt: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
        return Some(date);
    }
    // Formats with an offset field need the zoned parser.
    DateTime::parse_from_str(text, fmt).map(|dt| dt.date_naive()).ok()
}

fn permissive_parse(text: &str, tzinfos: &BTreeMap<String, String>) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }

    for fmt in COMMON_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date);
        }
    }

    // Trailing named zone: substitute its numeric offset and try again with
    // the zoned formats (RFC2822 itself only accepts a handful of names).
    if let Some((head, abbrev)) = split_trailing_token(text) {
        if let Some(offset) = tzinfos.get(abbrev) {
            let candidate = format!("{head} {offset}");
            if let Ok(dt) = DateTime::parse_from_rfc2822(&candidate) {
                return Some(dt.date_naive());
            }
            for fmt in ZONED_FORMATS {
                if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
                    return Some(dt.date_naive());
                }
            }
        }
    }

    None
}

/// Split off a trailing all-alphabetic token (a zone abbreviation candidate).
fn split_trailing_token(text: &str) -> Option<(&str, &str)> {
    let (head, tail) = text.rsplit_once(char::is_whitespace)?;
    if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_alphabetic()) {
        Some((head.trim_end(), tail))
    } else {
        None
    }
}

fn strip_trailing_zone(text: &str) -> Option<String> {
    split_trailing_token(text).map(|(head, _)| head.to_string())
}
