//! Keyword filtering and CVE/CVSS enrichment.
//!
//! Consumes the rolling aggregate and produces the filtered stream the
//! publication sinks work from. Per record: exclusion terms first, then
//! inclusion keywords, then a two-stage enrichment cascade (inline regex
//! over title and description, then a policy-gated fetch of the linked
//! advisory page). Enrichment failures leave fields empty; nothing in this
//! module writes placeholders or aborts the run.

use crate::config::{Config, SiteConfig};
use crate::cvss;
use crate::models::{CanonicalRecord, FilteredRecord};
use crate::utils::html_to_text;
use clap::ValueEnum;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

// Sites write identifiers in either case; the serial is capped at seven
// digits so a tracking id pasted after a CVE prefix is not swallowed.
static CVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCVE-\d{4}-\d{4,7}\b").unwrap());
static CVSS_SCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CVSS[:\s]{0,2}(\d\.\d)").unwrap());
static CVSS_VECTOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CVSS:\d\.\d/[A-Za-z:/]+").unwrap());

/// When the engine may fetch a record's linked advisory page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EnrichmentPolicy {
    /// Inline regex only; never touch the network.
    Inline,
    /// Fetch the linked page only when inline extraction left CVE or CVSS
    /// empty.
    #[default]
    FollowWhenMissing,
    /// Fetch every record's linked page.
    Always,
}

/// Apply keyword policy and enrichment to the rolling aggregate.
///
/// Output order matches input order. Records from sites absent from the
/// configuration are dropped with a warning; they indicate a renamed or
/// removed site whose history is still in the window.
#[instrument(level = "info", skip_all, fields(records = records.len(), policy = ?policy))]
pub async fn filter_records(
    records: &[CanonicalRecord],
    config: &Config,
    policy: EnrichmentPolicy,
    client: &Client,
) -> Vec<FilteredRecord> {
    let mut filtered = Vec::new();

    for record in records {
        let site = match config.sites.get(&record.site) {
            Some(s) => s,
            None => {
                warn!(site = %record.site, link = %record.link, "Record from unconfigured site; dropping");
                continue;
            }
        };

        if !passes_keyword_policy(record, site) {
            continue;
        }

        let mut out = record.clone();
        enrich_inline(&mut out);

        let follow = match policy {
            EnrichmentPolicy::Inline => false,
            EnrichmentPolicy::FollowWhenMissing => out.cve.is_empty() || out.cvss.is_empty(),
            EnrichmentPolicy::Always => true,
        };
        if follow {
            enrich_from_link(&mut out, client).await;
        }

        filtered.push(out);
    }

    info!(kept = filtered.len(), "Keyword filter and enrichment complete");
    filtered
}

/// Exclusion terms always win over inclusion keywords.
///
/// Inclusion: an empty keyword list for a field means that field imposes no
/// requirement; both fields' requirements must hold.
fn passes_keyword_policy(record: &CanonicalRecord, site: &SiteConfig) -> bool {
    let title = record.title.to_lowercase();
    let description = record.description.to_lowercase();

    for word in &site.remove_words {
        let w = word.to_lowercase();
        if !w.is_empty() && (title.contains(&w) || description.contains(&w)) {
            debug!(link = %record.link, word = %word, "Excluded by remove word");
            return false;
        }
    }

    let title_ok = site.filter_title_keywords.is_empty()
        || site
            .filter_title_keywords
            .iter()
            .any(|k| title.contains(&k.to_lowercase()));
    let description_ok = site.filter_description_keywords.is_empty()
        || site
            .filter_description_keywords
            .iter()
            .any(|k| description.contains(&k.to_lowercase()));

    title_ok && description_ok
}

/// Fill empty CVE/CVSS fields from the record's own text.
fn enrich_inline(record: &mut CanonicalRecord) {
    let text = format!("{} {}", record.title, record.description);
    if record.cve.is_empty() {
        record.cve = join_matches(CVE_RE.find_iter(&text).map(|m| m.as_str().to_uppercase()));
    }
    if record.cvss.is_empty() {
        record.cvss = join_matches(
            CVSS_SCORE_RE
                .captures_iter(&text)
                .map(|c| c[1].to_string()),
        );
    }
}

/// Fetch the linked advisory page and scan its visible text.
///
/// Fills only fields still empty. A full CVSS v3 vector found on the page
/// beats a bare score mention since we can compute the exact base score
/// from it.
async fn enrich_from_link(record: &mut CanonicalRecord, client: &Client) {
    let body = match fetch_page(client, &record.link).await {
        Ok(b) => b,
        Err(e) => {
            debug!(link = %record.link, error = %e, "Linked-page enrichment fetch failed");
            return;
        }
    };
    let text = html_to_text(&body);

    if record.cve.is_empty() {
        record.cve = join_matches(CVE_RE.find_iter(&text).map(|m| m.as_str().to_uppercase()));
    }
    if record.cvss.is_empty() {
        let vector_scores = CVSS_VECTOR_RE
            .find_iter(&text)
            .filter_map(|m| cvss::score_from_vector(m.as_str()))
            .map(|s| format!("{s:.1}"));
        record.cvss = join_matches(vector_scores);
    }
    if record.cvss.is_empty() {
        record.cvss = join_matches(
            CVSS_SCORE_RE
                .captures_iter(&text)
                .map(|c| c[1].to_string()),
        );
    }
}

async fn fetch_page(client: &Client, url: &str) -> Result<String, reqwest::Error> {
    client.get(url).send().await?.error_for_status()?.text().await
}

/// Dedup, sort, comma-join regex matches into one field value.
fn join_matches(matches: impl Iterator<Item = String>) -> String {
    let unique: BTreeSet<String> = matches.collect();
    unique.into_iter().join(", ")
}
