//! Persisted record stores: per-site monthly history partitions and the
//! cross-site rolling aggregate.
//!
//! Two windows, two dedup keys, on purpose:
//! - **Monthly partitions** (`data_dir/YYYY/MM/<site>.csv`): merged on every
//!   run, dedup by `link` with the new record winning wholesale, 30-day
//!   retention, sorted date-descending.
//! - **Rolling aggregate** (`latest.csv`): rebuilt from scratch each run
//!   from the freshly fetched union, dedup by `(date, link)` with the last
//!   processed copy winning, 14-day window, sorted date-descending.
//!
//! Missing files are empty prior state. Malformed rows are skipped with a
//! warning; nothing in this module aborts the run.

use crate::models::CanonicalRecord;
use crate::utils::{csv_row, split_csv_line};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Column order of a site-month partition file.
pub const PARTITION_HEADER: &[&str] = &["date", "title", "link", "description", "cve", "cvss"];

/// Column order of the rolling aggregate and the filtered output file.
pub const AGGREGATE_HEADER: &[&str] =
    &["Date", "SiteName", "Title", "link", "Description", "CVE", "CVSS"];

const PARTITION_DAYS: i64 = 30;
const ROLLING_DAYS: i64 = 14;

/// Create a store file with its header row if it does not exist yet.
///
/// First runs start from empty files with headers, not from errors.
pub async fn ensure_file_with_header(path: &Path, header: &[&str]) -> Result<(), Box<dyn Error>> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, format!("{}\n", csv_row(header))).await?;
    info!(path = %path.display(), "Created empty store file");
    Ok(())
}

/// Merge one site's fetched records into its monthly history partitions.
///
/// Records with invalid dates or dates outside the 30-day window never
/// enter a partition. Within a partition, `link` is identity: a re-fetched
/// article replaces its previous row wholesale.
#[instrument(level = "info", skip_all, fields(site = %site, records = records.len()))]
pub async fn merge_partitions(
    data_dir: &Path,
    site: &str,
    records: &[CanonicalRecord],
    today: NaiveDate,
) -> Result<(), Box<dyn Error>> {
    let cutoff = today - Duration::days(PARTITION_DAYS);

    let mut by_month: BTreeMap<(i32, u32), Vec<&CanonicalRecord>> = BTreeMap::new();
    for record in records {
        let date = match record.parsed_date() {
            Some(d) => d,
            None => {
                debug!(link = %record.link, "Record without valid date excluded from history");
                continue;
            }
        };
        if date < cutoff {
            continue;
        }
        by_month.entry((date.year(), date.month())).or_default().push(record);
    }

    for ((year, month), entries) in by_month {
        let path = partition_path(data_dir, site, year, month);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let existing = read_partition(&path, site).await;

        // Ordered merge: existing rows first, new rows overwrite in place
        // by link or append.
        let mut merged: Vec<CanonicalRecord> = Vec::with_capacity(existing.len() + entries.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        for record in existing.into_iter().chain(entries.into_iter().cloned()) {
            match index.get(&record.link) {
                Some(&i) => merged[i] = record,
                None => {
                    index.insert(record.link.clone(), merged.len());
                    merged.push(record);
                }
            }
        }

        merged.retain(|r| r.parsed_date().map(|d| d >= cutoff).unwrap_or(false));
        merged.sort_by(|a, b| b.date.cmp(&a.date));

        let mut out = String::new();
        out.push_str(&csv_row(PARTITION_HEADER));
        out.push('\n');
        for r in &merged {
            out.push_str(&csv_row(&[
                &r.date,
                &r.title,
                &r.link,
                &r.description,
                &r.cve,
                &r.cvss,
            ]));
            out.push('\n');
        }
        fs::write(&path, out).await?;
        info!(path = %path.display(), entries = merged.len(), "Updated partition");
    }

    Ok(())
}

/// Read one site-month partition; missing file is empty prior state.
pub async fn read_partition(path: &Path, site: &str) -> Vec<CanonicalRecord> {
    let text = match fs::read_to_string(path).await {
        Ok(t) => t,
        Err(_) => return Vec::new(),
    };

    text.lines()
        .skip(1)
        .filter_map(|line| {
            let [date, title, link, description, cve, cvss] =
                match <[String; 6]>::try_from(split_csv_line(line)) {
                    Ok(fields) => fields,
                    Err(_) => {
                        warn!(path = %path.display(), line = %line, "Skipping malformed partition row");
                        return None;
                    }
                };
            Some(CanonicalRecord {
                date,
                site: site.to_string(),
                title,
                link,
                description,
                cve,
                cvss,
            })
        })
        .collect()
}

/// Rebuild the rolling aggregate from this run's full fetched union.
///
/// Derived, not appended to: prior file contents are irrelevant. Returns
/// the number of rows written.
#[instrument(level = "info", skip_all, fields(records = records.len()))]
pub async fn rebuild_rolling(
    path: &Path,
    records: &[CanonicalRecord],
    today: NaiveDate,
) -> Result<usize, Box<dyn Error>> {
    let cutoff = today - Duration::days(ROLLING_DAYS);

    // Dedup by (date, link), last processed copy wins but keeps the first
    // copy's position so input order stays meaningful for tie dates.
    let mut kept: Vec<CanonicalRecord> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    for record in records {
        let date = match record.parsed_date() {
            Some(d) => d,
            None => continue,
        };
        if date < cutoff {
            continue;
        }
        let key = (record.date.clone(), record.link.clone());
        match index.get(&key) {
            Some(&i) => kept[i] = record.clone(),
            None => {
                index.insert(key, kept.len());
                kept.push(record.clone());
            }
        }
    }

    kept.sort_by(|a, b| b.date.cmp(&a.date));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut out = String::new();
    out.push_str(&csv_row(AGGREGATE_HEADER));
    out.push('\n');
    for r in &kept {
        out.push_str(&csv_row(&[
            &r.date,
            &r.site,
            &r.title,
            &r.link,
            &r.description,
            &r.cve,
            &r.cvss,
        ]));
        out.push('\n');
    }
    fs::write(path, out).await?;
    info!(path = %path.display(), entries = kept.len(), "Rebuilt rolling aggregate");
    Ok(kept.len())
}

/// Read the rolling aggregate back for the filter stage.
///
/// Missing file is empty prior state (first run before any fetch).
pub async fn read_rolling(path: &Path) -> Vec<CanonicalRecord> {
    let text = match fs::read_to_string(path).await {
        Ok(t) => t,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Rolling aggregate not readable; treating as empty");
            return Vec::new();
        }
    };

    text.lines()
        .skip(1)
        .filter_map(|line| {
            let [date, site, title, link, description, cve, cvss] =
                match <[String; 7]>::try_from(split_csv_line(line)) {
                    Ok(fields) => fields,
                    Err(_) => {
                        warn!(path = %path.display(), line = %line, "Skipping malformed aggregate row");
                        return None;
                    }
                };
            Some(CanonicalRecord {
                date,
                site,
                title,
                link,
                description,
                cve,
                cvss,
            })
        })
        .collect()
}

/// Path of a site's partition for a given year and month.
pub fn partition_path(data_dir: &Path, site: &str, year: i32, month: u32) -> PathBuf {
    data_dir
        .join(format!("{year:04}"))
        .join(format!("{month:02}"))
        .join(format!("{site}.csv"))
}
