//! Spreadsheet-style table sink (`vulnerability_table.csv`).
//!
//! Unlike the other sinks this one carries operator state across runs: the
//! `Post` column tracks whether an advisory has been posted downstream, so
//! on a link collision the existing row wins wholesale and only genuinely
//! new links are appended (with `Post` set to the unposted marker).
//! Retention is 7 days; rows sort by `(Date desc, Site desc)`.

use crate::config::Config;
use crate::models::FilteredRecord;
use crate::utils::{csv_row, split_csv_line};
use chrono::{Duration, NaiveDate};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

pub const TABLE_HEADER: &[&str] = &[
    "Date", "Site", "SiteLink", "Title", "Description", "CVE", "CVSS", "link", "Post",
];

pub const UNPOSTED: &str = "unposted";

const RETENTION_DAYS: i64 = 7;

/// One table row. Field order matches [`TABLE_HEADER`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub date: String,
    pub site: String,
    pub site_link: String,
    pub title: String,
    pub description: String,
    pub cve: String,
    pub cvss: String,
    pub link: String,
    pub post: String,
}

impl TableRow {
    fn from_record(record: &FilteredRecord, config: &Config) -> Self {
        let site_link = config
            .sites
            .get(&record.site)
            .map(|s| s.url.clone())
            .unwrap_or_default();
        Self {
            date: record.date.clone(),
            site: record.site.clone(),
            site_link,
            title: record.title.clone(),
            description: record.description.clone(),
            cve: record.cve.clone(),
            cvss: record.cvss.clone(),
            link: record.link.clone(),
            post: UNPOSTED.to_string(),
        }
    }

    fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, crate::models::DATE_FMT).ok()
    }
}

/// Merge this run's filtered records into the persisted table.
#[instrument(level = "info", skip_all, fields(records = records.len()))]
pub async fn update(
    path: &Path,
    records: &[FilteredRecord],
    config: &Config,
    today: NaiveDate,
) -> Result<(), Box<dyn Error>> {
    let cutoff = today - Duration::days(RETENTION_DAYS);

    let mut rows = read_table(path).await;
    let mut known: HashSet<String> = rows.iter().map(|r| r.link.clone()).collect();

    // Existing rows win: they carry Post state a new row would reset.
    for record in records {
        if known.contains(&record.link) {
            continue;
        }
        known.insert(record.link.clone());
        rows.push(TableRow::from_record(record, config));
    }

    rows.retain(|r| r.parsed_date().map(|d| d >= cutoff).unwrap_or(false));
    rows.sort_by_key(|r| (Reverse(r.date.clone()), Reverse(r.site.clone())));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut out = String::new();
    out.push_str(&csv_row(TABLE_HEADER));
    out.push('\n');
    for r in &rows {
        out.push_str(&csv_row(&[
            &r.date,
            &r.site,
            &r.site_link,
            &r.title,
            &r.description,
            &r.cve,
            &r.cvss,
            &r.link,
            &r.post,
        ]));
        out.push('\n');
    }
    fs::write(path, out).await?;
    info!(path = %path.display(), rows = rows.len(), "Updated vulnerability table");
    Ok(())
}

/// Read the persisted table; missing file is empty prior state.
pub async fn read_table(path: &Path) -> Vec<TableRow> {
    let text = match fs::read_to_string(path).await {
        Ok(t) => t,
        Err(_) => return Vec::new(),
    };

    text.lines()
        .skip(1)
        .filter_map(|line| {
            let [date, site, site_link, title, description, cve, cvss, link, post] =
                match <[String; 9]>::try_from(split_csv_line(line)) {
                    Ok(fields) => fields,
                    Err(_) => {
                        warn!(path = %path.display(), line = %line, "Skipping malformed table row");
                        return None;
                    }
                };
            Some(TableRow {
                date,
                site,
                site_link,
                title,
                description,
                cve,
                cvss,
                link,
                post,
            })
        })
        .collect()
}
