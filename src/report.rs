//! Latest-snapshot report: the newest record per site.
//!
//! One row per site that produced at least one record with a parsable date
//! this run, written to `latest_entries.csv`. Operators read this file to
//! spot sites that have gone quiet or whose extraction broke.

use crate::models::CanonicalRecord;
use crate::utils::csv_row;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const REPORT_HEADER: &[&str] = &["SiteName", "date", "title", "link"];

/// Pick the max-dated record per site. Ties keep the first record in input
/// order. Sites with no parsable date at all are omitted.
pub fn latest_per_site(records: &[CanonicalRecord]) -> Vec<CanonicalRecord> {
    let mut latest: BTreeMap<&str, &CanonicalRecord> = BTreeMap::new();
    for record in records {
        let date = match record.parsed_date() {
            Some(d) => d,
            None => continue,
        };
        match latest.get(record.site.as_str()) {
            Some(current) if current.parsed_date().unwrap_or(chrono::NaiveDate::MIN) >= date => {}
            _ => {
                latest.insert(record.site.as_str(), record);
            }
        }
    }
    latest.into_values().cloned().collect()
}

#[instrument(level = "info", skip_all, fields(records = records.len()))]
pub async fn write_report(path: &Path, records: &[CanonicalRecord]) -> Result<(), Box<dyn Error>> {
    let rows = latest_per_site(records);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut out = String::new();
    out.push_str(&csv_row(REPORT_HEADER));
    out.push('\n');
    for r in &rows {
        out.push_str(&csv_row(&[&r.site, &r.date, &r.title, &r.link]));
        out.push('\n');
    }
    fs::write(path, out).await?;
    info!(path = %path.display(), sites = rows.len(), "Wrote latest-entries report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::INVALID_DATE;
    use tempfile::TempDir;

    fn record(site: &str, date: &str, title: &str) -> CanonicalRecord {
        CanonicalRecord {
            date: date.to_string(),
            site: site.to_string(),
            title: title.to_string(),
            link: format!("https://x/{title}"),
            description: String::new(),
            cve: String::new(),
            cvss: String::new(),
        }
    }

    #[test]
    fn test_max_date_wins_per_site() {
        let records = vec![
            record("A", "2024/03/01", "older"),
            record("A", "2024/03/09", "newest"),
            record("B", "2024/03/05", "only"),
        ];
        let latest = latest_per_site(&records);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].site, "A");
        assert_eq!(latest[0].title, "newest");
        assert_eq!(latest[1].site, "B");
    }

    #[test]
    fn test_tie_keeps_first_in_input_order() {
        let records = vec![
            record("A", "2024/03/09", "first"),
            record("A", "2024/03/09", "second"),
        ];
        let latest = latest_per_site(&records);
        assert_eq!(latest[0].title, "first");
    }

    #[test]
    fn test_all_invalid_dates_omits_site() {
        let records = vec![
            record("A", INVALID_DATE, "broken"),
            record("B", "2024/03/05", "fine"),
        ];
        let latest = latest_per_site(&records);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].site, "B");
    }

    #[tokio::test]
    async fn test_report_file_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latest_entries.csv");
        write_report(&path, &[record("A", "2024/03/09", "t")]).await.unwrap();
        let text = fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "\"SiteName\",\"date\",\"title\",\"link\"");
        assert_eq!(lines[1], "\"A\",\"2024/03/09\",\"t\",\"https://x/t\"");
    }
}
