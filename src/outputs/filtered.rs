//! Filtered-stream CSV sink (`filtered.csv`).

use crate::models::FilteredRecord;
use crate::store::AGGREGATE_HEADER;
use crate::utils::csv_row;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Write the filtered records in their given order, same column shape as
/// the rolling aggregate.
#[instrument(level = "info", skip_all, fields(records = records.len()))]
pub async fn write(path: &Path, records: &[FilteredRecord]) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut out = String::new();
    out.push_str(&csv_row(AGGREGATE_HEADER));
    out.push('\n');
    for r in records {
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
    info!(path = %path.display(), "Wrote filtered stream");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_records_in_order_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("filtered.csv");
        let records = vec![
            FilteredRecord {
                date: "2024/03/09".to_string(),
                site: "A".to_string(),
                title: "With \"quotes\"".to_string(),
                link: "https://x/a".to_string(),
                description: "d".to_string(),
                cve: "CVE-2024-0001".to_string(),
                cvss: "9.8".to_string(),
            },
            FilteredRecord {
                date: "2024/03/10".to_string(),
                site: "B".to_string(),
                title: "t".to_string(),
                link: "https://x/b".to_string(),
                description: String::new(),
                cve: String::new(),
                cvss: String::new(),
            },
        ];
        write(&path, &records).await.unwrap();
        let text = fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "\"Date\",\"SiteName\",\"Title\",\"link\",\"Description\",\"CVE\",\"CVSS\"");
        assert!(lines[1].contains("\"With \"\"quotes\"\"\""));
        assert!(lines[2].starts_with("\"2024/03/10\",\"B\""));
    }
}
