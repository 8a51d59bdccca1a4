//! Static HTML table sink (`index.html`).
//!
//! A single self-contained page for eyeballing the current filtered
//! stream. Every text value is escaped; advisory titles link to their
//! source page. Rows sort date-descending regardless of input order.

use crate::models::FilteredRecord;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn render(records: &[FilteredRecord]) -> String {
    let mut sorted: Vec<&FilteredRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let mut page = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Vulnerability Watch</title>\n<style>\n\
         body { font-family: sans-serif; margin: 2em; }\n\
         table { border-collapse: collapse; width: 100%; }\n\
         th, td { border: 1px solid #ccc; padding: 0.4em 0.6em; text-align: left; }\n\
         th { background: #f0f0f0; }\n</style>\n</head>\n<body>\n\
         <h1>Vulnerability Watch</h1>\n<table>\n\
         <tr><th>Date</th><th>Site</th><th>Title</th><th>CVE</th><th>CVSS</th></tr>\n",
    );

    for r in sorted {
        page.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>\n",
            escape(&r.date),
            escape(&r.site),
            escape(&r.link),
            escape(&r.title),
            escape(&r.cve),
            escape(&r.cvss),
        ));
    }

    page.push_str("</table>\n</body>\n</html>\n");
    page
}

#[instrument(level = "info", skip_all, fields(records = records.len()))]
pub async fn write(path: &Path, records: &[FilteredRecord]) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, render(records)).await?;
    info!(path = %path.display(), "Wrote HTML table");
    Ok(())
}
