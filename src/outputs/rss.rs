//! RSS 2.0 feed sink (`rss.xml`).
//!
//! One `<item>` per filtered record, newest first. Item descriptions carry
//! the CVE list and CVSS score alongside the advisory description so feed
//! readers show scoring without a click-through. Dates must convert to
//! RFC2822 for `pubDate`; records whose date fits none of the accepted
//! shapes are skipped with a warning rather than emitted with a bogus
//! timestamp.

use crate::models::FilteredRecord;
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

const FEED_TITLE: &str = "Vulnerability Watch";
const FEED_DESCRIPTION: &str = "Aggregated security advisories";

/// Date shapes accepted for `pubDate` conversion, tried in order.
const PUBDATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d"];

/// Convert a record date to RFC2822, midnight UTC for date-only shapes.
fn to_rfc2822(date: &str) -> Option<String> {
    for fmt in PUBDATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date, fmt) {
            return Some(Utc.from_utc_datetime(&dt).to_rfc2822());
        }
        if let Ok(d) = NaiveDate::parse_from_str(date, fmt) {
            return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?).to_rfc2822());
        }
    }
    None
}

fn item_description(record: &FilteredRecord) -> String {
    let mut parts = Vec::new();
    if !record.description.is_empty() {
        parts.push(record.description.clone());
    }
    if !record.cve.is_empty() {
        parts.push(format!("CVE: {}", record.cve));
    }
    if !record.cvss.is_empty() {
        parts.push(format!("CVSS: {}", record.cvss));
    }
    parts.join(" | ")
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Render the feed document. Records sort date-descending; items whose
/// date cannot become a pubDate are dropped here.
pub fn render(records: &[FilteredRecord], feed_link: &str) -> Result<String, Box<dyn Error>> {
    let mut sorted: Vec<&FilteredRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", FEED_TITLE)?;
    write_text_element(&mut writer, "link", feed_link)?;
    write_text_element(&mut writer, "description", FEED_DESCRIPTION)?;
    write_text_element(&mut writer, "lastBuildDate", &Utc::now().to_rfc2822())?;

    for record in sorted {
        let pub_date = match to_rfc2822(&record.date) {
            Some(d) => d,
            None => {
                warn!(date = %record.date, link = %record.link, "Date unusable as pubDate; skipping item");
                continue;
            }
        };

        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &format!("[{}] {}", record.site, record.title))?;
        write_text_element(&mut writer, "link", &record.link)?;
        write_text_element(&mut writer, "guid", &record.link)?;
        write_text_element(&mut writer, "description", &item_description(record))?;
        write_text_element(&mut writer, "pubDate", &pub_date)?;
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    Ok(String::from_utf8(writer.into_inner())?)
}

#[instrument(level = "info", skip_all, fields(records = records.len()))]
pub async fn write(
    path: &Path,
    records: &[FilteredRecord],
    feed_link: &str,
) -> Result<(), Box<dyn Error>> {
    let xml = render(records, feed_link)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, xml).await?;
    info!(path = %path.display(), "Wrote RSS feed");
    Ok(())
}
