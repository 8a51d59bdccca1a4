//! Utility functions for text cleanup, CSV quoting, and file system checks.
//!
//! This module provides helpers used throughout the pipeline:
//! - Whitespace normalization for scraped text fields
//! - HTML-to-visible-text conversion for feed descriptions and linked pages
//! - CSV field quoting and quoted-line splitting for the persisted stores
//! - File system validation for output directories

use scraper::Html;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Collapse all runs of whitespace (including newlines) into single spaces.
///
/// Scraped titles and descriptions routinely carry embedded newlines and
/// indentation; persisted CSV rows must be single-line.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_text("a\n  b\r\nc"), "a b c");
/// ```
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the visible text of an HTML fragment.
///
/// Parses the fragment and concatenates its text nodes, then collapses
/// whitespace. Entity references are decoded by the parser.
pub fn html_to_text(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    clean_text(&text)
}

/// Quote a field for CSV output.
///
/// Every field is double-quoted (store file convention) and embedded quotes
/// are doubled.
pub fn csv_quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Build one fully-quoted CSV row from fields.
pub fn csv_row(fields: &[&str]) -> String {
    fields.iter().map(|f| csv_quote(f)).collect::<Vec<_>>().join(",")
}

/// Split one CSV line into fields, honoring double-quoted fields with
/// doubled-quote escapes.
///
/// Unterminated quotes are tolerated: the remainder of the line becomes the
/// final field. Store readers treat rows with the wrong arity as corrupt and
/// skip them, so this never needs to fail.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cur.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if cur.is_empty() => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut cur));
            }
            _ => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes with an ellipsis and byte count
/// indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        // Back off to a char boundary so slicing cannot panic.
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…(+{} bytes)", &s[..end], s.len() - end)
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("a\n  b\r\n\tc"), "a b c");
        assert_eq!(clean_text("  leading and trailing  "), "leading and trailing");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_html_to_text() {
        let frag = "<p>Security <b>update</b> &amp; fixes</p>";
        assert_eq!(html_to_text(frag), "Security update & fixes");
    }

    #[test]
    fn test_csv_quote_escapes_embedded_quotes() {
        assert_eq!(csv_quote("plain"), "\"plain\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_row() {
        assert_eq!(csv_row(&["a", "b,c"]), "\"a\",\"b,c\"");
    }

    #[test]
    fn test_split_csv_line_roundtrip() {
        let row = csv_row(&["2024/01/05", "A \"quoted\" title", "https://x/y,z", ""]);
        let fields = split_csv_line(&row);
        assert_eq!(
            fields,
            vec!["2024/01/05", "A \"quoted\" title", "https://x/y,z", ""]
        );
    }

    #[test]
    fn test_split_csv_line_unquoted() {
        assert_eq!(split_csv_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_csv_line("a,,c"), vec!["a", "", "c"]);
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }
}
