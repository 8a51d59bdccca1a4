//! # vulnwatch
//!
//! A security-advisory aggregation pipeline that scrapes vulnerability
//! disclosures from many independently-shaped sites, normalizes them to a
//! common record schema, and republishes the keyword-filtered stream.
//!
//! ## Features
//!
//! - Fetches advisories over RSS/Atom, static HTML listings, and (via a
//!   pluggable renderer) JS-rendered pages
//! - Normalizes free-form dates to `YYYY/MM/DD`
//! - Maintains per-site monthly history partitions and a 14-day rolling
//!   aggregate, deduplicated against prior runs
//! - Filters by per-site keyword policy and enriches records with CVE ids
//!   and CVSS scores (inline regex, optional linked-page scrape)
//! - Publishes CSV, a spreadsheet-style table, an HTML page, and an RSS feed
//!
//! ## Usage
//!
//! ```sh
//! vulnwatch -c sites.yaml -d ./data -o ./out
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Fetching**: one task per configured site, bounded concurrency
//! 2. **History merge**: monthly partitions, then the rolling aggregate
//! 3. **Filter & enrichment**: keyword policy, CVE/CVSS extraction
//! 4. **Publication**: filtered CSV, vulnerability table, HTML, RSS

use chrono::Local;
use clap::Parser;
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod cvss;
mod dates;
mod enrich;
mod fetchers;
mod models;
mod outputs;
mod report;
mod store;
mod utils;

use cli::Cli;
use config::Config;
use models::{CanonicalRecord, RawRecord};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("vulnwatch starting up");

    let args = Cli::parse();
    info!(config = %args.config, data_dir = %args.data_dir, output_dir = %args.output_dir,
          enrichment = ?args.enrichment, "Parsed CLI arguments");

    // Unreadable or malformed configuration is the one fatal error.
    let config = Arc::new(Config::load(&args.config)?);

    if let Err(e) = ensure_writable_dir(&args.data_dir).await {
        error!(path = %args.data_dir, error = %e, "Data directory is not writable");
        return Err(e);
    }
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(path = %args.output_dir, error = %e, "Output directory is not writable");
        return Err(e);
    }

    let data_dir = Path::new(&args.data_dir);
    let out_dir = Path::new(&args.output_dir);
    let rolling_path = data_dir.join("latest.csv");
    store::ensure_file_with_header(&rolling_path, store::AGGREGATE_HEADER).await?;

    let client = fetchers::build_client(args.timeout);
    let today = Local::now().date_naive();

    // ---- Fetch all sites in parallel ----
    info!(sites = config.sites.len(), concurrency = args.concurrency, "Starting site fetches");
    let mut results: Vec<(String, Vec<RawRecord>)> = stream::iter(config.sites.iter())
        .map(|(name, site)| {
            let client = client.clone();
            let config = Arc::clone(&config);
            let name = name.clone();
            let site = site.clone();
            async move {
                // No renderer is bundled; browser sites log and skip.
                let records =
                    fetchers::fetch_site(&client, None, &name, &site, &config.timezones).await;
                (name, records)
            }
        })
        .buffer_unordered(args.concurrency.max(1))
        .collect()
        .await;

    // Completion order is arbitrary; keep downstream processing deterministic.
    results.sort_by(|a, b| a.0.cmp(&b.0));
    let total_fetched: usize = results.iter().map(|(_, r)| r.len()).sum();
    info!(total = total_fetched, "Site fetches complete");

    // ---- Merge into history partitions ----
    let mut all_records: Vec<CanonicalRecord> = Vec::new();
    for (site_name, raws) in results {
        let records: Vec<CanonicalRecord> = raws
            .into_iter()
            .map(|r| CanonicalRecord::from_raw(&site_name, r))
            .collect();
        if let Err(e) = store::merge_partitions(data_dir, &site_name, &records, today).await {
            error!(site = %site_name, error = %e, "Partition merge failed; site history unchanged");
        }
        all_records.extend(records);
    }

    // ---- Rolling aggregate, then filter & enrichment ----
    if let Err(e) = store::rebuild_rolling(&rolling_path, &all_records, today).await {
        error!(error = %e, "Rolling aggregate rebuild failed; filtering prior state");
    }
    let rolling = store::read_rolling(&rolling_path).await;
    let filtered = enrich::filter_records(&rolling, &config, args.enrichment, &client).await;

    // ---- Publication sinks (independent; one failing never stops the rest) ----
    if let Err(e) = report::write_report(&out_dir.join("latest_entries.csv"), &all_records).await {
        error!(error = %e, "Latest-entries report failed");
    }
    if let Err(e) = outputs::filtered::write(&out_dir.join("filtered.csv"), &filtered).await {
        error!(error = %e, "Filtered CSV sink failed");
    }
    if let Err(e) =
        outputs::table::update(&out_dir.join("vulnerability_table.csv"), &filtered, &config, today)
            .await
    {
        error!(error = %e, "Vulnerability table sink failed");
    }
    if let Err(e) = outputs::html::write(&out_dir.join("index.html"), &filtered).await {
        error!(error = %e, "HTML sink failed");
    }
    if let Err(e) = outputs::rss::write(&out_dir.join("rss.xml"), &filtered, &args.feed_link).await
    {
        error!(error = %e, "RSS sink failed");
    }

    info!(
        fetched = total_fetched,
        rolling = rolling.len(),
        published = filtered.len(),
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "vulnwatch run complete"
    );
    Ok(())
}
