//! Command-line interface definitions for vulnwatch.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment variables.

use crate::enrich::EnrichmentPolicy;
use clap::Parser;

/// Command-line arguments for the vulnwatch pipeline.
///
/// # Examples
///
/// ```sh
/// # Basic usage
/// vulnwatch -c sites.yaml -d ./data -o ./out
///
/// # Never touch linked pages during enrichment
/// vulnwatch -c sites.yaml -d ./data -o ./out --enrichment inline
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the sites.yaml configuration file
    #[arg(short, long, env = "VULNWATCH_CONFIG", default_value = "sites.yaml")]
    pub config: String,

    /// Directory holding monthly history partitions and the rolling aggregate
    #[arg(short, long, env = "VULNWATCH_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Directory receiving the published outputs
    #[arg(short, long, env = "VULNWATCH_OUT_DIR", default_value = "./out")]
    pub output_dir: String,

    /// When the enrichment engine may fetch a record's linked advisory page
    #[arg(long, value_enum, default_value = "follow-when-missing")]
    pub enrichment: EnrichmentPolicy,

    /// Number of sites fetched concurrently
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Channel link advertised in the published RSS feed
    #[arg(long, env = "VULNWATCH_FEED_LINK", default_value = "https://example.com/vulnwatch")]
    pub feed_link: String,
}
