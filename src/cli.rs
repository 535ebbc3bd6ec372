//! Command-line interface definitions for TV Enrichment.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment variables.

use crate::discovery::listing::ChannelFilter;
use crate::discovery::{SourceConfig, StrategyKind};
use crate::pipeline::DEFAULT_WORKERS;
use crate::utils::{DEFAULT_KEYWORDS, split_list};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the TV Enrichment application.
///
/// # Examples
///
/// ```sh
/// # Today's listing, default strategy, written to ./tv-enrichment.json
/// tv_enrichment
///
/// # A specific day through the listing API with more workers
/// tv_enrichment --strategy direct-api --date 2026-10-17 --workers 16
///
/// # Browser-driven discovery, watching the browser
/// tv_enrichment --strategy rendered-dom --headful
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Discovery strategy used to find the day's broadcasts
    #[arg(short, long, env = "TV_STRATEGY", value_enum, default_value_t = StrategyKind::EmbeddedHtml)]
    pub strategy: StrategyKind,

    /// Path of the JSON index to write
    #[arg(short, long, env = "TV_OUTPUT", default_value = "tv-enrichment.json")]
    pub output: PathBuf,

    /// Listing day (YYYY-MM-DD); defaults to today in Brussels
    #[arg(short, long, env = "TV_DATE")]
    pub date: Option<NaiveDate>,

    /// Concurrent detail page fetches
    #[arg(short, long, env = "TV_WORKERS", default_value_t = DEFAULT_WORKERS as u16, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub workers: u16,

    /// Timeout per detail page request, in seconds
    #[arg(long, env = "TV_DETAIL_TIMEOUT_SECS", default_value_t = 20)]
    pub detail_timeout_secs: u64,

    /// Timeout per discovery request or page load, in seconds
    #[arg(long, env = "TV_DISCOVERY_TIMEOUT_SECS", default_value_t = 30)]
    pub discovery_timeout_secs: u64,

    /// TV guide root URL
    #[arg(long, env = "TV_BASE_URL", default_value = "https://www.humo.be/tv-gids")]
    pub base_url: String,

    /// Listing API URL template; `{date}` is replaced by the listing day
    #[arg(
        long,
        env = "TV_API_URL",
        default_value = "https://www.humo.be/tv-gids/api/v2/broadcasts/{date}"
    )]
    pub api_url: String,

    /// Substring identifying listing API calls in intercepted browser traffic
    #[cfg(feature = "browser")]
    #[arg(long, env = "TV_API_PATH_MARKER", default_value = "tv-gids/api")]
    pub api_path_marker: String,

    /// Comma-separated channel name keywords to keep
    #[arg(short, long, env = "TV_KEYWORDS")]
    pub keywords: Option<String>,

    /// Scroll gestures performed when harvesting the rendered page
    #[cfg(feature = "browser")]
    #[arg(long, env = "TV_SCROLLS", default_value_t = 12)]
    pub scrolls: usize,

    /// Show the browser window for browser-driven strategies
    #[cfg(feature = "browser")]
    #[arg(long)]
    pub headful: bool,
}

impl Cli {
    /// Channel filter from `--keywords`, or the default keyword list.
    ///
    /// # Returns
    ///
    /// A filter over the configured keywords. A missing or blank `--keywords`
    /// value falls back to [`DEFAULT_KEYWORDS`].
    pub fn channel_filter(&self) -> ChannelFilter {
        match self.keywords.as_deref().map(split_list) {
            Some(keywords) if !keywords.is_empty() => ChannelFilter::new(keywords),
            _ => ChannelFilter::new(DEFAULT_KEYWORDS),
        }
    }

    /// Discovery settings derived from the arguments.
    ///
    /// The base URL loses any trailing slash so synthesized detail URLs never
    /// contain `//`.
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_url: self.api_url.clone(),
            #[cfg(feature = "browser")]
            api_path_marker: self.api_path_marker.clone(),
            filter: self.channel_filter(),
            timeout: Duration::from_secs(self.discovery_timeout_secs),
            #[cfg(feature = "browser")]
            scrolls: self.scrolls,
            #[cfg(feature = "browser")]
            headful: self.headful,
        }
    }

    /// Number of concurrent detail fetches.
    ///
    /// # Returns
    ///
    /// The `--workers` value, already range-checked by clap to `1..=64`.
    pub fn workers(&self) -> usize {
        usize::from(self.workers)
    }

    /// Per-request timeout for detail page fetches.
    ///
    /// # Returns
    ///
    /// `--detail-timeout-secs` as a [`Duration`].
    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs)
    }
}
