//! Discovery of the day's broadcast candidates.
//!
//! Discovery is the first of the pipeline's two phases: it produces the set of
//! `(identifier, detail URL)` pairs worth enriching. The TV guide is volatile
//! and defended against scraping, so several interchangeable strategies exist.
//! Exactly one is selected per run through configuration.
//!
//! # Strategies
//!
//! | Strategy | Module | Method |
//! |----------|--------|--------|
//! | `direct-api` | [`direct_api`] | GET the dated listing API |
//! | `embedded-html` | [`embedded_html`] | GET the listing page, parse the embedded state |
//! | `rendered-dom` | `rendered_dom` | Headless browser, harvest detail links from the DOM |
//! | `network-capture` | `network_capture` | Headless browser, intercept listing API responses |
//!
//! The browser-driven strategies require the `browser` feature.
//!
//! # Contract
//!
//! Strategies report failures as [`DiscoveryError`]. [`discover_candidates`]
//! turns any failure into an empty candidate list (failure to discover is an
//! expected outcome, not a crash) and deduplicates the result, first-seen wins.

pub mod direct_api;
pub mod embedded_html;
pub mod listing;

#[cfg(feature = "browser")]
mod browser;
#[cfg(feature = "browser")]
pub mod network_capture;
#[cfg(feature = "browser")]
pub mod rendered_dom;

use crate::embedded::EmbeddedJsonError;
use crate::models::Candidate;
use chrono::NaiveDate;
use clap::ValueEnum;
use itertools::Itertools;
use listing::ChannelFilter;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

/// Errors that can occur while discovering candidates.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The listing request failed
    #[error("request failed: {0}")]
    Request(#[from] wreq::Error),

    /// The listing endpoint answered with a non-200 status
    #[error("listing returned HTTP {0}")]
    Status(u16),

    /// The listing page carries no usable embedded state
    #[error("embedded state unavailable: {0}")]
    Embedded(#[from] EmbeddedJsonError),

    /// The listing body is not valid JSON
    #[error("listing is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The listing has no channel list where one was expected
    #[error("listing contains no channels")]
    MissingChannels,

    /// Browser automation failed
    #[cfg(feature = "browser")]
    #[error("browser automation failed: {0}")]
    Browser(String),

    /// The strategy is not compiled into this build
    #[cfg(not(feature = "browser"))]
    #[error("strategy `{0}` requires the `browser` feature")]
    Unsupported(&'static str),
}

/// A way of producing the day's candidates.
pub trait Discovery {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Discover the candidates for `date`.
    async fn discover(&self, date: NaiveDate) -> Result<Vec<Candidate>, DiscoveryError>;
}

/// Selectable discovery strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    /// Query the dated listing API
    DirectApi,
    /// Parse the state embedded in the listing page
    EmbeddedHtml,
    /// Harvest detail links from the browser-rendered page
    RenderedDom,
    /// Intercept the listing API responses in a browser
    NetworkCapture,
}

/// Settings shared by all strategies.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// TV guide root, e.g. `https://www.humo.be/tv-gids`.
    pub base_url: String,
    /// Listing API URL template containing a `{date}` placeholder.
    pub api_url: String,
    /// Substring identifying listing API calls in browser traffic.
    #[cfg(feature = "browser")]
    pub api_path_marker: String,
    pub filter: ChannelFilter,
    /// Timeout for a single discovery request or page load.
    pub timeout: Duration,
    /// Scroll gestures performed by the DOM harvest.
    #[cfg(feature = "browser")]
    pub scrolls: usize,
    /// Show the browser window instead of running headless.
    #[cfg(feature = "browser")]
    pub headful: bool,
}

impl SourceConfig {
    /// Human-facing listing page for `date`.
    pub fn listing_page_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            date.format("%Y-%m-%d")
        )
    }

    /// Listing API URL for `date`.
    pub fn listing_api_url(&self, date: NaiveDate) -> String {
        self.api_url
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
    }
}

/// The configured strategy, dispatched statically.
pub enum Strategy {
    DirectApi(direct_api::DirectApiDiscovery),
    EmbeddedHtml(embedded_html::EmbeddedHtmlDiscovery),
    #[cfg(feature = "browser")]
    RenderedDom(rendered_dom::RenderedDomDiscovery),
    #[cfg(feature = "browser")]
    NetworkCapture(network_capture::NetworkCaptureDiscovery),
}

impl Strategy {
    /// Build the strategy selected by `kind`.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built, or when a browser strategy
    /// is requested from a build without the `browser` feature.
    pub fn build(kind: StrategyKind, config: SourceConfig) -> Result<Self, DiscoveryError> {
        let strategy = match kind {
            StrategyKind::DirectApi => {
                Strategy::DirectApi(direct_api::DirectApiDiscovery::new(config)?)
            }
            StrategyKind::EmbeddedHtml => {
                Strategy::EmbeddedHtml(embedded_html::EmbeddedHtmlDiscovery::new(config)?)
            }
            #[cfg(feature = "browser")]
            StrategyKind::RenderedDom => {
                Strategy::RenderedDom(rendered_dom::RenderedDomDiscovery::new(config))
            }
            #[cfg(feature = "browser")]
            StrategyKind::NetworkCapture => {
                Strategy::NetworkCapture(network_capture::NetworkCaptureDiscovery::new(config))
            }
            #[cfg(not(feature = "browser"))]
            StrategyKind::RenderedDom => return Err(DiscoveryError::Unsupported("rendered-dom")),
            #[cfg(not(feature = "browser"))]
            StrategyKind::NetworkCapture => {
                return Err(DiscoveryError::Unsupported("network-capture"));
            }
        };
        Ok(strategy)
    }
}

impl Discovery for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::DirectApi(s) => s.name(),
            Strategy::EmbeddedHtml(s) => s.name(),
            #[cfg(feature = "browser")]
            Strategy::RenderedDom(s) => s.name(),
            #[cfg(feature = "browser")]
            Strategy::NetworkCapture(s) => s.name(),
        }
    }

    async fn discover(&self, date: NaiveDate) -> Result<Vec<Candidate>, DiscoveryError> {
        match self {
            Strategy::DirectApi(s) => s.discover(date).await,
            Strategy::EmbeddedHtml(s) => s.discover(date).await,
            #[cfg(feature = "browser")]
            Strategy::RenderedDom(s) => s.discover(date).await,
            #[cfg(feature = "browser")]
            Strategy::NetworkCapture(s) => s.discover(date).await,
        }
    }
}

/// Deduplicate candidates by identifier, keeping the first occurrence.
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .unique_by(|c| c.id.clone())
        .collect()
}

/// Run a discovery strategy under the common contract.
///
/// Never fails: any [`DiscoveryError`] is logged and yields an empty list.
#[instrument(level = "info", skip_all, fields(strategy = discovery.name(), %date))]
pub async fn discover_candidates<D: Discovery>(discovery: &D, date: NaiveDate) -> Vec<Candidate> {
    match discovery.discover(date).await {
        Ok(found) => {
            let raw = found.len();
            let candidates = dedup_candidates(found);
            info!(
                count = candidates.len(),
                duplicates = raw - candidates.len(),
                "Discovered candidates"
            );
            debug!(ids = ?candidates.iter().map(|c| &c.id).collect::<Vec<_>>(), "Candidate ids");
            candidates
        }
        Err(e) => {
            error!(error = %e, "Discovery failed");
            Vec::new()
        }
    }
}
