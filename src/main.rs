//! # TV Enrichment
//!
//! Builds a compact enrichment index for the day's TV guide: for every
//! broadcast on the allow-listed channels it records the season number, the
//! episode number and whether the broadcast is a series or season premiere.
//!
//! ## Usage
//!
//! ```sh
//! tv_enrichment --strategy embedded-html --output ./tv-enrichment.json
//! ```
//!
//! ## Architecture
//!
//! The application follows a two-phase pipeline:
//! 1. **Discovery**: One configured strategy finds the day's broadcast
//!    identifiers and detail page URLs (listing API, embedded page state,
//!    rendered DOM, or intercepted browser traffic)
//! 2. **Enrichment**: Detail pages are fetched concurrently (8 at a time by
//!    default), parsed and classified; failures are counted and skipped
//!
//! The index is then written as compact JSON. The process exits non-zero when
//! discovery finds nothing, and zero for any partial enrichment.

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classify;
mod cli;
mod detail;
mod discovery;
mod embedded;
mod http;
mod models;
mod outputs;
mod pipeline;
mod utils;

#[cfg(test)]
mod test_support;

use cli::Cli;
use detail::DetailFetcher;
use discovery::Strategy;
use outputs::json;
use utils::{ensure_writable_parent, today_in_brussels};

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
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
    info!("tv_enrichment starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // Early check: ensure the output location is writable
    if let Err(e) = ensure_writable_parent(&args.output).await {
        error!(
            path = %args.output.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let date = args.date.unwrap_or_else(today_in_brussels);
    info!(%date, strategy = ?args.strategy, workers = args.workers(), "Listing day selected");

    // ---- Discovery + enrichment ----
    let source = args.source_config();
    debug!(keywords = ?source.filter.keywords(), base_url = %source.base_url, "Channel allow-list");
    let strategy = match Strategy::build(args.strategy, source) {
        Ok(strategy) => strategy,
        Err(e) => {
            error!(error = %e, "Could not set up discovery");
            return Ok(ExitCode::FAILURE);
        }
    };
    let fetcher = DetailFetcher::new(args.detail_timeout())?;

    let report = match pipeline::run(&strategy, &fetcher, date, args.workers()).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Nothing to enrich; upstream listing unavailable");
            return Ok(ExitCode::FAILURE);
        }
    };

    // ---- Output ----
    if let Err(e) = json::write_index(&report.index, &args.output).await {
        error!(path = %args.output.display(), error = %e, "Failed to write enrichment index");
        return Err(e);
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        candidates = report.dispatched,
        enriched = report.index.len(),
        failed = report.failed(),
        path = %args.output.display(),
        "Execution complete"
    );

    Ok(ExitCode::SUCCESS)
}
