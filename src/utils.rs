//! Utility functions for date computation, list parsing and file system checks.
//!
//! This module provides helper functions used by the binary:
//! - The TV guide's notion of "today" (Belgian local date)
//! - Splitting comma-separated option values
//! - Output directory validation before any network work starts

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Europe::Brussels;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Channel keywords used when none are configured.
pub const DEFAULT_KEYWORDS: [&str; 10] = [
    "vtm", "vrt", "canvas", "ketnet", "play", "npo", "bbc", "national", "discovery", "tlc",
];

/// The current date in Brussels.
///
/// The listing is organised per Belgian calendar day, so a run shortly after
/// midnight UTC must already ask for the next day.
pub fn today_in_brussels() -> NaiveDate {
    brussels_date(Utc::now())
}

fn brussels_date(now: DateTime<Utc>) -> NaiveDate {
    let date = now.with_timezone(&Brussels).date_naive();
    debug!(%now, %date, "Computed Brussels date");
    date
}

/// Split a comma-separated list, trimming blanks.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(split_list(" vtm, bbc ,,"), vec!["vtm", "bbc"]);
/// ```
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ensure the directory that will hold `file` exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(file = %file.display()))]
pub async fn ensure_writable_parent(file: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).await?;

    // Try a small sync write using std fs (simpler error surface)
    let probe_path = dir.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!(dir = %dir.display(), "Output directory is writable");
    Ok(())
}
