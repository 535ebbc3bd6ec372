//! JSON output of the enrichment index.
//!
//! The index is written as compact JSON (no inserted whitespace), keyed by
//! broadcast identifier:
//!
//! ```text
//! {"3f2a…":{"s":3,"ep":1,"is_new":true},"77b0…":{"s":null,"ep":12,"is_new":false}}
//! ```
//!
//! The file is first written next to its destination and then renamed over
//! it, so readers never observe a half-written index.

use crate::models::EnrichmentIndex;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `index` to `path` as compact JSON.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the file
/// cannot be written or moved into place.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_index(index: &EnrichmentIndex, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string(index)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    fs::write(&staging, &json).await?;
    fs::rename(&staging, path).await?;

    info!(entries = index.len(), bytes = json.len(), "Wrote enrichment index");
    Ok(())
}
