//! Premiere classification for detail records.
//!
//! A broadcast is flagged as new when it is the first episode of a season, or
//! when its descriptive text announces a new season. Text evidence can only
//! raise the flag, never clear it.

use crate::models::{DetailRecord, EnrichmentEntry};

/// Phrases in subtitle/title/synopsis that mark a season start.
const SEASON_START_PHRASES: [&str; 2] = ["nieuw seizoen", "start seizoen"];

/// Derive the enrichment entry for a detail record.
///
/// Returns `None` when the record carries neither a season nor an episode
/// number; such broadcasts are left out of the index entirely.
///
/// # Examples
///
/// ```ignore
/// let record = DetailRecord { season_order: Some(3), episode_order: Some(1), ..Default::default() };
/// assert!(classify(&record).unwrap().is_new);
/// ```
pub fn classify(record: &DetailRecord) -> Option<EnrichmentEntry> {
    if record.season_order.is_none() && record.episode_order.is_none() {
        return None;
    }

    let mut is_new = record.episode_order == Some(1);
    if !is_new && announces_new_season(record) {
        is_new = true;
    }

    Some(EnrichmentEntry {
        season: record.season_order,
        episode: record.episode_order,
        is_new,
    })
}

/// Whether any of the record's texts mention a season start.
fn announces_new_season(record: &DetailRecord) -> bool {
    let blob = [
        record.subtitle.as_deref(),
        record.alternative_title.as_deref(),
        record.synopsis.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|t| !t.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase();

    SEASON_START_PHRASES.iter().any(|phrase| blob.contains(phrase))
}
