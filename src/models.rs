//! Data models for broadcast candidates, detail records and enrichment output.
//!
//! This module defines the core data structures that flow through the pipeline:
//! - [`Candidate`]: A broadcast identifier plus the detail page URL to enrich it from
//! - [`DetailRecord`]: The per-broadcast detail blob embedded in a detail page
//! - [`EnrichmentEntry`]: The season/episode/premiere triple written to disk
//! - [`EnrichmentIndex`]: The final identifier → entry mapping
//!
//! The source JSON uses camelCase keys, the persisted index uses the short
//! `s`/`ep`/`is_new` keys expected by the presentation layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A broadcast awaiting detail enrichment.
///
/// Produced by a discovery strategy, consumed exactly once by the detail fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Broadcast identifier; the deduplication key.
    pub id: String,
    /// Absolute URL of the broadcast's detail page.
    pub detail_url: String,
}

impl Candidate {
    /// Create a candidate.
    ///
    /// # Arguments
    ///
    /// * `id` - Broadcast identifier
    /// * `detail_url` - Absolute URL of the broadcast's detail page
    pub fn new(id: impl Into<String>, detail_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            detail_url: detail_url.into(),
        }
    }
}

/// Detail information for one broadcast, as embedded in its detail page.
///
/// Every field is optional: the source omits fields freely and sometimes sends
/// explicit `null`s.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRecord {
    /// Season number.
    #[serde(default)]
    pub season_order: Option<i64>,
    /// Episode number within the season (`order` in the source).
    #[serde(default, rename = "order")]
    pub episode_order: Option<i64>,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Alternative title (`alternativeDetailTitle` in the source).
    #[serde(default, rename = "alternativeDetailTitle")]
    pub alternative_title: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
}

/// One enriched broadcast, the unit of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentEntry {
    #[serde(rename = "s")]
    pub season: Option<i64>,
    #[serde(rename = "ep")]
    pub episode: Option<i64>,
    /// Series or season premiere.
    pub is_new: bool,
}

/// Identifier → entry mapping handed to the output sink.
///
/// A `BTreeMap` keeps the persisted file byte-stable between runs over the
/// same listing.
pub type EnrichmentIndex = BTreeMap<String, EnrichmentEntry>;
