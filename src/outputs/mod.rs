//! Output sinks for the finished enrichment index.
//!
//! # Submodules
//!
//! - [`json`]: Writes the [`EnrichmentIndex`](crate::models::EnrichmentIndex)
//!   as a single compact JSON file for the presentation layer

pub mod json;
