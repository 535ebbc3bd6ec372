//! Detail page fetching and parsing.
//!
//! Each candidate's detail page embeds the same state blob as the listing
//! page, with a `details` map keyed by broadcast identifier. This module
//! fetches that page, pulls the [`DetailRecord`] out of it and hands it to the
//! classifier.
//!
//! Every failure is reported as a [`DetailFailure`] so the orchestrator can
//! count them per kind. None of them is retried: plenty of listed broadcasts
//! simply have no detail page.

use crate::classify::classify;
use crate::embedded::{EmbeddedJsonError, extract_state};
use crate::http::browser_client;
use crate::models::{Candidate, DetailRecord, EnrichmentEntry};
use wreq::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Why a single candidate produced no enrichment entry.
#[derive(Debug, Error)]
pub enum DetailFailure {
    /// Connection, TLS or body read failure
    #[error("request failed: {0}")]
    Request(String),

    /// The request did not complete within the per-request timeout
    #[error("request timed out")]
    Timeout,

    /// The broadcast has no detail page
    #[error("detail page not found")]
    NotFound,

    /// Any other non-200 response
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The page carries no embedded state
    #[error("embedded state marker not found")]
    MarkerMissing,

    /// The embedded state or the detail entry could not be decoded
    #[error("malformed detail JSON: {0}")]
    MalformedJson(String),

    /// The embedded state has no entry for this broadcast
    #[error("no detail entry for broadcast")]
    DetailMissing,

    /// The detail entry has neither a season nor an episode number
    #[error("detail entry has no season or episode")]
    NoOrdering,
}

impl DetailFailure {
    /// Stable label used when tallying failures.
    pub fn kind(&self) -> &'static str {
        match self {
            DetailFailure::Request(_) => "request",
            DetailFailure::Timeout => "timeout",
            DetailFailure::NotFound => "not_found",
            DetailFailure::Status(_) => "status",
            DetailFailure::MarkerMissing => "marker_missing",
            DetailFailure::MalformedJson(_) => "malformed_json",
            DetailFailure::DetailMissing => "detail_missing",
            DetailFailure::NoOrdering => "no_ordering",
        }
    }
}

impl From<wreq::Error> for DetailFailure {
    fn from(e: wreq::Error) -> Self {
        if e.is_timeout() {
            DetailFailure::Timeout
        } else {
            DetailFailure::Request(e.to_string())
        }
    }
}

impl From<EmbeddedJsonError> for DetailFailure {
    fn from(e: EmbeddedJsonError) -> Self {
        match e {
            EmbeddedJsonError::MarkerMissing => DetailFailure::MarkerMissing,
            EmbeddedJsonError::Malformed(e) => DetailFailure::MalformedJson(e.to_string()),
        }
    }
}

/// Anything that can turn a candidate into an enrichment entry.
///
/// The orchestrator is generic over this so the fan-out can be exercised
/// without network access.
pub trait DetailSource {
    async fn enrich(&self, candidate: &Candidate) -> Result<EnrichmentEntry, DetailFailure>;
}

/// Fetches detail pages over HTTP with a browser identity.
#[derive(Clone)]
pub struct DetailFetcher {
    client: Client,
}

impl DetailFetcher {
    /// Create a fetcher whose requests each time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, wreq::Error> {
        Ok(Self {
            client: browser_client(timeout, None)?,
        })
    }

    /// Download the detail page body for a candidate.
    async fn fetch_page(&self, candidate: &Candidate) -> Result<String, DetailFailure> {
        let response = self.client.get(&candidate.detail_url).send().await?;
        match response.status() {
            StatusCode::OK => Ok(response.text().await?),
            StatusCode::NOT_FOUND => Err(DetailFailure::NotFound),
            other => Err(DetailFailure::Status(other.as_u16())),
        }
    }
}

impl DetailSource for DetailFetcher {
    #[instrument(level = "debug", skip_all, fields(id = %candidate.id))]
    async fn enrich(&self, candidate: &Candidate) -> Result<EnrichmentEntry, DetailFailure> {
        let body = self.fetch_page(candidate).await?;
        debug!(bytes = body.len(), "Fetched detail page");
        enrich_page(&body, &candidate.id)
    }
}

/// Parse and classify a detail page body.
pub fn enrich_page(body: &str, id: &str) -> Result<EnrichmentEntry, DetailFailure> {
    let record = parse_detail(body, id)?;
    classify(&record).ok_or(DetailFailure::NoOrdering)
}

/// Extract the [`DetailRecord`] for `id` from a detail page body.
///
/// Pages are sometimes keyed under a different identifier than the one used
/// to request them; when `details` holds a single entry that entry is used.
pub fn parse_detail(body: &str, id: &str) -> Result<DetailRecord, DetailFailure> {
    let state = extract_state(body)?;
    let details = state
        .get("details")
        .and_then(Value::as_object)
        .ok_or(DetailFailure::DetailMissing)?;

    let entry = match details.get(id) {
        Some(entry) => entry,
        None if details.len() == 1 => details.values().next().ok_or(DetailFailure::DetailMissing)?,
        None => return Err(DetailFailure::DetailMissing),
    };
    if entry.is_null() {
        return Err(DetailFailure::DetailMissing);
    }

    DetailRecord::deserialize(entry).map_err(|e| DetailFailure::MalformedJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Reply, serve, serve_stalled};
    use std::time::Instant;

    fn page(state: &str) -> String {
        format!(
            "<!doctype html><html><head><script>window.__EPG_REDUX_DATA__={};</script></head><body></body></html>",
            state
        )
    }

    #[test]
    fn test_parse_detail_by_id() {
        let body = page(
            r#"{"details":{"abc-123":{"seasonOrder":3,"order":1,"subtitle":"","synopsis":""},"zzz-999":{"seasonOrder":9}}}"#,
        );
        let record = parse_detail(&body, "abc-123").unwrap();
        assert_eq!(record.season_order, Some(3));
        assert_eq!(record.episode_order, Some(1));
    }

    #[test]
    fn test_parse_detail_single_entry_fallback() {
        let body = page(r#"{"details":{"other-id":{"seasonOrder":2,"order":5}}}"#);
        let record = parse_detail(&body, "requested-id").unwrap();
        assert_eq!(record.season_order, Some(2));
        assert_eq!(record.episode_order, Some(5));
    }

    #[test]
    fn test_parse_detail_no_fallback_with_many_entries() {
        let body = page(r#"{"details":{"a-1":{"order":1},"b-2":{"order":2}}}"#);
        assert!(matches!(
            parse_detail(&body, "c-3"),
            Err(DetailFailure::DetailMissing)
        ));
    }

    #[test]
    fn test_parse_detail_without_details_map() {
        let body = page(r#"{"channels":[]}"#);
        assert!(matches!(
            parse_detail(&body, "a-1"),
            Err(DetailFailure::DetailMissing)
        ));
    }

    #[test]
    fn test_parse_detail_missing_marker() {
        assert!(matches!(
            parse_detail("<html></html>", "a-1"),
            Err(DetailFailure::MarkerMissing)
        ));
    }

    #[test]
    fn test_parse_detail_wrong_field_type() {
        let body = page(r#"{"details":{"a-1":{"seasonOrder":"drie"}}}"#);
        assert!(matches!(
            parse_detail(&body, "a-1"),
            Err(DetailFailure::MalformedJson(_))
        ));
    }

    #[test]
    fn test_enrich_page_drops_unordered_broadcast() {
        let body = page(r#"{"details":{"a-1":{"seasonOrder":null,"order":null}}}"#);
        assert!(matches!(
            enrich_page(&body, "a-1"),
            Err(DetailFailure::NoOrdering)
        ));
    }

    #[test]
    fn test_enrich_page_season_start() {
        let body = page(
            r#"{"details":{"a-1":{"seasonOrder":2,"order":5,"subtitle":"Start seizoen 2","synopsis":""}}}"#,
        );
        let entry = enrich_page(&body, "a-1").unwrap();
        assert_eq!(
            entry,
            EnrichmentEntry {
                season: Some(2),
                episode: Some(5),
                is_new: true
            }
        );
    }

    #[test]
    fn test_failure_kinds_are_distinct() {
        let kinds = [
            DetailFailure::Request("x".into()).kind(),
            DetailFailure::Timeout.kind(),
            DetailFailure::NotFound.kind(),
            DetailFailure::Status(500).kind(),
            DetailFailure::MarkerMissing.kind(),
            DetailFailure::MalformedJson("x".into()).kind(),
            DetailFailure::DetailMissing.kind(),
            DetailFailure::NoOrdering.kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[tokio::test]
    async fn test_fetcher_enriches_from_server() {
        let body = page(r#"{"details":{"a-1":{"seasonOrder":4,"order":1}}}"#);
        let base = serve(vec![Reply::ok(body)]).await;

        let fetcher = DetailFetcher::new(Duration::from_secs(5)).unwrap();
        let candidate = Candidate::new("a-1", format!("{}/een/uitzending/aflevering/a-1", base));
        let entry = fetcher.enrich(&candidate).await.unwrap();
        assert_eq!(entry.season, Some(4));
        assert!(entry.is_new);
    }

    #[tokio::test]
    async fn test_fetcher_reports_not_found() {
        let base = serve(vec![Reply::status(404, "Not Found")]).await;

        let fetcher = DetailFetcher::new(Duration::from_secs(5)).unwrap();
        let candidate = Candidate::new("a-1", format!("{}/een/uitzending/aflevering/a-1", base));
        assert!(matches!(
            fetcher.enrich(&candidate).await,
            Err(DetailFailure::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_fetcher_reports_other_status() {
        let base = serve(vec![Reply::status(503, "Service Unavailable")]).await;

        let fetcher = DetailFetcher::new(Duration::from_secs(5)).unwrap();
        let candidate = Candidate::new("a-1", format!("{}/x", base));
        assert!(matches!(
            fetcher.enrich(&candidate).await,
            Err(DetailFailure::Status(503))
        ));
    }

    #[tokio::test]
    async fn test_fetcher_times_out_on_stalled_server() {
        let base = serve_stalled().await;

        let fetcher = DetailFetcher::new(Duration::from_millis(500)).unwrap();
        let candidate = Candidate::new("a-1", format!("{}/een/uitzending/aflevering/a-1", base));
        let started = Instant::now();
        let result = fetcher.enrich(&candidate).await;

        assert!(matches!(result, Err(DetailFailure::Timeout)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fetcher_reports_unreachable_host() {
        let fetcher = DetailFetcher::new(Duration::from_secs(2)).unwrap();
        let candidate = Candidate::new("a-1", "http://127.0.0.1:1/unreachable");
        let err = fetcher.enrich(&candidate).await.unwrap_err();
        assert!(matches!(err, DetailFailure::Request(_) | DetailFailure::Timeout));
    }
}
