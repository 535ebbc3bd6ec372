//! Concurrent enrichment of discovered candidates.
//!
//! The second phase of a run: every candidate is handed to a
//! [`DetailSource`] under bounded parallelism, and the successful entries are
//! assembled into the [`EnrichmentIndex`]. Workers never touch the index
//! themselves; each returns its result to the single collecting stream, which
//! is the only writer.
//!
//! Failures are not retried. They are counted per [`DetailFailure::kind`] so a
//! run's health stays visible even though no single failure stops it.

use crate::detail::{DetailFailure, DetailSource};
use crate::discovery::{Discovery, dedup_candidates, discover_candidates};
use crate::models::{Candidate, EnrichmentEntry, EnrichmentIndex};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Default number of concurrent detail fetches.
pub const DEFAULT_WORKERS: usize = 8;

/// Errors that end a run without an index.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Discovery produced nothing to enrich
    #[error("discovery yielded no candidates")]
    NoCandidates,
}

/// Outcome of the enrichment phase.
#[derive(Debug, Default)]
pub struct EnrichmentReport {
    /// Identifier → entry for every successfully enriched candidate.
    pub index: EnrichmentIndex,
    /// Candidates dispatched after deduplication.
    pub dispatched: usize,
    /// Failed candidates, by failure kind.
    pub failures: BTreeMap<&'static str, usize>,
}

impl EnrichmentReport {
    /// Total number of candidates that produced no entry.
    ///
    /// # Returns
    ///
    /// The sum of all per-kind failure counts; together with the index size
    /// it accounts for every dispatched candidate.
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }
}

/// Discover the day's candidates and enrich them.
///
/// # Errors
///
/// Returns [`PipelineError::NoCandidates`] when discovery comes back empty.
/// Individual detail failures never fail the run.
#[instrument(level = "info", skip_all, fields(%date, workers = workers))]
pub async fn run<D, S>(
    discovery: &D,
    source: &S,
    date: NaiveDate,
    workers: usize,
) -> Result<EnrichmentReport, PipelineError>
where
    D: Discovery,
    S: DetailSource,
{
    let candidates = discover_candidates(discovery, date).await;
    if candidates.is_empty() {
        return Err(PipelineError::NoCandidates);
    }
    info!(count = candidates.len(), "Enriching candidates");
    Ok(enrich_all(source, candidates, workers).await)
}

/// Enrich candidates concurrently, at most `workers` at a time.
///
/// Candidates are deduplicated again before dispatch so no identifier is
/// fetched twice.
#[instrument(level = "info", skip_all, fields(workers = workers))]
pub async fn enrich_all<S: DetailSource>(
    source: &S,
    candidates: Vec<Candidate>,
    workers: usize,
) -> EnrichmentReport {
    let candidates = dedup_candidates(candidates);
    let dispatched = candidates.len();

    let results: Vec<(String, Result<EnrichmentEntry, DetailFailure>)> = stream::iter(candidates)
        .map(|candidate| async move {
            let result = source.enrich(&candidate).await;
            (candidate.id, result)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut report = EnrichmentReport {
        dispatched,
        ..Default::default()
    };
    for (id, result) in results {
        match result {
            Ok(entry) => {
                debug!(%id, ?entry, "Enriched broadcast");
                report.index.insert(id, entry);
            }
            Err(failure) => {
                debug!(%id, error = %failure, "Broadcast not enriched");
                *report.failures.entry(failure.kind()).or_insert(0) += 1;
            }
        }
    }

    info!(
        dispatched,
        enriched = report.index.len(),
        failed = report.failed(),
        "Completed detail enrichment"
    );
    if !report.failures.is_empty() {
        warn!(failures = ?report.failures, "Detail failures by kind");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detail::DetailFetcher;
    use crate::discovery::DiscoveryError;
    use crate::test_support::{Reply, serve, serve_stalled};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Pretends every id ending in a multiple of ten is missing, ids ending
    /// in 3 have no ordering, and everything else is episode `n`.
    #[derive(Default)]
    struct StubSource {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl DetailSource for StubSource {
        async fn enrich(&self, candidate: &Candidate) -> Result<EnrichmentEntry, DetailFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let n: i64 = candidate.id.trim_start_matches("id-").parse().unwrap();
            if n % 10 == 0 {
                Err(DetailFailure::NotFound)
            } else if n % 10 == 3 {
                Err(DetailFailure::NoOrdering)
            } else {
                Ok(EnrichmentEntry {
                    season: Some(1),
                    episode: Some(n),
                    is_new: n == 1,
                })
            }
        }
    }

    struct FixedDiscovery(Vec<Candidate>);

    impl Discovery for FixedDiscovery {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn discover(&self, _date: NaiveDate) -> Result<Vec<Candidate>, DiscoveryError> {
            Ok(self.0.clone())
        }
    }

    struct BlockedDiscovery;

    impl Discovery for BlockedDiscovery {
        fn name(&self) -> &'static str {
            "blocked"
        }

        async fn discover(&self, _date: NaiveDate) -> Result<Vec<Candidate>, DiscoveryError> {
            Err(DiscoveryError::Status(403))
        }
    }

    fn candidates(range: std::ops::RangeInclusive<u32>) -> Vec<Candidate> {
        range
            .map(|n| Candidate::new(format!("id-{}", n), format!("https://x/{}", n)))
            .collect()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[tokio::test]
    async fn test_enrich_all_tolerates_partial_failure() {
        let source = StubSource::default();
        let report = enrich_all(&source, candidates(1..=100), 8).await;

        assert_eq!(report.dispatched, 100);
        assert_eq!(report.failures.get("not_found"), Some(&10));
        assert_eq!(report.failures.get("no_ordering"), Some(&10));
        assert_eq!(report.index.len(), 80);
        assert_eq!(report.failed() + report.index.len(), 100);
        assert!(report.index["id-1"].is_new);
        assert!(!report.index.contains_key("id-10"));
    }

    #[tokio::test]
    async fn test_enrich_all_respects_worker_bound() {
        let source = StubSource::default();
        enrich_all(&source, candidates(1..=40), 4).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 40);
        let max = source.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 4, "saw {} concurrent fetches", max);
    }

    #[tokio::test]
    async fn test_enrich_all_dispatches_each_id_once() {
        let source = StubSource::default();
        let mut list = candidates(1..=5);
        list.extend(candidates(1..=5));

        let report = enrich_all(&source, list, 8).await;
        assert_eq!(report.dispatched, 5);
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_index_keys_come_from_candidates() {
        let source = StubSource::default();
        let list = candidates(1..=25);
        let ids: std::collections::HashSet<_> = list.iter().map(|c| c.id.clone()).collect();

        let report = enrich_all(&source, list, 8).await;
        assert!(report.index.keys().all(|k| ids.contains(k)));
    }

    #[tokio::test]
    async fn test_run_fails_without_candidates() {
        let source = StubSource::default();
        let err = run(&BlockedDiscovery, &source, date(), 8).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoCandidates));

        let err = run(&FixedDiscovery(Vec::new()), &source, date(), 8)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoCandidates));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stalled_fetch_does_not_block_others() {
        let page = r#"<script>window.__EPG_REDUX_DATA__={"details":{"x":{"seasonOrder":1,"order":2}}};</script>"#;
        let fast = serve(vec![Reply::ok(page)]).await;
        let stalled = serve_stalled().await;

        let mut list = vec![Candidate::new("slow-1", format!("{}/slow-1", stalled))];
        list.extend((1..=5).map(|n| Candidate::new(format!("id-{}", n), format!("{}/id-{}", fast, n))));

        let fetcher = DetailFetcher::new(Duration::from_millis(500)).unwrap();
        let report = enrich_all(&fetcher, list, 2).await;

        assert_eq!(report.dispatched, 6);
        assert_eq!(report.index.len(), 5);
        assert!(!report.index.contains_key("slow-1"));
        assert_eq!(report.failures.get("timeout"), Some(&1));
        assert_eq!(report.index["id-3"].episode, Some(2));
    }

    #[tokio::test]
    async fn test_run_with_thirty_not_found() {
        struct ThirtyMissing;

        impl DetailSource for ThirtyMissing {
            async fn enrich(&self, candidate: &Candidate) -> Result<EnrichmentEntry, DetailFailure> {
                let n: u32 = candidate.id.trim_start_matches("id-").parse().unwrap();
                if n <= 30 {
                    Err(DetailFailure::NotFound)
                } else {
                    Ok(EnrichmentEntry {
                        season: Some(2),
                        episode: Some(n as i64),
                        is_new: false,
                    })
                }
            }
        }

        let report = run(&FixedDiscovery(candidates(1..=100)), &ThirtyMissing, date(), 12)
            .await
            .unwrap();
        assert!(report.index.len() <= 70);
        assert_eq!(report.index.len(), 70);
        assert_eq!(report.failures.get("not_found"), Some(&30));
    }
}
