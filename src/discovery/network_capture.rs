//! Discovery by intercepting the listing API calls a real browser makes.
//!
//! The listing page's own JavaScript fetches the day's broadcasts from the
//! listing API. Requests made by a rendered page pass bot checks that direct
//! calls fail, so this strategy lets headless Chrome load the page and reads
//! the API responses off the wire.
//!
//! Responses are matched on `Network.responseReceived` (URL contains the API
//! path marker, status 200) and read once `Network.loadingFinished` fires for
//! the same request. Every captured body is run through the listing filter and
//! folded into a [`CaptureAccumulator`] owned by the discovery call.

use super::browser::BrowserSession;
use super::listing::candidates_from_listing;
use super::{Discovery, DiscoveryError, SourceConfig};
use crate::models::Candidate;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFinished, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::page::Page;
use chrono::NaiveDate;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, instrument, warn};

/// Silence after which a page is considered settled.
const IDLE_WINDOW: Duration = Duration::from_secs(4);

/// Sub-view that triggers a fresh listing API call.
const CHANNELS_VIEW: &str = "zenders";

/// Candidates captured so far, deduplicated as they arrive.
#[derive(Debug, Default)]
pub struct CaptureAccumulator {
    seen: HashSet<String>,
    candidates: Vec<Candidate>,
}

impl CaptureAccumulator {
    /// Add a batch, skipping identifiers already captured. Returns how many
    /// were new.
    pub fn absorb(&mut self, batch: Vec<Candidate>) -> usize {
        let before = self.candidates.len();
        for candidate in batch {
            if self.seen.insert(candidate.id.clone()) {
                self.candidates.push(candidate);
            }
        }
        self.candidates.len() - before
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }
}

enum NetEvent {
    Response(Arc<EventResponseReceived>),
    Finished(Arc<EventLoadingFinished>),
}

/// Headless-browser listing API interception.
#[derive(Debug)]
pub struct NetworkCaptureDiscovery {
    config: SourceConfig,
}

impl NetworkCaptureDiscovery {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Whether a response is a successful listing API call.
    fn is_listing_response(&self, url: &str, status: i64) -> bool {
        status == 200 && url.contains(&self.config.api_path_marker)
    }

    /// Fold one captured body into the accumulator.
    fn absorb_body(&self, body: &str, acc: &mut CaptureAccumulator) {
        let listing = match serde_json::from_str::<Value>(body) {
            Ok(listing) => listing,
            Err(e) => {
                debug!(error = %e, "Captured response is not JSON");
                return;
            }
        };
        match candidates_from_listing(&listing, &self.config.filter, &self.config.base_url) {
            Ok(batch) => {
                let added = acc.absorb(batch);
                info!(added, "Captured listing response");
            }
            Err(e) => debug!(error = %e, "Captured response is not a listing"),
        }
    }

    /// Navigate and consume network events until the page goes quiet.
    async fn capture<S>(
        &self,
        page: &Page,
        url: &str,
        events: &mut S,
        acc: &mut CaptureAccumulator,
    ) -> Result<(), DiscoveryError>
    where
        S: Stream<Item = NetEvent> + Unpin,
    {
        timeout(self.config.timeout, page.goto(url))
            .await
            .map_err(|_| DiscoveryError::Browser(format!("timed out loading {}", url)))??;

        let deadline = Instant::now() + self.config.timeout;
        let mut pending: HashSet<String> = HashSet::new();
        while Instant::now() < deadline {
            let event = match timeout(IDLE_WINDOW, events.next()).await {
                Ok(Some(event)) => event,
                Ok(None) | Err(_) => break,
            };
            match event {
                NetEvent::Response(ev) => {
                    if self.is_listing_response(&ev.response.url, ev.response.status) {
                        debug!(url = %ev.response.url, "Listing API response observed");
                        pending.insert(ev.request_id.inner().clone());
                    }
                }
                NetEvent::Finished(ev) => {
                    if !pending.remove(ev.request_id.inner()) {
                        continue;
                    }
                    match page
                        .execute(GetResponseBodyParams::new(ev.request_id.clone()))
                        .await
                    {
                        Ok(body) if !body.result.base64_encoded => {
                            self.absorb_body(&body.result.body, acc)
                        }
                        Ok(_) => debug!("Skipping binary listing response"),
                        Err(e) => warn!(error = %e, "Could not read listing response body"),
                    }
                }
            }
        }
        Ok(())
    }

    async fn run(&self, page: &Page, date: NaiveDate) -> Result<Vec<Candidate>, DiscoveryError> {
        let responses = page.event_listener::<EventResponseReceived>().await?;
        let finished = page.event_listener::<EventLoadingFinished>().await?;
        let mut events = Box::pin(stream::select(
            responses.map(NetEvent::Response),
            finished.map(NetEvent::Finished),
        ));

        let mut acc = CaptureAccumulator::default();
        let listing_url = self.config.listing_page_url(date);
        self.capture(page, &listing_url, &mut events, &mut acc).await?;

        if acc.is_empty() {
            let channels_url = format!("{}/{}", listing_url, CHANNELS_VIEW);
            info!(url = %channels_url, "Nothing captured, provoking another listing call");
            self.capture(page, &channels_url, &mut events, &mut acc).await?;
        }

        Ok(acc.into_candidates())
    }
}

impl Discovery for NetworkCaptureDiscovery {
    fn name(&self) -> &'static str {
        "network-capture"
    }

    #[instrument(level = "info", skip_all)]
    async fn discover(&self, date: NaiveDate) -> Result<Vec<Candidate>, DiscoveryError> {
        let session = BrowserSession::launch(self.config.headful, self.config.timeout).await?;
        let result = match session.new_page().await {
            Ok(page) => self.run(&page, date).await,
            Err(e) => Err(e),
        };
        session.close().await;
        result
    }
}
