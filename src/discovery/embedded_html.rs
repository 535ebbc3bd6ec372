//! Discovery through the state embedded in the human-facing listing page.
//!
//! The listing page for a day assigns its full state to
//! `window.__EPG_REDUX_DATA__` in an inline script. Fetching the page as a
//! browser would and extracting that blob gives the same data as the API,
//! and is blocked less often.

use super::listing::candidates_from_listing;
use super::{Discovery, DiscoveryError, SourceConfig};
use crate::embedded::extract_state;
use crate::http::browser_client;
use crate::models::Candidate;
use chrono::NaiveDate;
use wreq::Client;
use tracing::{info, instrument};

/// Listing page discovery.
pub struct EmbeddedHtmlDiscovery {
    client: Client,
    config: SourceConfig,
}

impl EmbeddedHtmlDiscovery {
    pub fn new(config: SourceConfig) -> Result<Self, DiscoveryError> {
        Ok(Self {
            client: browser_client(config.timeout, Some(&config.base_url))?,
            config,
        })
    }
}

impl Discovery for EmbeddedHtmlDiscovery {
    fn name(&self) -> &'static str {
        "embedded-html"
    }

    #[instrument(level = "info", skip_all)]
    async fn discover(&self, date: NaiveDate) -> Result<Vec<Candidate>, DiscoveryError> {
        let url = self.config.listing_page_url(date);
        info!(%url, "Fetching listing page");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status().as_u16()));
        }

        let html = response.text().await?;
        let state = extract_state(&html)?;
        candidates_from_listing(&state, &self.config.filter, &self.config.base_url)
    }
}
