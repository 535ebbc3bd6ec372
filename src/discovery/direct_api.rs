//! Discovery through the dated listing API.
//!
//! One GET against the listing endpoint returns the whole day as JSON. This is
//! the cheapest strategy but also the one the source blocks first.

use super::listing::candidates_from_listing;
use super::{Discovery, DiscoveryError, SourceConfig};
use crate::http::browser_client;
use crate::models::Candidate;
use chrono::NaiveDate;
use wreq::Client;
use wreq::header::ACCEPT;
use serde_json::Value;
use tracing::{info, instrument};

/// Listing API discovery.
pub struct DirectApiDiscovery {
    client: Client,
    config: SourceConfig,
}

impl DirectApiDiscovery {
    pub fn new(config: SourceConfig) -> Result<Self, DiscoveryError> {
        Ok(Self {
            client: browser_client(config.timeout, Some(&config.base_url))?,
            config,
        })
    }
}

impl Discovery for DirectApiDiscovery {
    fn name(&self) -> &'static str {
        "direct-api"
    }

    #[instrument(level = "info", skip_all)]
    async fn discover(&self, date: NaiveDate) -> Result<Vec<Candidate>, DiscoveryError> {
        let url = self.config.listing_api_url(date);
        info!(%url, "Requesting listing API");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let listing: Value = serde_json::from_str(&body)?;
        candidates_from_listing(&listing, &self.config.filter, &self.config.base_url)
    }
}
