//! Discovery by harvesting detail links from the browser-rendered listing.
//!
//! When neither the API nor the embedded state is reachable, the rendered page
//! still links to every broadcast's detail page. This strategy loads the
//! listing in headless Chrome, dismisses the consent banner, scrolls to make
//! the lazy-loaded channel rows render, and then collects the anchors.
//!
//! # Link pattern
//!
//! Detail links look like `/tv-gids/<channel-slug>/uitzending/aflevering/<id>`.
//! A link is kept when it contains an allow-listed channel keyword and the
//! `/uitzending/` segment; the identifier is its last non-empty path segment.

use super::browser::BrowserSession;
use super::listing::ChannelFilter;
use super::{Discovery, DiscoveryError, SourceConfig};
use crate::models::Candidate;
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::page::Page;
use chrono::NaiveDate;
use rand::{Rng, rng};
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Path segment that marks a broadcast detail link.
const DETAIL_SEGMENT: &str = "/uitzending/";

/// Button labels that accept the consent banner.
pub const CONSENT_PHRASES: [&str; 6] = [
    "akkoord",
    "alles accepteren",
    "accepteren",
    "ik ga akkoord",
    "accept all",
    "agree",
];

const SCROLL_PAUSE: Duration = Duration::from_millis(900);
const CONSENT_SETTLE: Duration = Duration::from_millis(1500);

/// Minimum identifier sanity check.
///
/// Broadcast identifiers are UUID-like; anything of five characters or fewer
/// is a path fragment such as a date or a page name, not an identifier.
pub fn is_plausible_broadcast_id(segment: &str) -> bool {
    segment.chars().count() > 5
}

/// Headless-browser DOM harvest.
#[derive(Debug)]
pub struct RenderedDomDiscovery {
    config: SourceConfig,
}

impl RenderedDomDiscovery {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    async fn harvest(&self, page: &Page, url: &str) -> Result<Vec<Candidate>, DiscoveryError> {
        timeout(self.config.timeout, page.goto(url))
            .await
            .map_err(|_| DiscoveryError::Browser(format!("timed out loading {}", url)))??;

        match dismiss_consent(page).await {
            Ok(Some(location)) => {
                info!(%location, "Dismissed consent banner");
                sleep(CONSENT_SETTLE).await;
            }
            Ok(None) => debug!("No consent banner found"),
            Err(e) => warn!(error = %e, "Consent banner handling failed"),
        }

        for i in 0..self.config.scrolls {
            page.evaluate("window.scrollBy(0, Math.max(window.innerHeight, 800) * 2)")
                .await?;
            let jitter = Duration::from_millis(rng().random_range(0..=400));
            sleep(SCROLL_PAUSE + jitter).await;
            debug!(scroll = i + 1, "Scrolled listing");
        }

        let html = page.content().await?;
        let hrefs = collect_hrefs(&html, url);
        info!(links = hrefs.len(), "Collected anchors from rendered page");

        Ok(candidates_from_hrefs(&hrefs, &self.config.filter))
    }
}

impl Discovery for RenderedDomDiscovery {
    fn name(&self) -> &'static str {
        "rendered-dom"
    }

    #[instrument(level = "info", skip_all)]
    async fn discover(&self, date: NaiveDate) -> Result<Vec<Candidate>, DiscoveryError> {
        let url = self.config.listing_page_url(date);
        info!(%url, "Rendering listing page");

        let session = BrowserSession::launch(self.config.headful, self.config.timeout).await?;
        let result = match session.new_page().await {
            Ok(page) => self.harvest(&page, &url).await,
            Err(e) => Err(e),
        };
        session.close().await;
        result
    }
}

/// Click the first button whose label is a consent phrase.
///
/// Searches the main document first, then every other frame of the page. Each
/// frame is searched in its own execution context, so banners served from a
/// third-party origin are reached too.
///
/// # Returns
///
/// `Some("document")` or `Some("frame:<id>")` for where the button was
/// clicked, `None` when no frame has one.
async fn dismiss_consent(page: &Page) -> Result<Option<String>, DiscoveryError> {
    if click_consent_in(page, None).await? {
        return Ok(Some("document".to_string()));
    }

    let main = page.mainframe().await?;
    for frame in page.frames().await? {
        if main.as_ref() == Some(&frame) {
            continue;
        }
        let Some(context) = page.frame_execution_context(frame.clone()).await? else {
            debug!(frame = ?frame, "Frame has no execution context yet");
            continue;
        };
        match click_consent_in(page, Some(context)).await {
            Ok(true) => return Ok(Some(format!("frame:{}", frame.inner()))),
            Ok(false) => {}
            Err(e) => debug!(frame = ?frame, error = %e, "Consent search failed in frame"),
        }
    }
    Ok(None)
}

/// Run the consent search in one execution context (`None` = main document).
async fn click_consent_in(
    page: &Page,
    context: Option<ExecutionContextId>,
) -> Result<bool, DiscoveryError> {
    let params = consent_params(context)?;
    Ok(page.evaluate_expression(params).await?.into_value()?)
}

/// Evaluation request for the consent search, bound to `context` when given.
fn consent_params(context: Option<ExecutionContextId>) -> Result<EvaluateParams, DiscoveryError> {
    let mut builder = EvaluateParams::builder()
        .expression(consent_script())
        .return_by_value(true)
        .await_promise(false);
    if let Some(context) = context {
        builder = builder.context_id(context);
    }
    builder.build().map_err(DiscoveryError::Browser)
}

/// Script that clicks a consent button in its own document and reports
/// whether it found one.
fn consent_script() -> String {
    let phrases = serde_json::to_string(&CONSENT_PHRASES).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
    const phrases = {phrases};
    for (const b of document.querySelectorAll('button, [role="button"]')) {{
        const label = (b.innerText || b.textContent || '').trim().toLowerCase();
        if (phrases.includes(label)) {{ b.click(); return true; }}
    }}
    return false;
}})()"#
    )
}

/// Absolute `href` values of every anchor in a document.
pub fn collect_hrefs(html: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|u| u.to_string())
        .collect()
}

/// Candidates from harvested links.
///
/// Keeps detail links on allow-listed channels whose last path segment passes
/// [`is_plausible_broadcast_id`].
pub fn candidates_from_hrefs(hrefs: &[String], filter: &ChannelFilter) -> Vec<Candidate> {
    hrefs
        .iter()
        .filter(|href| href.contains(DETAIL_SEGMENT) && filter.matches(href))
        .filter_map(|href| {
            let url = Url::parse(href).ok()?;
            let id = url
                .path_segments()?
                .filter(|s| !s.is_empty())
                .next_back()?
                .to_string();
            is_plausible_broadcast_id(&id).then(|| Candidate::new(id, href.clone()))
        })
        .collect()
}
