//! Headless Chrome session shared by the browser-driven strategies.

use super::DiscoveryError;
use crate::http::BROWSER_USER_AGENT;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

impl From<CdpError> for DiscoveryError {
    fn from(e: CdpError) -> Self {
        DiscoveryError::Browser(e.to_string())
    }
}

/// One browser process plus the task driving its CDP connection.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch Chrome with a desktop identity.
    pub async fn launch(headful: bool, request_timeout: Duration) -> Result<Self, DiscoveryError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1366, 900)
            .request_timeout(request_timeout)
            .arg(format!("--user-agent={}", BROWSER_USER_AGENT))
            .arg("--lang=nl-BE")
            // Keep third-party frames (consent banners) in the page process so
            // their execution contexts are reachable from this session.
            .arg("--disable-features=IsolateOrigins,site-per-process");
        if headful {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DiscoveryError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler event error");
                }
            }
        });
        info!(headful, "Browser launched");

        Ok(Self { browser, handler })
    }

    /// Open a blank tab.
    pub async fn new_page(&self) -> Result<Page, DiscoveryError> {
        Ok(self.browser.new_page("about:blank").await?)
    }

    /// Shut the browser down, logging rather than failing.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Failed to reap browser process");
        }
        self.handler.abort();
        let _ = self.handler.await;
        debug!("Browser closed");
    }
}
