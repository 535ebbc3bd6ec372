//! HTTP client construction with a realistic browser identity.
//!
//! The TV guide sits behind anti-bot defences that fingerprint the TLS
//! handshake and HTTP/2 settings as well as the headers. Clients emulate
//! Chrome 110 at the connection level and carry the header set a Belgian
//! desktop Chrome would send. Each client gets its own per-request timeout.

use std::time::Duration;
use wreq::Client;
use wreq::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use wreq_util::Emulation;

/// Browser whose TLS and HTTP/2 fingerprint the clients reproduce.
pub const EMULATED_BROWSER: Emulation = Emulation::Chrome110;

/// Desktop Chrome 110 user agent.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Safari/537.36";

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_NL_BE: &str = "nl-BE,nl;q=0.9,en-US;q=0.8,en;q=0.7";

/// Build a client that presents itself as desktop Chrome.
///
/// The connection fingerprint comes from [`EMULATED_BROWSER`]; the headers
/// below are layered on top so the user agent matches it and the language
/// matches the Belgian audience.
///
/// # Arguments
///
/// * `timeout` - Per-request timeout, covering connect and body download
/// * `referer` - Optional `Referer` header sent with every request; an invalid
///   header value is ignored
///
/// # Returns
///
/// A client to share across all requests of one stage.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn browser_client(timeout: Duration, referer: Option<&str>) -> Result<Client, wreq::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_NL_BE));
    if let Some(referer) = referer.and_then(|r| HeaderValue::from_str(r).ok()) {
        headers.insert(REFERER, referer);
    }

    Client::builder()
        .emulation(EMULATED_BROWSER)
        .default_headers(headers)
        .timeout(timeout)
        .build()
}
