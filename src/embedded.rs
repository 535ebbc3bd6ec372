//! Extraction of the JSON state blob embedded in TV guide pages.
//!
//! Both the listing page and every broadcast detail page ship their state as an
//! inline script of the form:
//!
//! ```text
//! <script>window.__EPG_REDUX_DATA__={"channels":[...],"details":{...}};</script>
//! ```
//!
//! The payload is located through that fixed marker and parsed as exactly one
//! JSON value. The terminating `;` and whatever markup follows are ignored, so a
//! `;` inside a string value does not cut the payload short.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"window\.__EPG_REDUX_DATA__\s*=\s*").expect("valid marker regex"));

/// Errors that can occur while pulling the embedded state out of a page.
#[derive(Debug, Error)]
pub enum EmbeddedJsonError {
    /// The page does not contain the state marker at all
    #[error("embedded state marker not found")]
    MarkerMissing,

    /// The marker is present but what follows is not valid JSON
    #[error("embedded state is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Extract and parse the embedded state blob from an HTML document.
///
/// Only the first marker occurrence is considered.
pub fn extract_state(html: &str) -> Result<Value, EmbeddedJsonError> {
    let found = MARKER.find(html).ok_or(EmbeddedJsonError::MarkerMissing)?;
    let payload = &html[found.end()..];

    // Parse exactly one JSON value; the trailing `;` and markup are left unread.
    let mut values = serde_json::Deserializer::from_str(payload).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(EmbeddedJsonError::Malformed(e)),
        None => Err(EmbeddedJsonError::Malformed(serde::de::Error::custom(
            "empty embedded state",
        ))),
    }
}
