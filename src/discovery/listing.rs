//! Listing payload interpretation shared by the JSON-based strategies.
//!
//! The TV guide listing, whether served by the API, embedded in the HTML page
//! or intercepted from browser traffic, has the same shape:
//!
//! ```text
//! { "channels": [ { "name": "VTM", "broadcasts": [ { "id": "…" }, … ] }, … ] }
//! ```
//!
//! Some page versions nest the list under `tvGuide.channels` instead.
//! Channels are kept when their name contains an allow-listed keyword and every
//! kept broadcast becomes a [`Candidate`] pointing at its detail page.

use super::DiscoveryError;
use crate::models::Candidate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Path segments between the channel slug and the broadcast identifier.
pub const DETAIL_PATH: &str = "uitzending/aflevering";

/// Channel name keywords, matched case-insensitively as substrings.
#[derive(Debug, Clone)]
pub struct ChannelFilter {
    keywords: Vec<String>,
}

impl ChannelFilter {
    /// Create a filter from raw keywords.
    ///
    /// # Arguments
    ///
    /// * `keywords` - Channel name fragments; each is trimmed and lowercased
    ///
    /// # Returns
    ///
    /// A filter holding the normalised keywords. Blank entries are dropped, so
    /// a filter built only from blanks matches nothing.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Whether `text` contains any keyword, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// The normalised keywords, in configuration order.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    broadcasts: Vec<Broadcast>,
}

#[derive(Debug, Deserialize)]
struct Broadcast {
    #[serde(default)]
    id: Option<Value>,
}

impl Broadcast {
    /// Identifier as a string; numeric ids are accepted too.
    fn id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Channel slug as used in detail page URLs: lowercase, spaces to hyphens.
pub fn channel_slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

/// Detail page URL for a broadcast on a channel.
pub fn detail_url(base_url: &str, channel_slug: &str, id: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        base_url.trim_end_matches('/'),
        channel_slug,
        DETAIL_PATH,
        id
    )
}

/// Find the channel list in a listing payload.
///
/// Looks at the root `channels` first, then `tvGuide.channels`. An empty list
/// counts as missing.
fn locate_channels(state: &Value) -> Option<&Vec<Value>> {
    fn non_empty(v: Option<&Value>) -> Option<&Vec<Value>> {
        v.and_then(Value::as_array).filter(|a| !a.is_empty())
    }

    non_empty(state.get("channels"))
        .or_else(|| non_empty(state.get("tvGuide").and_then(|g| g.get("channels"))))
}

/// Turn a listing payload into candidates for the allow-listed channels.
///
/// # Errors
///
/// Returns [`DiscoveryError::MissingChannels`] when the payload has no
/// channel list at all. A channel list in which no channel passes the filter
/// is not an error and yields an empty vector.
pub fn candidates_from_listing(
    state: &Value,
    filter: &ChannelFilter,
    base_url: &str,
) -> Result<Vec<Candidate>, DiscoveryError> {
    let channels = locate_channels(state).ok_or(DiscoveryError::MissingChannels)?;
    debug!(channels = channels.len(), "Located channel list");

    let mut candidates = Vec::new();
    for raw in channels {
        let channel = match Channel::deserialize(raw) {
            Ok(channel) => channel,
            Err(e) => {
                warn!(error = %e, "Skipping channel with unexpected shape");
                continue;
            }
        };
        let Some(name) = channel.name.as_deref() else {
            continue;
        };
        if !filter.matches(name) {
            continue;
        }

        let slug = channel_slug(name);
        let before = candidates.len();
        candidates.extend(
            channel
                .broadcasts
                .iter()
                .filter_map(Broadcast::id)
                .map(|id| {
                    let url = detail_url(base_url, &slug, &id);
                    Candidate::new(id, url)
                }),
        );
        debug!(channel = %name, broadcasts = candidates.len() - before, "Kept channel");
    }

    Ok(candidates)
}
