//! Proxy relay URL rewriting.
//!
//! The relay is a fetch-through endpoint: instead of requesting the target
//! directly, the crawler requests the relay with the target URL, an API key,
//! and a country code as query parameters.

use crate::ScrapeError;

/// Default relay endpoint.
pub const DEFAULT_RELAY_ENDPOINT: &str = "https://proxy.scrapeops.io/v1/";

/// Rewrites target URLs so they are fetched through the relay.
#[derive(Clone)]
pub struct ProxyRelay {
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for ProxyRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRelay")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ProxyRelay {
    /// Creates a relay client for `endpoint` authenticated with `api_key`.
    #[must_use]
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            api_key: api_key.to_owned(),
        }
    }

    /// Builds the relay URL that fetches `target` from `country`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Relay`] if the endpoint is not a valid URL.
    pub fn rewrite(&self, target: &str, country: &str) -> Result<String, ScrapeError> {
        reqwest::Url::parse_with_params(
            &self.endpoint,
            &[
                ("api_key", self.api_key.as_str()),
                ("url", target),
                ("country", country),
            ],
        )
        .map(String::from)
        .map_err(|e| ScrapeError::Relay(format!("invalid relay endpoint '{}': {e}", self.endpoint)))
    }
}
