//! Crawl configuration.
//!
//! [`CrawlConfig`] is read once (from TOML, then overridden by the caller)
//! and passed by reference into the [`crate::orchestrator::Crawler`].
//! Every field has a default, so an empty file is a valid config apart from
//! the keyword list.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use listing_crawl_models::{CrawlJob, slugify};
use listing_crawl_scraper::http::BrowserOptions;
use listing_crawl_scraper::relay::{DEFAULT_RELAY_ENDPOINT, ProxyRelay};
use serde::Deserialize;

/// Environment variable consulted for the relay API key.
pub const API_KEY_ENV: &str = "LISTING_CRAWL_API_KEY";

/// Default search site.
pub const DEFAULT_BASE_URL: &str = "https://www.g2.com";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`CrawlConfig`].
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Everything a crawl run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    /// Keywords to search for; one job per keyword.
    pub keywords: Vec<String>,
    /// Listing pages fetched per keyword.
    pub pages: u32,
    /// Country code passed to the proxy relay.
    pub location: Option<String>,
    /// Units dispatched per scheduling window.
    pub concurrency_limit: usize,
    /// Retries per unit after the first attempt.
    pub retries: u32,
    /// Proxy relay API key. Without one, pages are fetched directly.
    pub api_key: Option<String>,
    /// Directory receiving output files.
    pub output_dir: PathBuf,
    /// Scheme and host of the search site.
    pub base_url: String,
    /// Proxy relay endpoint.
    pub relay_endpoint: String,
    /// Base delay between retries in milliseconds. Unset means retry
    /// immediately.
    pub retry_backoff_ms: Option<u64>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` override.
    pub user_agent: Option<String>,
    /// Extra HTTP headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            pages: 1,
            location: Some("us".to_owned()),
            concurrency_limit: 5,
            retries: 3,
            api_key: None,
            output_dir: PathBuf::from("."),
            base_url: DEFAULT_BASE_URL.to_owned(),
            relay_endpoint: DEFAULT_RELAY_ENDPOINT.to_owned(),
            retry_backoff_ms: None,
            timeout_secs: 60,
            user_agent: None,
            headers: BTreeMap::new(),
        }
    }
}

impl CrawlConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks the values a crawl cannot run without.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if there are no keywords, a keyword
    /// has no letters or digits to name its output after, or the
    /// concurrency limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keywords.is_empty() {
            return Err(ConfigError::Invalid("no keywords configured".to_owned()));
        }
        if let Some(keyword) = self.keywords.iter().find(|k| slugify(k).is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "keyword '{keyword}' needs at least one letter or digit"
            )));
        }
        if self.concurrency_limit == 0 {
            return Err(ConfigError::Invalid(
                "concurrency_limit must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    /// One job per configured keyword.
    #[must_use]
    pub fn jobs(&self) -> Vec<CrawlJob> {
        self.keywords
            .iter()
            .map(|keyword| CrawlJob {
                keyword: keyword.trim().to_owned(),
                location: self.location.clone(),
                pages: self.pages,
                concurrency_limit: self.concurrency_limit,
                retries: self.retries,
            })
            .collect()
    }

    /// Proxy relay client, when an API key is configured.
    #[must_use]
    pub fn relay(&self) -> Option<ProxyRelay> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| ProxyRelay::new(&self.relay_endpoint, key))
    }

    /// The configured location, if it cannot take effect because there is
    /// no relay to route it through.
    #[must_use]
    pub fn unrelayed_location(&self) -> Option<&str> {
        if self.relay().is_some() {
            None
        } else {
            self.location.as_deref()
        }
    }

    /// HTTP client settings for the rendering engine.
    #[must_use]
    pub fn browser_options(&self) -> BrowserOptions {
        let mut options =
            BrowserOptions::default().with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(user_agent) = &self.user_agent {
            options = options.with_user_agent(user_agent);
        }
        self.headers
            .iter()
            .fold(options, |options, (name, value)| options.with_header(name, value))
    }

    /// Retry backoff base, if enabled.
    #[must_use]
    pub fn retry_backoff(&self) -> Option<Duration> {
        self.retry_backoff_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
