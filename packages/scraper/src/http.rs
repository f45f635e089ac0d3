//! HTTP-backed rendering engine.
//!
//! Navigation is a plain `GET`; queries run CSS selectors over the returned
//! HTML. No JavaScript is executed, so pages must be server-rendered (or
//! rendered by the proxy relay before they reach us).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::element::select_document;
use crate::{Browser, Element, Page, ScrapeError};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client settings shared by every page a [`HttpBrowser`] opens.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header value, if overriding reqwest's default.
    pub user_agent: Option<String>,
    /// Additional HTTP headers to include in requests.
    pub headers: BTreeMap<String, String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            headers: BTreeMap::new(),
        }
    }
}

impl BrowserOptions {
    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_owned());
        self
    }

    /// Adds an HTTP header to include in requests.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_owned(), value.to_owned());
        self
    }
}

/// A [`Browser`] that fetches pages over HTTP with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpBrowser {
    client: reqwest::Client,
}

impl HttpBrowser {
    /// Builds a browser with the given client settings.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if a header is invalid or the client cannot
    /// be constructed.
    pub fn new(options: &BrowserOptions) -> Result<Self, ScrapeError> {
        let mut header_map = reqwest::header::HeaderMap::new();
        for (key, value) in &options.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                ScrapeError::Navigation(format!("invalid header name '{key}': {e}"))
            })?;
            let val = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                ScrapeError::Navigation(format!("invalid header value '{value}': {e}"))
            })?;
            header_map.insert(name, val);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(options.timeout);
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_page(&self) -> Result<Box<dyn Page>, ScrapeError> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            document: None,
        }))
    }
}

/// One browsing context: holds the most recently fetched document.
#[derive(Debug)]
pub struct HttpPage {
    client: reqwest::Client,
    document: Option<String>,
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError> {
        self.document = None;
        log::debug!("GET {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        log::debug!("Loaded {} bytes from {url}", body.len());
        self.document = Some(body);
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<Element>, ScrapeError> {
        let document = self.document.as_deref().ok_or(ScrapeError::NotLoaded)?;
        select_document(document, selector)
    }

    async fn close(&mut self) {
        self.document = None;
    }
}
