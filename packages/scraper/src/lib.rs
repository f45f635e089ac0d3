#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Page rendering collaborators for the crawler.
//!
//! Provides the [`Browser`] / [`Page`] traits the crawler navigates and
//! queries through, an HTTP-backed implementation ([`http::HttpBrowser`]),
//! owned DOM snapshots ([`Element`]), and the proxy relay URL rewriter
//! ([`relay::ProxyRelay`]).
//!
//! This crate knows nothing about what is being scraped. It fetches pages
//! and answers CSS selector queries; record extraction lives elsewhere.

pub mod element;
pub mod http;
pub mod relay;

use async_trait::async_trait;

pub use element::Element;

/// Errors that can occur while navigating or querying a page.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// An HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Navigation failed for a reason other than HTTP (engine-specific).
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// A CSS selector could not be parsed.
    #[error("Invalid selector '{selector}': {message}")]
    Selector {
        /// The selector text.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// The proxy relay URL could not be built.
    #[error("Relay error: {0}")]
    Relay(String),

    /// The page was queried before a successful navigation.
    #[error("Page has no loaded document")]
    NotLoaded,
}

/// A logical browser: hands out isolated browsing contexts.
///
/// Shared read-only between concurrent fetches. Each call to
/// [`new_page`](Self::new_page) must return a context that shares no
/// document state with any other.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Opens a fresh browsing context.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the engine cannot create a context.
    async fn new_page(&self) -> Result<Box<dyn Page>, ScrapeError>;
}

/// One isolated browsing context (a tab).
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigates to `url`, replacing any previously loaded document.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] on network, DNS, timeout, or status failures.
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError>;

    /// Returns every element in the loaded document matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if nothing is loaded or the selector is invalid.
    async fn query(&self, selector: &str) -> Result<Vec<Element>, ScrapeError>;

    /// Returns the first element matching `selector`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if nothing is loaded or the selector is invalid.
    async fn query_one(&self, selector: &str) -> Result<Option<Element>, ScrapeError> {
        Ok(self.query(selector).await?.into_iter().next())
    }

    /// Releases the context. Further queries fail with
    /// [`ScrapeError::NotLoaded`].
    async fn close(&mut self);
}

/// Parses a CSS selector string, returning a [`ScrapeError`] on failure.
///
/// # Errors
///
/// Returns [`ScrapeError::Selector`] if the selector is not valid CSS.
pub fn parse_selector(selector: &str) -> Result<scraper::Selector, ScrapeError> {
    scraper::Selector::parse(selector).map_err(|e| ScrapeError::Selector {
        selector: selector.to_owned(),
        message: e.to_string(),
    })
}
