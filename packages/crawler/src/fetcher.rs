//! Bounded-retry page fetching.
//!
//! Each attempt opens a fresh browsing context, navigates (through the proxy
//! relay when one is configured), queries the unit's fragment selector, and
//! runs the extractor over the fragments. Any failure abandons the attempt;
//! the context is closed on every path before the next attempt starts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use listing_crawl_extract::ExtractError;
use listing_crawl_models::FetchUnit;
use listing_crawl_scraper::relay::ProxyRelay;
use listing_crawl_scraper::{Browser, Element, Page};

use crate::CrawlError;

/// Longest delay between two attempts when backoff is enabled.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Terminal result of a unit after all of its attempts.
#[derive(Debug)]
pub enum Outcome<T> {
    /// An attempt succeeded.
    Success {
        /// The unit that was fetched.
        unit: FetchUnit,
        /// Attempts made, including the successful one.
        attempts: u32,
        /// Extracted value.
        value: T,
    },
    /// Every allowed attempt failed.
    Failed {
        /// The unit that was fetched.
        unit: FetchUnit,
        /// Attempts made.
        attempts: u32,
        /// Error from the last attempt.
        error: CrawlError,
    },
}

impl<T> Outcome<T> {
    /// The unit this outcome settles.
    #[must_use]
    pub const fn unit(&self) -> &FetchUnit {
        match self {
            Self::Success { unit, .. } | Self::Failed { unit, .. } => unit,
        }
    }

    /// Number of fetch attempts made for the unit.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    /// Whether the unit succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Runs `f` on a successful value, turning its error into a failure.
    ///
    /// The unit is not retried when `f` fails.
    pub async fn and_then<U, F, Fut>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(&FetchUnit, T) -> Fut,
        Fut: Future<Output = Result<U, CrawlError>>,
    {
        match self {
            Self::Success {
                unit,
                attempts,
                value,
            } => {
                let result = f(&unit, value).await;
                match result {
                    Ok(value) => Outcome::Success {
                        unit,
                        attempts,
                        value,
                    },
                    Err(error) => Outcome::Failed {
                        unit,
                        attempts,
                        error,
                    },
                }
            }
            Self::Failed {
                unit,
                attempts,
                error,
            } => Outcome::Failed {
                unit,
                attempts,
                error,
            },
        }
    }

    /// Replaces the outcome with a failure, keeping the unit and attempts.
    #[must_use]
    pub fn into_failure(self, error: CrawlError) -> Self {
        match self {
            Self::Success { unit, attempts, .. } | Self::Failed { unit, attempts, .. } => {
                Self::Failed {
                    unit,
                    attempts,
                    error,
                }
            }
        }
    }
}

/// Fetches units with bounded retries and per-attempt context isolation.
///
/// Holds no mutable state, so one fetcher can serve many concurrent units.
#[derive(Clone)]
pub struct RetryingFetcher {
    browser: Arc<dyn Browser>,
    relay: Option<(ProxyRelay, String)>,
    backoff: Option<Duration>,
}

impl std::fmt::Debug for RetryingFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingFetcher")
            .field("relay", &self.relay)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl RetryingFetcher {
    /// Creates a fetcher that navigates directly with `browser`.
    #[must_use]
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self {
            browser,
            relay: None,
            backoff: None,
        }
    }

    /// Routes every navigation through `relay` from `country`.
    #[must_use]
    pub fn with_relay(mut self, relay: ProxyRelay, country: &str) -> Self {
        self.relay = Some((relay, country.to_owned()));
        self
    }

    /// Waits `base * 2^(n-1)` (capped at [`MAX_BACKOFF`]) before retry `n`.
    #[must_use]
    pub const fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff = Some(base);
        self
    }

    /// Fetches `unit`, extracting the fragments matching `selector` with
    /// `extract`.
    ///
    /// Makes at most `unit.retries() + 1` attempts and exactly one if the
    /// first succeeds.
    pub async fn fetch<T, F>(&self, unit: FetchUnit, selector: &str, extract: F) -> Outcome<T>
    where
        F: Fn(&[Element]) -> Result<T, ExtractError> + Send + Sync,
        T: Send,
    {
        let max_attempts = unit.retries().saturating_add(1);
        let mut attempts = 0_u32;

        loop {
            if attempts > 0
                && let Some(delay) = self.backoff_delay(attempts)
            {
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            let mut page = match self.browser.new_page().await {
                Ok(page) => page,
                Err(e) => {
                    log::error!(
                        "Could not open a browsing context for {}: {e}",
                        unit.context()
                    );
                    return Outcome::Failed {
                        unit,
                        attempts,
                        error: CrawlError::Navigation(e),
                    };
                }
            };
            let result = self
                .attempt(page.as_mut(), unit.url(), selector, &extract)
                .await;
            page.close().await;

            match result {
                Ok(value) => {
                    log::info!("Successfully fetched: {}", unit.url());
                    return Outcome::Success {
                        unit,
                        attempts,
                        value,
                    };
                }
                Err(error) if attempts >= max_attempts => {
                    log::warn!(
                        "Giving up on {} after {attempts} attempt(s): {error}",
                        unit.context()
                    );
                    return Outcome::Failed {
                        unit,
                        attempts,
                        error,
                    };
                }
                Err(error) => {
                    log::warn!(
                        "Error fetching {}: {error}, tries left {}",
                        unit.context(),
                        max_attempts - attempts
                    );
                }
            }
        }
    }

    /// URL the browser should load for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Navigation`] if the relay URL cannot be built.
    pub fn navigation_url(&self, target: &str) -> Result<String, CrawlError> {
        match &self.relay {
            Some((relay, country)) => Ok(relay.rewrite(target, country)?),
            None => Ok(target.to_owned()),
        }
    }

    async fn attempt<T, F>(
        &self,
        page: &mut dyn Page,
        target: &str,
        selector: &str,
        extract: &F,
    ) -> Result<T, CrawlError>
    where
        F: Fn(&[Element]) -> Result<T, ExtractError> + Send + Sync,
    {
        let url = self.navigation_url(target)?;
        page.goto(&url).await?;
        let fragments = page.query(selector).await?;
        log::debug!("{} fragment(s) matched on {target}", fragments.len());
        Ok(extract(&fragments)?)
    }

    fn backoff_delay(&self, failed_attempts: u32) -> Option<Duration> {
        let base = self.backoff?;
        let factor = 1_u32 << (failed_attempts - 1).min(16);
        Some(base.saturating_mul(factor).min(MAX_BACKOFF))
    }
}
