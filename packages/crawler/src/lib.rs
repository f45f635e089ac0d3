#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Two-phase listing and review crawler.
//!
//! A [`orchestrator::Crawler`] runs one [`listing_crawl_models::CrawlJob`]
//! per keyword: it paginates the search listing, appends business
//! summaries, then visits every business detail page and appends its
//! reviews. Pages are fetched through the [`fetcher::RetryingFetcher`]
//! (fresh browsing context per attempt, bounded retries) and dispatched in
//! fixed-size concurrent windows by the [`scheduler::BatchScheduler`].
//!
//! Per-unit failures never abort a job; they are logged and counted in the
//! [`orchestrator::JobReport`].

pub mod config;
pub mod fetcher;
pub mod orchestrator;
pub mod progress;
pub mod scheduler;

#[cfg(test)]
mod testing;

use listing_crawl_extract::ExtractError;
use listing_crawl_scraper::ScrapeError;
use listing_crawl_sink::WriteError;

/// Errors that can end a fetch unit or a crawl phase.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// Network, DNS, timeout, or status failure while loading a page.
    #[error("Navigation error: {0}")]
    Navigation(#[from] ScrapeError),

    /// The loaded page did not have the structure needed for any record.
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// The output sink failed.
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// A scheduling window could not be driven to completion.
    #[error("Scheduling error: {0}")]
    Scheduling(String),
}
