//! Two-phase crawl orchestration.
//!
//! Phase 1 fetches every listing page of a keyword and appends the
//! business summaries to `<output_dir>/<keyword-slug>.csv`. Phase 2 visits
//! each business found and appends its reviews to
//! `<output_dir>/reviews/<keyword-slug>/<business-slug>.csv`. Rows are
//! appended from inside the fetch tasks as each unit settles, so work
//! finished before a failure is never lost and never rolled back. File
//! writes run on the blocking thread pool.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use listing_crawl_extract::listing::extract_summaries;
use listing_crawl_extract::review::extract_reviews;
use listing_crawl_extract::selectors::{LISTING_CARD, REVIEW_CARD};
use listing_crawl_models::{BusinessSummary, CrawlJob, FetchUnit, slugify};
use listing_crawl_scraper::Browser;
use listing_crawl_scraper::relay::ProxyRelay;
use listing_crawl_sink::CsvSink;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::CrawlError;
use crate::config::CrawlConfig;
use crate::fetcher::{Outcome, RetryingFetcher};
use crate::progress::{ProgressCallback, null_progress};
use crate::scheduler::BatchScheduler;

/// Subdirectory of the output directory holding one review directory per
/// keyword.
pub const REVIEWS_DIR: &str = "reviews";

/// Output id used for businesses whose name slugs to nothing.
const UNNAMED_BUSINESS: &str = "unnamed";

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    /// Not started.
    Pending,
    /// Fetching listing pages.
    ListingInFlight,
    /// Fetching business detail pages.
    DetailInFlight,
    /// Both phases have run.
    Complete,
}

/// What a finished job did.
///
/// Failures are reported here and in the logs only; a job with failed units
/// still completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Keyword crawled.
    pub keyword: String,
    /// File receiving the business summaries.
    pub summary_output: PathBuf,
    /// Directory receiving this job's per-business review files.
    pub review_dir: PathBuf,
    /// Business summaries appended.
    pub summaries_written: usize,
    /// Reviews appended.
    pub reviews_written: usize,
    /// Listing units that ended in failure.
    pub listing_failures: usize,
    /// Detail units that ended in failure.
    pub detail_failures: usize,
    /// Final lifecycle state.
    pub state: JobState,
}

/// Runs crawl jobs against one shared browser.
pub struct Crawler {
    browser: Arc<dyn Browser>,
    relay: Option<ProxyRelay>,
    retry_backoff: Option<std::time::Duration>,
    base_url: String,
    summaries: Arc<CsvSink>,
    review_root: PathBuf,
    progress: Arc<dyn ProgressCallback>,
}

impl Crawler {
    /// Creates a crawler from `config`, fetching pages with `browser`.
    ///
    /// Pages go through the proxy relay only when `config` carries an API
    /// key.
    #[must_use]
    pub fn new(config: &CrawlConfig, browser: Arc<dyn Browser>) -> Self {
        Self {
            browser,
            relay: config.relay(),
            retry_backoff: config.retry_backoff(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            summaries: Arc::new(CsvSink::new(&config.output_dir)),
            review_root: config.output_dir.join(REVIEWS_DIR),
            progress: null_progress(),
        }
    }

    /// Reports progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs both phases of `job`.
    pub async fn run_job(&self, job: &CrawlJob) -> JobReport {
        let mut report = self.new_report(job);
        log::info!("Crawl starting for '{}'", job.keyword);

        report.state = JobState::ListingInFlight;
        log::info!("'{}': {}", job.keyword, report.state);
        let summaries = self.crawl_listings(job, &mut report).await;

        self.crawl_details(job, &summaries, &mut report).await;
        self.finish(&mut report);
        report
    }

    /// Runs only phase 2 of `job`, reading businesses back from the
    /// summary file a previous phase 1 wrote.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Write`] if the summary file cannot be read.
    pub async fn run_reviews(&self, job: &CrawlJob) -> Result<JobReport, CrawlError> {
        let mut report = self.new_report(job);
        let summaries: Vec<BusinessSummary> = self.summaries.read_all(&job.slug())?;
        log::info!(
            "Loaded {} business(es) from {}",
            summaries.len(),
            report.summary_output.display()
        );

        self.crawl_details(job, &summaries, &mut report).await;
        self.finish(&mut report);
        Ok(report)
    }

    /// URL of listing page `page` (0-based) for `keyword`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Navigation`] if the base URL is invalid.
    pub fn listing_url(&self, keyword: &str, page: u32) -> Result<String, CrawlError> {
        let page = (page + 1).to_string();
        reqwest::Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[("page", page.as_str()), ("query", keyword)],
        )
        .map(String::from)
        .map_err(|e| {
            CrawlError::Navigation(listing_crawl_scraper::ScrapeError::Navigation(format!(
                "invalid base URL '{}': {e}",
                self.base_url
            )))
        })
    }

    /// Absolute URL for a detail link, resolving relative links against the
    /// base URL.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Navigation`] if the link cannot be resolved.
    pub fn detail_url(&self, href: &str) -> Result<String, CrawlError> {
        reqwest::Url::parse(&self.base_url)
            .and_then(|base| base.join(href))
            .map(String::from)
            .map_err(|e| {
                CrawlError::Navigation(listing_crawl_scraper::ScrapeError::Navigation(format!(
                    "cannot resolve detail link '{href}': {e}"
                )))
            })
    }

    fn new_report(&self, job: &CrawlJob) -> JobReport {
        JobReport {
            keyword: job.keyword.clone(),
            summary_output: self.summaries.path_for(&job.slug()),
            review_dir: self.review_root.join(job.slug()),
            summaries_written: 0,
            reviews_written: 0,
            listing_failures: 0,
            detail_failures: 0,
            state: JobState::Pending,
        }
    }

    fn fetcher_for(&self, job: &CrawlJob) -> RetryingFetcher {
        let mut fetcher = RetryingFetcher::new(Arc::clone(&self.browser));
        if let Some(relay) = &self.relay
            && let Some(country) = job.location.as_deref()
        {
            fetcher = fetcher.with_relay(relay.clone(), country);
        }
        if let Some(base) = self.retry_backoff {
            fetcher = fetcher.with_backoff(base);
        }
        fetcher
    }

    async fn crawl_listings(&self, job: &CrawlJob, report: &mut JobReport) -> Vec<BusinessSummary> {
        let mut units = Vec::new();
        for page in 0..job.pages {
            match self.listing_url(&job.keyword, page) {
                Ok(url) => units.push(FetchUnit::listing(url, &job.keyword, page, job.retries)),
                Err(e) => {
                    log::error!("Skipping '{}' page {page}: {e}", job.keyword);
                    report.listing_failures += 1;
                }
            }
        }

        self.progress
            .start_phase(format!("'{}' listing pages", job.keyword), units.len() as u64);

        let fetcher = Arc::new(self.fetcher_for(job));
        let sink = Arc::clone(&self.summaries);
        let progress = Arc::clone(&self.progress);
        let output = job.slug();

        let outcomes = BatchScheduler::new(job.concurrency_limit)
            .run(units, |unit| {
                let fetcher = Arc::clone(&fetcher);
                let sink = Arc::clone(&sink);
                let progress = Arc::clone(&progress);
                let output = output.clone();
                async move {
                    let outcome = fetcher
                        .fetch(unit, LISTING_CARD, extract_summaries)
                        .await
                        .and_then(|_, summaries| append_rows(sink, output, summaries))
                        .await;
                    progress.inc(1);
                    outcome
                }
            })
            .await;

        let mut summaries = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Success { value, .. } => {
                    report.summaries_written += value.len();
                    summaries.extend(value);
                }
                Outcome::Failed { unit, error, .. } => {
                    log::warn!("No listings from {}: {error}", unit.context());
                    report.listing_failures += 1;
                }
            }
        }

        log::info!(
            "'{}': {} business(es) written to {}",
            job.keyword,
            report.summaries_written,
            report.summary_output.display()
        );
        summaries
    }

    async fn crawl_details(
        &self,
        job: &CrawlJob,
        summaries: &[BusinessSummary],
        report: &mut JobReport,
    ) {
        report.state = JobState::DetailInFlight;
        log::info!("'{}': {}", job.keyword, report.state);

        let mut outputs = BTreeMap::new();
        let mut taken = BTreeSet::new();
        let mut units = Vec::new();
        for summary in summaries {
            let url = match self.detail_url(&summary.detail_url) {
                Ok(url) => url,
                Err(e) => {
                    log::warn!("Skipping business '{}': {e}", summary.name);
                    report.detail_failures += 1;
                    continue;
                }
            };
            if outputs.contains_key(&url) {
                log::debug!("Business '{}' already queued", summary.name);
                continue;
            }
            outputs.insert(url.clone(), review_output_id(&summary.name, &mut taken));
            units.push(FetchUnit::detail(url, &job.keyword, &summary.name, job.retries));
        }

        self.progress
            .start_phase(format!("'{}' business pages", job.keyword), units.len() as u64);

        let fetcher = Arc::new(self.fetcher_for(job));
        let sink = Arc::new(CsvSink::new(&report.review_dir));
        let outputs = Arc::new(outputs);
        let progress = Arc::clone(&self.progress);

        let outcomes = BatchScheduler::new(job.concurrency_limit)
            .run(units, |unit| {
                let fetcher = Arc::clone(&fetcher);
                let sink = Arc::clone(&sink);
                let outputs = Arc::clone(&outputs);
                let progress = Arc::clone(&progress);
                async move {
                    let outcome = fetcher
                        .fetch(unit, REVIEW_CARD, extract_reviews)
                        .await
                        .and_then(|unit, reviews| {
                            let output = outputs
                                .get(unit.url())
                                .map_or_else(|| UNNAMED_BUSINESS.to_owned(), Clone::clone);
                            append_rows(sink, output, reviews)
                        })
                        .await;
                    progress.inc(1);
                    outcome
                }
            })
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Success { value, .. } => report.reviews_written += value.len(),
                Outcome::Failed { unit, error, .. } => {
                    log::warn!("No reviews from {}: {error}", unit.context());
                    report.detail_failures += 1;
                }
            }
        }
    }

    fn finish(&self, report: &mut JobReport) {
        report.state = JobState::Complete;
        let message = format!(
            "'{}' complete: {} business(es), {} review(s), {} listing and {} detail failure(s)",
            report.keyword,
            report.summaries_written,
            report.reviews_written,
            report.listing_failures,
            report.detail_failures,
        );
        log::info!("{message}");
        self.progress.finish(message);
    }
}

/// Appends `records` to `output_id` on the blocking thread pool and hands
/// them back. Empty batches are not written.
async fn append_rows<R>(
    sink: Arc<CsvSink>,
    output_id: String,
    records: Vec<R>,
) -> Result<Vec<R>, CrawlError>
where
    R: Serialize + Send + 'static,
{
    if records.is_empty() {
        return Ok(records);
    }
    let target = output_id.clone();
    tokio::task::spawn_blocking(move || -> Result<Vec<R>, CrawlError> {
        sink.append(&output_id, &records)?;
        Ok(records)
    })
    .await
    .map_err(|e| CrawlError::Scheduling(format!("append to '{target}' did not finish: {e}")))?
}

/// Review file id for a business: the slug of its name, with `-2`, `-3`,
/// ... appended when another business of the same job already took it.
fn review_output_id(name: &str, taken: &mut BTreeSet<String>) -> String {
    let base = match slugify(name) {
        slug if slug.is_empty() => UNNAMED_BUSINESS.to_owned(),
        slug => slug,
    };
    let mut id = base.clone();
    let mut n = 1_u32;
    while !taken.insert(id.clone()) {
        n += 1;
        id = format!("{base}-{n}");
    }
    id
}
