//! Windowed concurrent dispatch of fetch units.
//!
//! Units are split into consecutive windows of `concurrency_limit`. Every
//! unit of a window runs as its own task; the next window starts only after
//! the whole current window has settled. This bounds the number of open
//! browsing contexts and keeps a bad window from affecting the others.

use std::future::Future;

use listing_crawl_models::FetchUnit;

use crate::CrawlError;
use crate::fetcher::Outcome;

/// Dispatches units in fixed-size concurrent windows.
#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    concurrency_limit: usize,
}

impl BatchScheduler {
    /// Creates a scheduler running at most `concurrency_limit` units at once.
    /// A limit of zero is treated as one.
    #[must_use]
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    /// Units dispatched together per window.
    #[must_use]
    pub const fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Splits `units` into the windows [`run`](Self::run) would dispatch.
    #[must_use]
    pub fn windows<T>(&self, units: Vec<T>) -> Vec<Vec<T>> {
        let mut windows = Vec::with_capacity(units.len().div_ceil(self.concurrency_limit));
        let mut units = units.into_iter().peekable();
        while units.peek().is_some() {
            windows.push(units.by_ref().take(self.concurrency_limit).collect());
        }
        windows
    }

    /// Runs `task` for every unit and returns exactly one outcome per unit.
    ///
    /// If any task of a window cannot be driven to completion (it panicked
    /// or was cancelled), the window's results are dropped: every unit in it
    /// is reported as [`CrawlError::Scheduling`] and the remaining windows
    /// still run. Side effects already performed by settled tasks stand.
    pub async fn run<T, F, Fut>(&self, units: Vec<FetchUnit>, task: F) -> Vec<Outcome<T>>
    where
        F: Fn(FetchUnit) -> Fut,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
        T: Send + 'static,
    {
        let total = units.len();
        let windows = self.windows(units);
        let window_count = windows.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, window) in windows.into_iter().enumerate() {
            log::debug!(
                "Dispatching window {}/{window_count} ({} unit(s))",
                index + 1,
                window.len()
            );

            let handles: Vec<_> = window
                .iter()
                .cloned()
                .map(|unit| tokio::spawn(task(unit)))
                .collect();
            let joined = futures::future::join_all(handles).await;

            let fault = joined
                .iter()
                .find_map(|result| result.as_ref().err().map(ToString::to_string));

            match fault {
                None => outcomes.extend(joined.into_iter().flatten()),
                Some(message) => {
                    log::warn!(
                        "Failed to process window {}/{window_count}: {message}; dropping its results",
                        index + 1
                    );
                    outcomes.extend(window.into_iter().zip(joined).map(|(unit, result)| {
                        let error = CrawlError::Scheduling(message.clone());
                        match result {
                            Ok(outcome) => outcome.into_failure(error),
                            Err(_) => Outcome::Failed {
                                unit,
                                attempts: 0,
                                error,
                            },
                        }
                    }));
                }
            }
        }

        outcomes
    }
}
