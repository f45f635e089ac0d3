#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record extraction for listing cards and review cards.
//!
//! Pure transformations from fetched [`Element`] fragments into
//! [`listing_crawl_models::BusinessSummary`] and
//! [`listing_crawl_models::Review`] records. No I/O happens here.
//!
//! Missing optional fields fall back to defaults. A fragment missing a
//! required field fails with [`ExtractError`]; page-level helpers skip such
//! fragments with a warning and only fail when no fragment on the page
//! could be extracted at all.

pub mod listing;
pub mod review;
pub mod selectors;
pub mod tags;

use listing_crawl_scraper::{Element, ScrapeError};

/// Errors that can occur while turning a fragment into a record.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// A field every record needs was not present in the fragment.
    #[error("Missing required field '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A rating could not be parsed or fell outside the 0 - 5 scale.
    #[error("Invalid rating '{value}': {reason}")]
    InvalidRating {
        /// The raw text that was parsed.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Querying the fragment failed.
    #[error("Query error: {0}")]
    Query(#[from] ScrapeError),

    /// Every fragment on the page failed extraction.
    #[error("None of {fragments} {kind} fragments could be extracted")]
    NoValidRecords {
        /// What kind of fragment was being extracted.
        kind: &'static str,
        /// How many fragments were found.
        fragments: usize,
    },
}

/// Runs `extract` over every fragment, keeping successes and skipping
/// fragments that yield `None`.
///
/// Failing fragments are logged and dropped. Fails only when there was at
/// least one fragment and every one of them failed, which usually means
/// the page did not render the expected structure.
fn extract_all<T>(
    fragments: &[Element],
    kind: &'static str,
    mut extract: impl FnMut(&Element) -> Result<Option<T>, ExtractError>,
) -> Result<Vec<T>, ExtractError> {
    let mut records = Vec::with_capacity(fragments.len());
    let mut failures = 0_usize;

    for (position, fragment) in fragments.iter().enumerate() {
        match extract(fragment) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => log::debug!("Skipping incomplete {kind} fragment #{position}"),
            Err(e) => {
                failures += 1;
                log::warn!("Skipping malformed {kind} fragment #{position}: {e}");
            }
        }
    }

    if failures > 0 && failures == fragments.len() {
        return Err(ExtractError::NoValidRecords {
            kind,
            fragments: failures,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(n: usize) -> Vec<Element> {
        (0..n)
            .map(|i| Element::from_html(format!("<div>{i}</div>")))
            .collect()
    }

    #[test]
    fn keeps_successes_and_skips_failures() {
        let records = extract_all(&fragments(3), "test", |el| {
            if el.text() == "1" {
                Err(ExtractError::MissingField { field: "x" })
            } else {
                Ok(Some(el.text()))
            }
        })
        .unwrap();
        assert_eq!(records, vec!["0".to_string(), "2".to_string()]);
    }

    #[test]
    fn fails_when_every_fragment_fails() {
        let result: Result<Vec<String>, _> = extract_all(&fragments(2), "test", |_| {
            Err(ExtractError::MissingField { field: "x" })
        });
        assert!(matches!(
            result,
            Err(ExtractError::NoValidRecords { fragments: 2, .. })
        ));
    }

    #[test]
    fn skipped_fragments_are_not_failures() {
        let records: Vec<String> = extract_all(&fragments(2), "test", |_| Ok(None)).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn empty_page_is_not_an_error() {
        let records: Vec<String> = extract_all(&[], "test", |_| Ok(None)).unwrap();
        assert!(records.is_empty());
    }
}
