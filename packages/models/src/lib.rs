#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crawl job, fetch unit, and scraped record types.
//!
//! A [`CrawlJob`] describes one keyword crawl. The orchestrator expands it
//! into [`FetchUnit`]s (one per listing page, then one per business detail
//! page), and the extractor turns fetched pages into [`BusinessSummary`] and
//! [`Review`] records. Record field order is the on-disk column order.

use serde::{Deserialize, Serialize};

/// Rating written when a listing card carries no rating badge.
pub const ABSENT_RATING: f64 = 0.0;

/// Upper bound of every rating scale used in records.
pub const MAX_RATING: f64 = 5.0;

/// Turns a keyword (or business name) into a filesystem-safe identifier.
///
/// Lower-cases the input, keeps alphanumeric characters, and replaces every
/// run of anything else with a single hyphen. Leading and trailing hyphens
/// are dropped, so `"Online  Bank"` becomes `"online-bank"` and
/// `"../Acme / Bank"` becomes `"acme-bank"`. The result never contains a
/// path separator or a dot and may be empty.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;
    for c in value.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// What a [`FetchUnit`] is fetching, for logging and output routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitContext {
    /// Search results page `page` (0-based) for `keyword`.
    Listing {
        /// Keyword the search was run for.
        keyword: String,
        /// Zero-based page index.
        page: u32,
    },
    /// Detail page of the business `entity` found while crawling `keyword`.
    Detail {
        /// Keyword whose listing produced this business.
        keyword: String,
        /// Business name as shown on the listing card.
        entity: String,
    },
}

impl std::fmt::Display for UnitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listing { keyword, page } => write!(f, "'{keyword}' page {page}"),
            Self::Detail { keyword, entity } => write!(f, "'{keyword}' business '{entity}'"),
        }
    }
}

/// One fetch-and-extract task bound to a single URL.
///
/// Immutable once built. The retrying fetcher consumes it exactly once and
/// makes at most `retries + 1` attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchUnit {
    url: String,
    context: UnitContext,
    retries: u32,
}

impl FetchUnit {
    /// Creates a unit for a search results page.
    #[must_use]
    pub fn listing(url: String, keyword: &str, page: u32, retries: u32) -> Self {
        Self {
            url,
            context: UnitContext::Listing {
                keyword: keyword.to_owned(),
                page,
            },
            retries,
        }
    }

    /// Creates a unit for a business detail page.
    #[must_use]
    pub fn detail(url: String, keyword: &str, entity: &str, retries: u32) -> Self {
        Self {
            url,
            context: UnitContext::Detail {
                keyword: keyword.to_owned(),
                entity: entity.to_owned(),
            },
            retries,
        }
    }

    /// The target URL (before any proxy rewriting).
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// What this unit is fetching.
    #[must_use]
    pub const fn context(&self) -> &UnitContext {
        &self.context
    }

    /// How many times the unit may be retried after its first attempt.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }
}

/// The unit of orchestration: one keyword crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    /// Search keyword.
    pub keyword: String,
    /// Two-letter country code routed to the proxy relay, if any.
    pub location: Option<String>,
    /// Number of listing pages to fetch.
    pub pages: u32,
    /// Units dispatched per scheduling window.
    pub concurrency_limit: usize,
    /// Retries allowed per unit after the first attempt.
    pub retries: u32,
}

impl CrawlJob {
    /// Output identifier for this job's business summaries.
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.keyword)
    }
}

/// A business as it appears on one search results card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessSummary {
    /// Business name.
    pub name: String,
    /// Average rating shown on the card, or [`ABSENT_RATING`].
    #[serde(rename = "stars")]
    pub rating: f64,
    /// Link to the business detail page.
    #[serde(rename = "g2_url")]
    pub detail_url: String,
    /// Short description from the card.
    pub description: String,
}

/// A single user review from a business detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Reviewer name, or `anonymous-N` when the card shows none.
    #[serde(rename = "name")]
    pub author: String,
    /// ISO-8601 review date.
    pub date: String,
    /// Reviewer job title, or `"n/a"`.
    pub job_title: String,
    /// Star rating on a 0.0 - 5.0 half-point scale.
    pub rating: f64,
    /// Review text.
    #[serde(rename = "full_review")]
    pub body: String,
    /// Where the review was collected, empty if unknown.
    pub review_source: String,
    /// Whether the reviewer is marked as validated.
    pub validated: bool,
    /// Whether the review is marked as incentivized.
    pub incentivized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("online bank"), "online-bank");
        assert_eq!(slugify("  Online   Bank  "), "online-bank");
        assert_eq!(slugify("CRM"), "crm");
    }

    #[test]
    fn slugify_strips_path_characters() {
        assert_eq!(slugify("Acme / Bank"), "acme-bank");
        assert_eq!(slugify("Acme\\Bank"), "acme-bank");
        assert_eq!(slugify("../escaped"), "escaped");
        assert_eq!(slugify("Acme Bank, Inc."), "acme-bank-inc");
        assert_eq!(slugify("Café Crème"), "café-crème");
        assert_eq!(slugify("../.."), "");
        assert_eq!(slugify("  "), "");
    }

    #[test]
    fn job_slug_uses_keyword() {
        let job = CrawlJob {
            keyword: "Online Bank".to_string(),
            location: Some("us".to_string()),
            pages: 1,
            concurrency_limit: 5,
            retries: 3,
        };
        assert_eq!(job.slug(), "online-bank");
    }

    #[test]
    fn unit_context_display() {
        let unit = FetchUnit::detail("https://x/acme".to_string(), "bank", "Acme", 2);
        assert_eq!(unit.retries(), 2);
        assert_eq!(unit.context().to_string(), "'bank' business 'Acme'");
    }

    #[test]
    fn summary_columns_follow_declaration_order() {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer
            .serialize(BusinessSummary {
                name: "Acme Bank".to_string(),
                rating: 4.5,
                detail_url: "https://example.com/acme".to_string(),
                description: "A bank.".to_string(),
            })
            .unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = out.lines().next().unwrap();
        assert_eq!(header, "name,stars,g2_url,description");
    }

    #[test]
    fn review_columns_follow_declaration_order() {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer
            .serialize(Review {
                author: "anonymous-0".to_string(),
                date: "2024-01-01".to_string(),
                job_title: "n/a".to_string(),
                rating: 3.5,
                body: "Fine.".to_string(),
                review_source: String::new(),
                validated: true,
                incentivized: false,
            })
            .unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = out.lines().next().unwrap();
        assert_eq!(
            header,
            "name,date,job_title,rating,full_review,review_source,validated,incentivized"
        );
    }
}
