//! Review extraction from business detail pages.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use listing_crawl_models::Review;
use listing_crawl_scraper::Element;

use crate::selectors::{
    JOB_TITLE, RATING_CLASS, RATING_CONTAINER, REVIEW_BODY, REVIEW_DATE, REVIEWER_NAME, TAG,
    TAG_CONTAINER,
};
use crate::tags::normalize_tags;
use crate::{ExtractError, extract_all};

/// Job title written when the card shows none.
pub const MISSING_JOB_TITLE: &str = "n/a";

/// Highest rating class index (ten half-stars).
const MAX_RATING_INDEX: u8 = 10;

/// Extracts every review on a detail page.
///
/// Cards without a date or body are skipped. Reviewers without a name are
/// numbered `anonymous-0`, `anonymous-1`, ... in card order among the
/// reviews actually emitted from this page.
///
/// # Errors
///
/// Returns [`ExtractError::NoValidRecords`] if review cards were found but
/// every one of them was malformed.
pub fn extract_reviews(cards: &[Element]) -> Result<Vec<Review>, ExtractError> {
    let mut anonymous = 0_usize;
    extract_all(cards, "review card", |card| {
        extract_review(card, &mut anonymous)
    })
}

/// Extracts one review card.
///
/// Returns `Ok(None)` when the card lacks a date or a body. `anonymous` is
/// the next anonymous ordinal and is only advanced when a nameless review
/// is actually emitted.
///
/// # Errors
///
/// Returns [`ExtractError`] if the rating class is missing or malformed.
pub fn extract_review(card: &Element, anonymous: &mut usize) -> Result<Option<Review>, ExtractError> {
    let Some(date) = review_date(card)? else {
        return Ok(None);
    };
    let Some(body) = card.query_one(REVIEW_BODY)? else {
        return Ok(None);
    };

    let job_title = card
        .query_one(JOB_TITLE)?
        .map(|el| el.text())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| MISSING_JOB_TITLE.to_owned());

    let rating_class = card
        .query_one(RATING_CONTAINER)?
        .map(|container| container.query_one(RATING_CLASS))
        .transpose()?
        .flatten()
        .and_then(|el| el.attribute("class"))
        .ok_or(ExtractError::MissingField { field: "rating" })?;
    let rating = parse_rating_class(&rating_class)?;

    let tag_texts: Vec<String> = match card.query_one(TAG_CONTAINER)? {
        Some(container) => container
            .query(TAG)?
            .iter()
            .map(Element::text)
            .collect(),
        None => Vec::new(),
    };
    let tags = normalize_tags(&tag_texts);

    let author = match card
        .query_one(REVIEWER_NAME)?
        .map(|el| el.text())
        .filter(|name| !name.is_empty())
    {
        Some(name) => name,
        None => {
            let name = format!("anonymous-{anonymous}");
            *anonymous += 1;
            name
        }
    };

    Ok(Some(Review {
        author,
        date,
        job_title,
        rating,
        body: body.text(),
        review_source: tags.source,
        validated: tags.validated,
        incentivized: tags.incentivized,
    }))
}

/// Parses a rating from a class such as `"stars stars-7"`.
///
/// The trailing `-`-separated token is a half-star index from 0 to 10,
/// halved onto the 0.0 - 5.0 scale.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidRating`] if the suffix is not an integer
/// between 0 and 10.
pub fn parse_rating_class(class: &str) -> Result<f64, ExtractError> {
    let suffix = class.rsplit('-').next().unwrap_or_default().trim();
    let index: u8 = suffix.parse().map_err(|_| ExtractError::InvalidRating {
        value: class.to_owned(),
        reason: "class does not end in an integer",
    })?;
    if index > MAX_RATING_INDEX {
        return Err(ExtractError::InvalidRating {
            value: class.to_owned(),
            reason: "class index above 10",
        });
    }
    Ok(f64::from(index) / 2.0)
}

/// Normalizes a review timestamp to ISO-8601.
///
/// RFC 3339 timestamps are re-emitted in RFC 3339, bare dates as
/// `YYYY-MM-DD`. Anything else is kept verbatim.
#[must_use]
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return timestamp.to_rfc3339();
    }
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return timestamp.format("%Y-%m-%dT%H:%M:%S").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    raw.to_owned()
}

fn review_date(card: &Element) -> Result<Option<String>, ExtractError> {
    let Some(time) = card.query_one(REVIEW_DATE)? else {
        return Ok(None);
    };
    let raw = time
        .attribute("datetime")
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| time.text());
    if raw.is_empty() {
        return Ok(None);
    }
    Ok(Some(normalize_date(&raw)))
}
