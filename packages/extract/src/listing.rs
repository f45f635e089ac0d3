//! Business summary extraction from search results cards.

use listing_crawl_models::{ABSENT_RATING, BusinessSummary, MAX_RATING};
use listing_crawl_scraper::Element;

use crate::selectors::{BUSINESS_LINK, BUSINESS_NAME, DESCRIPTION, RATING_BADGE};
use crate::{ExtractError, extract_all};

/// Extracts one [`BusinessSummary`] from a listing card.
///
/// Name and detail URL are required. A missing rating badge yields
/// [`ABSENT_RATING`]; a missing description yields an empty string.
///
/// # Errors
///
/// Returns [`ExtractError`] if the name block or its link is missing, or the
/// rating badge holds something other than a 0 - 5 number.
pub fn extract_summary(card: &Element) -> Result<BusinessSummary, ExtractError> {
    let name_block = card
        .query_one(BUSINESS_NAME)?
        .ok_or(ExtractError::MissingField { field: "name" })?;
    let name = name_block.text();
    if name.is_empty() {
        return Err(ExtractError::MissingField { field: "name" });
    }

    let detail_url = name_block
        .query_one(BUSINESS_LINK)?
        .and_then(|link| link.attribute("href"))
        .map(|href| href.trim().to_owned())
        .filter(|href| !href.is_empty())
        .ok_or(ExtractError::MissingField { field: "detail_url" })?;

    let rating = match card.query_one(RATING_BADGE)? {
        Some(badge) => parse_badge_rating(&badge.text())?,
        None => ABSENT_RATING,
    };

    let description = card
        .query_one(DESCRIPTION)?
        .map(|p| p.text())
        .unwrap_or_default();

    Ok(BusinessSummary {
        name,
        rating,
        detail_url,
        description,
    })
}

/// Extracts every card on a listing page, skipping malformed cards.
///
/// # Errors
///
/// Returns [`ExtractError::NoValidRecords`] if cards were found but none
/// could be extracted.
pub fn extract_summaries(cards: &[Element]) -> Result<Vec<BusinessSummary>, ExtractError> {
    extract_all(cards, "listing card", |card| extract_summary(card).map(Some))
}

/// Parses the text of a rating badge such as `"4.5"`.
///
/// Blank text counts as an absent rating.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidRating`] if the text is not a number in
/// the 0 - 5 range.
pub fn parse_badge_rating(text: &str) -> Result<f64, ExtractError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(ABSENT_RATING);
    }
    let value: f64 = text.parse().map_err(|_| ExtractError::InvalidRating {
        value: text.to_owned(),
        reason: "not a number",
    })?;
    if !(0.0..=MAX_RATING).contains(&value) {
        return Err(ExtractError::InvalidRating {
            value: text.to_owned(),
            reason: "outside the 0 - 5 scale",
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(name: &str, rating: Option<&str>, description: Option<&str>) -> Element {
        let rating = rating.map_or_else(String::new, |r| {
            format!("<span class=\"fw-semibold\">{r}</span>")
        });
        let description = description.map_or_else(String::new, |d| format!("<p>{d}</p>"));
        Element::from_html(format!(
            "<div class=\"product-listing mb-1 border-bottom\">\
               <div class=\"product-listing__product-name\">\
                 <a href=\"https://www.g2.com/products/{slug}/reviews\">{name}</a>\
               </div>{rating}{description}</div>",
            slug = name.to_lowercase().replace(' ', "-"),
        ))
    }

    #[test]
    fn extracts_full_card() {
        let summary = extract_summary(&card("Acme Bank", Some("4.5"), Some("A bank."))).unwrap();
        assert_eq!(summary.name, "Acme Bank");
        assert!((summary.rating - 4.5).abs() < f64::EPSILON);
        assert_eq!(
            summary.detail_url,
            "https://www.g2.com/products/acme-bank/reviews"
        );
        assert_eq!(summary.description, "A bank.");
    }

    #[test]
    fn missing_badge_is_absent_rating() {
        let summary = extract_summary(&card("Acme Bank", None, Some("A bank."))).unwrap();
        assert!((summary.rating - ABSENT_RATING).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_description_is_empty() {
        let summary = extract_summary(&card("Acme Bank", Some("4.0"), None)).unwrap();
        assert_eq!(summary.description, "");
    }

    #[test]
    fn missing_name_block_is_an_error() {
        let el = Element::from_html("<div><p>Orphan</p></div>");
        assert!(matches!(
            extract_summary(&el),
            Err(ExtractError::MissingField { field: "name" })
        ));
    }

    #[test]
    fn missing_link_is_an_error() {
        let el = Element::from_html(
            "<div><div class=\"product-listing__product-name\">Acme</div></div>",
        );
        assert!(matches!(
            extract_summary(&el),
            Err(ExtractError::MissingField {
                field: "detail_url"
            })
        ));
    }

    #[test]
    fn badge_rating_bounds() {
        assert!(parse_badge_rating("5").is_ok());
        assert!(parse_badge_rating(" 0.0 ").is_ok());
        assert!(parse_badge_rating("").is_ok_and(|r| r.abs() < f64::EPSILON));
        assert!(parse_badge_rating("5.5").is_err());
        assert!(parse_badge_rating("four").is_err());
    }

    #[test]
    fn page_extraction_skips_bad_cards() {
        let cards = vec![
            card("Acme Bank", Some("4.5"), Some("A bank.")),
            card("Broken", Some("n/a"), None),
            card("Beta Bank", None, Some("Another bank.")),
        ];
        let summaries = extract_summaries(&cards).unwrap();
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Acme Bank", "Beta Bank"]);
    }
}
