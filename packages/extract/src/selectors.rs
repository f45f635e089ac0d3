//! Structural CSS selectors for listing and review pages.
//!
//! Class attributes are matched exactly, so a card whose class list changes
//! stops matching rather than matching something unintended.

/// One business card on a search results page.
pub const LISTING_CARD: &str = "div[class='product-listing mb-1 border-bottom']";

/// Business name block inside a listing card.
pub const BUSINESS_NAME: &str = "div[class='product-listing__product-name']";

/// Anchor inside the name block carrying the detail URL.
pub const BUSINESS_LINK: &str = "a";

/// Optional average-rating badge inside a listing card.
pub const RATING_BADGE: &str = "span[class='fw-semibold']";

/// Description paragraph inside a listing card.
pub const DESCRIPTION: &str = "p";

/// One review on a business detail page.
pub const REVIEW_CARD: &str =
    "div[class='paper paper--white paper--box mb-2 position-relative border-bottom']";

/// Review timestamp; the `datetime` attribute holds the date.
pub const REVIEW_DATE: &str = "time";

/// Review text block.
pub const REVIEW_BODY: &str = "div[itemprop='reviewBody']";

/// Reviewer name link, absent for anonymous reviewers.
pub const REVIEWER_NAME: &str = "a[class='link--header-color']";

/// Reviewer job title.
pub const JOB_TITLE: &str = "div[class='mt-4th']";

/// Container whose first `div` carries the rating class.
pub const RATING_CONTAINER: &str = "div[class='f-1 d-f ai-c mb-half-small-only']";

/// Element inside [`RATING_CONTAINER`] whose class ends in the rating index.
pub const RATING_CLASS: &str = "div";

/// Tag chip region of a review.
pub const TAG_CONTAINER: &str = "div[class='tags--teal']";

/// One tag chip inside [`TAG_CONTAINER`].
pub const TAG: &str = "div";
