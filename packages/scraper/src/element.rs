//! Owned DOM element snapshots.
//!
//! `scraper`'s [`ElementRef`] borrows from a parsed document that cannot be
//! sent between threads, so elements are captured as their outer HTML and
//! re-parsed on demand. Every query returns explicit optional results.

use scraper::{ElementRef, Html};

use crate::{ScrapeError, parse_selector};

/// A detached element handle holding the element's outer HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    html: String,
}

impl Element {
    /// Wraps an HTML fragment whose first top-level element is the handle.
    #[must_use]
    pub fn from_html(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    fn from_ref(element: ElementRef<'_>) -> Self {
        Self {
            html: element.html(),
        }
    }

    /// The outer HTML of this element.
    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Text content with surrounding whitespace removed.
    #[must_use]
    pub fn text(&self) -> String {
        self.with_root(|root| root.text().collect::<String>().trim().to_owned())
            .unwrap_or_default()
    }

    /// Raw value of attribute `name`, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.with_root(|root| root.value().attr(name).map(str::to_owned))
            .flatten()
    }

    /// All descendants matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Selector`] if the selector is invalid.
    pub fn query(&self, selector: &str) -> Result<Vec<Self>, ScrapeError> {
        let selector = parse_selector(selector)?;
        Ok(self
            .with_root(|root| root.select(&selector).map(Self::from_ref).collect())
            .unwrap_or_default())
    }

    /// First descendant matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Selector`] if the selector is invalid.
    pub fn query_one(&self, selector: &str) -> Result<Option<Self>, ScrapeError> {
        let selector = parse_selector(selector)?;
        Ok(self
            .with_root(|root| root.select(&selector).next().map(Self::from_ref))
            .flatten())
    }

    fn with_root<T>(&self, f: impl FnOnce(ElementRef<'_>) -> T) -> Option<T> {
        let fragment = Html::parse_fragment(&self.html);
        let root = fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)?;
        Some(f(root))
    }
}

/// Runs `selector` over a whole HTML document.
///
/// # Errors
///
/// Returns [`ScrapeError::Selector`] if the selector is invalid.
pub fn select_document(document: &str, selector: &str) -> Result<Vec<Element>, ScrapeError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(document);
    let elements = document.select(&selector).map(Element::from_ref).collect();
    Ok(elements)
}
