//! Review tag chip normalization.

use std::collections::BTreeSet;

/// Tag marking a validated reviewer.
pub const VALIDATED_TAG: &str = "Validated Reviewer";

/// Tag marking an incentivized review.
pub const INCENTIVIZED_TAG: &str = "Incentivized Review";

/// Marker for the tag carrying the review's collection source.
pub const SOURCE_MARKER: &str = "Review source:";

/// Classified tags of one review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSummary {
    /// Value of the `Review source: X` tag, empty if none.
    pub source: String,
    /// Whether [`VALIDATED_TAG`] is present.
    pub validated: bool,
    /// Whether [`INCENTIVIZED_TAG`] is present.
    pub incentivized: bool,
}

/// Deduplicates and classifies raw tag texts.
///
/// Duplicate texts are counted once. Source tags never enter the tag set;
/// their suffix after the last `": "` becomes [`TagSummary::source`], and
/// the last such tag wins.
pub fn normalize_tags<I, S>(raw: I) -> TagSummary
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut source = String::new();

    for text in raw {
        let text = text.as_ref().trim();
        if seen.contains(text) {
            continue;
        }
        if text.contains(SOURCE_MARKER) {
            source = text
                .rsplit_once(": ")
                .map_or("", |(_, value)| value)
                .trim()
                .to_owned();
        } else {
            seen.insert(text.to_owned());
        }
    }

    TagSummary {
        source,
        validated: seen.contains(VALIDATED_TAG),
        incentivized: seen.contains(INCENTIVIZED_TAG),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sentinels_and_source() {
        let tags = normalize_tags([
            "Validated Reviewer",
            "Review source: Organic",
            "Incentivized Review",
        ]);
        assert_eq!(tags.source, "Organic");
        assert!(tags.validated);
        assert!(tags.incentivized);
    }

    #[test]
    fn duplicates_are_counted_once() {
        let tags = normalize_tags(["Validated Reviewer", "Validated Reviewer"]);
        assert!(tags.validated);
        assert!(!tags.validated);
        assert!(!tags.incentivized);
    }

    #[test]
    fn last_source_wins() {
        let tags = normalize_tags(["Review source: Seller invite", "Review source: Organic"]);
        assert_eq!(tags.source, "Organic");
        assert!(!tags.validated);
    }

    #[test]
    fn source_uses_suffix_after_last_separator() {
        let tags = normalize_tags(["Review source: G2: Event"]);
        assert_eq!(tags.source, "Event");
    }

    #[test]
    fn bare_marker_yields_empty_source() {
        let tags = normalize_tags(["Review source:"]);
        assert_eq!(tags.source, "");
    }

    #[test]
    fn empty_input_is_all_defaults() {
        assert_eq!(normalize_tags(Vec::<String>::new()), TagSummary::default());
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let raw = vec![
            "Incentivized Review".to_string(),
            "Review source: Organic".to_string(),
            "Incentivized Review".to_string(),
        ];
        assert_eq!(normalize_tags(&raw), normalize_tags(&raw));
    }
}
