//! Query matching against resolved image names.
//!
//! Matching is plain case-insensitive substring search. It is not fuzzy and
//! not token based; [`NameMatcher`] is the seam for anything smarter.

use crate::output::EmbeddedImageRecord;

/// Decides whether a lower-cased query matches a lower-cased name.
pub trait NameMatcher {
    fn matches(&self, query_lower: &str, name_lower: &str) -> bool;
}

/// `name` contains `query`. The empty query matches everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl NameMatcher for SubstringMatcher {
    fn matches(&self, query_lower: &str, name_lower: &str) -> bool {
        name_lower.contains(query_lower)
    }
}

/// Whether `name` contains `query`, ignoring case.
pub fn is_match(query: &str, name: &str) -> bool {
    SubstringMatcher.matches(&query.to_lowercase(), &name.to_lowercase())
}

/// Every record whose resolved name matches `query`, in extraction order.
pub fn match_records<'a>(
    query: &str,
    records: &'a [EmbeddedImageRecord],
) -> Vec<&'a EmbeddedImageRecord> {
    match_with(&SubstringMatcher, query, records)
}

/// Like [`match_records`] with a caller-supplied matcher.
pub fn match_with<'a, M: NameMatcher + ?Sized>(
    matcher: &M,
    query: &str,
    records: &'a [EmbeddedImageRecord],
) -> Vec<&'a EmbeddedImageRecord> {
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|r| matcher.matches(&needle, &r.resolved_name().to_lowercase()))
        .collect()
}

/// The first matching record in extraction order.
///
/// First match wins: an earlier page is chosen even when a later page's name
/// is a closer match.
pub fn first_match<'a>(
    query: &str,
    records: &'a [EmbeddedImageRecord],
) -> Option<&'a EmbeddedImageRecord> {
    let needle = query.to_lowercase();
    records
        .iter()
        .find(|r| SubstringMatcher.matches(&needle, &r.resolved_name().to_lowercase()))
}
