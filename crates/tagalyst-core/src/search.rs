//! Search utilities shared by the focus service and the panel counter.
//!
//! Provides consistent search semantics for text matching:
//! - queries are normalized (whitespace collapsed, zero-width stripped) and lowercased once
//! - haystacks are lowercased per comparison, so matching is case-insensitive

use crate::identity::normalize;

/// Prepare a raw query for repeated matching.
///
/// # Examples
/// - "  Error  " -> "error"
/// - "Two\n words" -> "two words"
/// - "" -> ""
pub fn prepare_query(raw: &str) -> String {
    normalize(raw).to_lowercase()
}

/// Check if `text` contains a prepared (lowercased) query.
/// An empty query matches nothing: an empty search is "no search".
pub fn text_contains_query(text: &str, query_lower: &str) -> bool {
    if query_lower.is_empty() {
        return false;
    }
    text.to_lowercase().contains(query_lower)
}

/// Check if any of `values` contains the prepared query
pub fn any_contains_query<S: AsRef<str>>(values: &[S], query_lower: &str) -> bool {
    values
        .iter()
        .any(|v| text_contains_query(v.as_ref(), query_lower))
}
