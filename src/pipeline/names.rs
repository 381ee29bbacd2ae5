//! Fallback names for images that carry no `/Name` of their own.

use crate::config::{ORDINAL_PLACEHOLDER, PAGE_PLACEHOLDER};

/// Build the fallback name for the image at (`page_index`, `ordinal`).
///
/// `{page}` becomes the 1-based page number and `{ordinal}` the 1-based
/// position on the page. Pure: the same inputs always give the same string.
pub fn resolve_name(page_index: usize, ordinal: usize, template: &str) -> String {
    template
        .replace(PAGE_PLACEHOLDER, &(page_index + 1).to_string())
        .replace(ORDINAL_PLACEHOLDER, &(ordinal + 1).to_string())
}
