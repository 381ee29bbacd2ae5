//! Pipeline stages for finding and describing pose images.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the caption backend can change without touching extraction.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ names ──▶ matcher ──▶ caption ──▶ clean
//! (path/dir/URL) (lopdf)  (fallback) (query)  (encode + service)
//! ```
//!
//! 1. [`input`]   — canonicalise a path, directory or URL to a local PDF
//! 2. [`extract`] — walk page resources and collect image XObjects; runs in
//!    `spawn_blocking` because parsing and decoding are CPU-bound
//! 3. [`decode`]  — turn one image stream into pixels plus an encoded payload;
//!    stream filters and predictors are undone in `filters`
//! 4. [`names`]   — fallback names from page and ordinal
//! 5. [`matcher`] — case-insensitive substring match, first match wins
//! 6. [`encode`]  — base64-wrap the payload for the multimodal request
//! 7. [`caption`] — call the caption service with timeout and retry; the only
//!    stage with network I/O
//! 8. [`clean`]   — deterministic cleanup of the model's text

pub mod caption;
pub mod clean;
pub mod decode;
pub mod encode;
pub mod extract;
pub(crate) mod filters;
pub mod input;
pub mod matcher;
pub mod names;
