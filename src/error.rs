//! Error types for the pdf-pose-finder library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`PoseError`] — **Fatal** for the request: the PDF cannot be located or
//!   parsed, the credential is missing, the configuration is invalid. Returned
//!   as `Err(PoseError)` from the top-level operations in [`crate::lookup`].
//!
//! * [`ImageDecodeError`] — **Non-fatal**: one embedded image could not be
//!   decoded. The extractor skips it, records the error in
//!   [`crate::output::Extraction::skipped`], and carries on with the rest.
//!
//! * [`crate::service::CaptionError`] — **Recoverable**: the caption service
//!   failed or answered with garbage. Never escapes the caption builder; it
//!   becomes [`crate::output::CaptionStatus::Unavailable`].
//!
//! "No image matched the query" is not an error at all; see
//! [`crate::output::LookupOutcome::NotFound`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-pose-finder library.
#[derive(Debug, Error)]
pub enum PoseError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path, directory or URL.
    #[error("Invalid input '{input}': not a file, a directory, or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// A directory was given but it holds no `.pdf` file.
    #[error("No PDF file found in directory '{dir}'")]
    NoPdfFound { dir: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The bytes could not be parsed as a PDF document.
    #[error("Could not open PDF '{origin}': {detail}")]
    DocumentOpen { origin: String, detail: String },

    // ── Caption service setup ─────────────────────────────────────────────
    /// No API key was found in any of the expected environment variables.
    #[error("No API key found. Set one of: {}", vars.join(", "))]
    MissingCredential { vars: Vec<String> },

    /// The named vision provider could not be constructed.
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an extracted image file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single embedded image.
///
/// `page` and `ordinal` are 0-based and match the slot the image would have
/// occupied in the record sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageDecodeError {
    /// The stream uses a filter this crate cannot decode (JPX, JBIG2, CCITT…).
    #[error("page {page}, image {ordinal}: unsupported filter {filter}")]
    UnsupportedFilter {
        page: usize,
        ordinal: usize,
        filter: String,
    },

    /// The colour space is missing or not one we know how to interpret.
    #[error("page {page}, image {ordinal}: unsupported colour space {color_space}")]
    UnsupportedColorSpace {
        page: usize,
        ordinal: usize,
        color_space: String,
    },

    /// `/Width`, `/Height` or `/BitsPerComponent` is missing or nonsensical.
    #[error("page {page}, image {ordinal}: invalid image geometry: {detail}")]
    InvalidGeometry {
        page: usize,
        ordinal: usize,
        detail: String,
    },

    /// The decompressed sample data is shorter than the geometry requires.
    #[error("page {page}, image {ordinal}: expected {expected} bytes of samples, got {actual}")]
    TruncatedSamples {
        page: usize,
        ordinal: usize,
        expected: usize,
        actual: usize,
    },

    /// The stream could not be decompressed or the codec rejected the bytes.
    #[error("page {page}, image {ordinal}: decode failed: {detail}")]
    Corrupt {
        page: usize,
        ordinal: usize,
        detail: String,
    },
}

impl ImageDecodeError {
    /// 0-based page index of the failed image.
    pub fn page(&self) -> usize {
        match self {
            Self::UnsupportedFilter { page, .. }
            | Self::UnsupportedColorSpace { page, .. }
            | Self::InvalidGeometry { page, .. }
            | Self::TruncatedSamples { page, .. }
            | Self::Corrupt { page, .. } => *page,
        }
    }

    /// 0-based ordinal of the failed image on its page.
    pub fn ordinal(&self) -> usize {
        match self {
            Self::UnsupportedFilter { ordinal, .. }
            | Self::UnsupportedColorSpace { ordinal, .. }
            | Self::InvalidGeometry { ordinal, .. }
            | Self::TruncatedSamples { ordinal, .. }
            | Self::Corrupt { ordinal, .. } => *ordinal,
        }
    }
}
