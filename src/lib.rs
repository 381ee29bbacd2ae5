//! # pdf-pose-finder
//!
//! Find pose illustrations embedded in a PDF by name, and ask a vision model
//! to describe them.
//!
//! ## Why this crate?
//!
//! Pose catalogues are usually PDFs with one picture per pose. The pictures
//! are embedded image objects, sometimes carrying a `/Name`, often not. This
//! crate pulls every embedded image out of the document without rendering
//! pages, gives each a stable name (its own, or `"Yoga Pose {page}"`), lets you
//! search those names, and sends the chosen image to a multimodal model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file, directory or URL
//!  ├─ 2. Extract  walk page XObjects via lopdf (CPU-bound, spawn_blocking)
//!  ├─ 3. Name     embedded /Name, else fallback template
//!  ├─ 4. Match    case-insensitive substring, first match wins
//!  ├─ 5. Caption  instruction + image → Gemini / any edgequake-llm provider
//!  └─ 6. Output   record + caption, or "no pose found", or "description unavailable"
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_pose_finder::{show_pose, ApiKey, GeminiCaptionService, PoseConfig, API_KEY_VARS};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = ApiKey::from_env(API_KEY_VARS)?;
//!     let service = GeminiCaptionService::new(key);
//!     let config = PoseConfig::default();
//!
//!     let lookup = show_pose("yoga.pdf", "warrior", &service, &config).await?;
//!     match (lookup.record(), lookup.caption()) {
//!         (Some(record), Some(caption)) => {
//!             println!("{} (page {})", record.resolved_name(), record.page_number());
//!             println!("{}", caption.display_text());
//!         }
//!         _ => println!("no pose found for warrior"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `posefind` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf-pose-finder = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod credential;
pub mod error;
pub mod lookup;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PoseConfig, PoseConfigBuilder, IMAGE_TEMPLATE, YOGA_POSE_TEMPLATE};
pub use credential::{ApiKey, API_KEY_VARS};
pub use error::{ImageDecodeError, PoseError};
pub use lookup::{
    describe_all, describe_records, extract, extract_from_bytes, extract_sync, find_poses,
    image_file_name, list_images, lookup_in, save_images, show_pose,
};
pub use output::{
    CaptionStatus, DescribedImage, EmbeddedImageRecord, Extraction, ImageEncoding, LookupOutcome,
    PixelData, PoseLookup, RecordSummary, DESCRIPTION_UNAVAILABLE,
};
pub use pipeline::matcher::{first_match, match_records, match_with, NameMatcher, SubstringMatcher};
pub use pipeline::names::resolve_name;
pub use progress::{CaptionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::{
    CaptionError, CaptionOptions, CaptionRequest, CaptionService, GeminiCaptionService,
    ProviderCaptionService,
};
