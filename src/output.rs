//! Output types: extracted image records and lookup/caption results.

use crate::error::ImageDecodeError;
use crate::pipeline::{matcher, names};
use image::DynamicImage;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Status text shown when the caption service could not describe an image.
pub const DESCRIPTION_UNAVAILABLE: &str = "description unavailable";

/// Message shown when no record matches a query.
pub fn not_found_message(query: &str) -> String {
    format!("no pose found for {query}")
}

// ── Pixel data ───────────────────────────────────────────────────────────

/// Container format of [`PixelData::encoded_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    /// Embedded `DCTDecode` stream, bytes exactly as stored in the PDF.
    Jpeg,
    /// Raw samples from the PDF wrapped losslessly as PNG.
    Png,
}

impl ImageEncoding {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "jpg",
            ImageEncoding::Png => "png",
        }
    }
}

/// A decoded raster image together with its encoded payload.
#[derive(Clone)]
pub struct PixelData {
    image: DynamicImage,
    encoding: ImageEncoding,
    encoded: Vec<u8>,
}

impl PixelData {
    pub(crate) fn new(image: DynamicImage, encoding: ImageEncoding, encoded: Vec<u8>) -> Self {
        Self {
            image,
            encoding,
            encoded,
        }
    }

    /// The decoded pixels.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn encoding(&self) -> ImageEncoding {
        self.encoding
    }

    /// The encoded image: original JPEG bytes, or a PNG of the raw samples.
    pub fn encoded_bytes(&self) -> &[u8] {
        &self.encoded
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl fmt::Debug for PixelData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelData")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("color", &self.image.color())
            .field("encoding", &self.encoding)
            .field("encoded_len", &self.encoded.len())
            .finish()
    }
}

// ── Records ──────────────────────────────────────────────────────────────

/// One embedded raster image located in a PDF.
///
/// Records are immutable once built; the pipeline only filters and selects.
#[derive(Debug, Clone)]
pub struct EmbeddedImageRecord {
    page_index: usize,
    ordinal: usize,
    raw_name: Option<String>,
    resolved_name: String,
    pixel_data: PixelData,
    object_id: (u32, u16),
    resource_key: String,
}

impl EmbeddedImageRecord {
    /// Build a record, resolving its name from `raw_name` or `fallback_template`.
    ///
    /// A blank `raw_name` counts as absent.
    pub(crate) fn new(
        page_index: usize,
        ordinal: usize,
        raw_name: Option<String>,
        fallback_template: &str,
        pixel_data: PixelData,
        object_id: (u32, u16),
        resource_key: String,
    ) -> Self {
        let raw_name = raw_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let resolved_name = match &raw_name {
            Some(name) => name.clone(),
            None => names::resolve_name(page_index, ordinal, fallback_template),
        };
        Self {
            page_index,
            ordinal,
            raw_name,
            resolved_name,
            pixel_data,
            object_id,
            resource_key,
        }
    }

    /// 0-based page index.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// 1-based page number, as shown to users.
    pub fn page_number(&self) -> usize {
        self.page_index + 1
    }

    /// 0-based position among the images encountered on this page.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The `/Name` stored in the image dictionary, if any.
    pub fn raw_name(&self) -> Option<&str> {
        self.raw_name.as_deref()
    }

    /// The name used for matching and display. Never empty.
    pub fn resolved_name(&self) -> &str {
        &self.resolved_name
    }

    pub fn pixel_data(&self) -> &PixelData {
        &self.pixel_data
    }

    /// PDF object number and generation of the image XObject.
    pub fn object_id(&self) -> (u32, u16) {
        self.object_id
    }

    /// Key under which the page's `/XObject` resources reference the image.
    pub fn resource_key(&self) -> &str {
        &self.resource_key
    }

    /// A serialisable view without pixel data.
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            page_index: self.page_index,
            page_number: self.page_number(),
            ordinal: self.ordinal,
            name: self.resolved_name.clone(),
            raw_name: self.raw_name.clone(),
            width: self.pixel_data.width(),
            height: self.pixel_data.height(),
            encoding: self.pixel_data.encoding(),
            encoded_len: self.pixel_data.encoded_bytes().len(),
            object_id: format!("{} {} R", self.object_id.0, self.object_id.1),
            resource_key: self.resource_key.clone(),
        }
    }
}

impl Serialize for EmbeddedImageRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.summary().serialize(serializer)
    }
}

/// Metadata of an [`EmbeddedImageRecord`], for listings and JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub page_index: usize,
    pub page_number: usize,
    pub ordinal: usize,
    pub name: String,
    pub raw_name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    pub encoded_len: usize,
    pub object_id: String,
    pub resource_key: String,
}

/// Result of one extraction pass over a document.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    /// Successfully decoded images, page-major then ordinal-minor.
    pub records: Vec<EmbeddedImageRecord>,
    /// Images that were located but could not be decoded.
    pub skipped: Vec<ImageDecodeError>,
    /// Number of pages in the document.
    pub page_count: usize,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records whose resolved name contains `query`, ignoring case.
    pub fn matching(&self, query: &str) -> Vec<&EmbeddedImageRecord> {
        matcher::match_records(query, &self.records)
    }

    /// The first record in extraction order whose name contains `query`.
    pub fn first_match(&self, query: &str) -> Option<&EmbeddedImageRecord> {
        matcher::first_match(query, &self.records)
    }

    /// Consume the extraction, keeping only matching records.
    pub fn into_matching(self, query: &str) -> Vec<EmbeddedImageRecord> {
        self.records
            .into_iter()
            .filter(|r| matcher::is_match(query, &r.resolved_name))
            .collect()
    }

    pub fn summaries(&self) -> Vec<RecordSummary> {
        self.records.iter().map(EmbeddedImageRecord::summary).collect()
    }
}

// ── Caption and lookup results ───────────────────────────────────────────

/// Outcome of asking the caption service to describe one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptionStatus {
    Described {
        text: String,
        attempts: u32,
        duration_ms: u64,
    },
    Unavailable {
        reason: String,
        attempts: u32,
    },
}

impl CaptionStatus {
    /// The caption text, if the image was described.
    pub fn text(&self) -> Option<&str> {
        match self {
            CaptionStatus::Described { text, .. } => Some(text),
            CaptionStatus::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, CaptionStatus::Described { .. })
    }

    /// The caption, or [`DESCRIPTION_UNAVAILABLE`].
    pub fn display_text(&self) -> &str {
        self.text().unwrap_or(DESCRIPTION_UNAVAILABLE)
    }
}

/// Result of a single-pose lookup.
#[derive(Debug, Clone, Serialize)]
pub struct PoseLookup {
    pub query: String,
    pub outcome: LookupOutcome,
}

/// Whether a pose was found, and if so, its image and caption.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LookupOutcome {
    NotFound,
    Found {
        record: EmbeddedImageRecord,
        caption: CaptionStatus,
    },
}

impl PoseLookup {
    pub fn record(&self) -> Option<&EmbeddedImageRecord> {
        match &self.outcome {
            LookupOutcome::Found { record, .. } => Some(record),
            LookupOutcome::NotFound => None,
        }
    }

    pub fn caption(&self) -> Option<&CaptionStatus> {
        match &self.outcome {
            LookupOutcome::Found { caption, .. } => Some(caption),
            LookupOutcome::NotFound => None,
        }
    }
}

/// One image and its caption, as produced by [`crate::lookup::describe_all`].
#[derive(Debug, Clone, Serialize)]
pub struct DescribedImage {
    pub record: EmbeddedImageRecord,
    pub caption: CaptionStatus,
}


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn raw_name_wins_over_fallback() {
        let r = record(0, 0, Some("Warrior Pose"));
        assert_eq!(r.resolved_name(), "Warrior Pose");
        assert_eq!(r.raw_name(), Some("Warrior Pose"));
    }

    #[test]
    fn blank_raw_name_falls_back() {
        let r = record(1, 0, Some("   "));
        assert_eq!(r.raw_name(), None);
        assert_eq!(r.resolved_name(), "Yoga Pose 2");
    }

    #[test]
    fn summary_carries_identity() {
        let s = record(2, 3, None).summary();
        assert_eq!(s.page_number, 3);
        assert_eq!(s.ordinal, 3);
        assert_eq!(s.object_id, "12 0 R");
        assert_eq!(s.resource_key, "Im3");
        assert_eq!(s.encoding, ImageEncoding::Png);
    }

    #[test]
    fn record_serialises_as_summary() {
        let json = serde_json::to_value(record(0, 0, Some("Tree Pose"))).unwrap();
        assert_eq!(json["name"], "Tree Pose");
        assert_eq!(json["width"], 1);
    }

    #[test]
    fn caption_status_display() {
        let ok = CaptionStatus::Described {
            text: "Standing balance.".into(),
            attempts: 1,
            duration_ms: 5,
        };
        let ko = CaptionStatus::Unavailable {
            reason: "timeout".into(),
            attempts: 3,
        };
        assert_eq!(ok.display_text(), "Standing balance.");
        assert_eq!(ko.display_text(), DESCRIPTION_UNAVAILABLE);
        assert!(!ko.is_available());
        let json = serde_json::to_value(&ko).unwrap();
        assert_eq!(json["status"], "unavailable");
    }

    #[test]
    fn into_matching_keeps_order() {
        let extraction = Extraction {
            records: vec![
                record(0, 0, Some("Tree Pose")),
                record(1, 0, Some("Boat")),
                record(2, 0, Some("tree pose variant")),
            ],
            skipped: vec![],
            page_count: 3,
        };
        let pages: Vec<usize> = extraction
            .into_matching("TREE")
            .iter()
            .map(EmbeddedImageRecord::page_index)
            .collect();
        assert_eq!(pages, vec![0, 2]);
    }

    #[test]
    fn not_found_message_names_query() {
        assert_eq!(not_found_message("crow"), "no pose found for crow");
    }
}
