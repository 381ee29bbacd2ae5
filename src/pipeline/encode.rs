//! Image payload encoding: record → base64 `ImageData` for the vision model.
//!
//! The payload is the record's already-encoded bytes: the original JPEG for
//! `DCTDecode` images, the lossless PNG for everything else. Nothing is
//! re-compressed here, so the model sees exactly what the PDF embeds.

use crate::output::EmbeddedImageRecord;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap a record's encoded image as base64 with its MIME type.
///
/// `detail: "high"` asks tiling models to keep full resolution; providers that
/// ignore the hint are unaffected.
pub fn encode_record(record: &EmbeddedImageRecord) -> ImageData {
    let pixels = record.pixel_data();
    let b64 = STANDARD.encode(pixels.encoded_bytes());
    debug!(
        "Encoded '{}' → {} bytes base64 ({})",
        record.resolved_name(),
        b64.len(),
        pixels.encoding().mime_type()
    );
    ImageData::new(b64, pixels.encoding().mime_type()).with_detail("high")
}
