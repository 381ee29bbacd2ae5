//! Image extraction: walk every page's XObject resources and decode images.
//!
//! Pages are visited in order. For each page the `/Resources` dictionary is
//! resolved (inherited from `/Parent` page-tree nodes when the page has none),
//! its `/XObject` entries are enumerated in dictionary order, and Form
//! XObjects are descended into with their own resources. An image object is
//! recorded at most once per page; the same image on two pages yields two
//! records.
//!
//! Inline images (`BI … ID … EI` in content streams) are not reported.

use super::decode::{decode_image, ImageSlot};
use crate::error::{ImageDecodeError, PoseError};
use crate::output::{EmbeddedImageRecord, Extraction};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Form XObjects nested deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 16;

/// Page-tree levels searched for inherited `/Resources`.
const MAX_PARENT_DEPTH: usize = 32;

/// Follow one level of indirection. Dangling references resolve to `None`.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Extract every embedded image from in-memory PDF bytes.
pub fn extract_images(bytes: &[u8], fallback_template: &str) -> Result<Extraction, PoseError> {
    extract_images_from(bytes, fallback_template, "<memory>")
}

/// Read and extract a PDF file off the async runtime.
///
/// Parsing and decoding are CPU-bound, so the whole pass runs inside
/// `spawn_blocking`.
pub async fn extract_images_from_path(
    path: &Path,
    fallback_template: &str,
) -> Result<Extraction, PoseError> {
    let path: PathBuf = path.to_path_buf();
    let template = fallback_template.to_string();

    tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PoseError::FileNotFound { path: path.clone() },
            std::io::ErrorKind::PermissionDenied => {
                PoseError::PermissionDenied { path: path.clone() }
            }
            _ => PoseError::DocumentOpen {
                origin: path.display().to_string(),
                detail: e.to_string(),
            },
        })?;
        extract_images_from(&bytes, &template, &path.display().to_string())
    })
    .await
    .map_err(|e| PoseError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking extraction; `origin` only labels errors and logs.
pub(crate) fn extract_images_from(
    bytes: &[u8],
    fallback_template: &str,
    origin: &str,
) -> Result<Extraction, PoseError> {
    let doc = Document::load_mem(bytes).map_err(|e| PoseError::DocumentOpen {
        origin: origin.to_string(),
        detail: e.to_string(),
    })?;

    let pages = doc.get_pages();
    info!("PDF loaded: {} pages ({})", pages.len(), origin);

    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for (page_index, page_id) in pages.values().enumerate() {
        let Some(resources) = page_resources(&doc, *page_id) else {
            debug!("page {}: no resources", page_index + 1);
            continue;
        };

        let mut walk = PageWalk {
            doc: &doc,
            page_index,
            fallback_template,
            next_ordinal: 0,
            seen_images: HashSet::new(),
            open_forms: HashSet::new(),
            records: &mut records,
            skipped: &mut skipped,
        };
        walk.visit_resources(resources, 0);
        debug!("page {}: {} image object(s)", page_index + 1, walk.next_ordinal);
    }

    info!(
        "Extracted {} image(s), skipped {} ({})",
        records.len(),
        skipped.len(),
        origin
    );

    Ok(Extraction {
        records,
        skipped,
        page_count: pages.len(),
    })
}

/// The page's `/Resources`, falling back to the nearest ancestor's.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    let mut visited = HashSet::from([page_id]);

    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(resources) = node
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve(doc, r))
            .and_then(|r| r.as_dict().ok())
        {
            return Some(resources);
        }
        let parent_id = node.get(b"Parent").ok()?.as_reference().ok()?;
        if !visited.insert(parent_id) {
            return None;
        }
        node = doc.get_dictionary(parent_id).ok()?;
    }
    None
}

/// Per-page traversal state.
struct PageWalk<'a, 'o> {
    doc: &'a Document,
    page_index: usize,
    fallback_template: &'a str,
    next_ordinal: usize,
    seen_images: HashSet<ObjectId>,
    open_forms: HashSet<ObjectId>,
    records: &'o mut Vec<EmbeddedImageRecord>,
    skipped: &'o mut Vec<ImageDecodeError>,
}

impl PageWalk<'_, '_> {
    fn visit_resources(&mut self, resources: &Dictionary, depth: usize) {
        let doc = self.doc;
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|x| resolve(doc, x))
            .and_then(|x| x.as_dict().ok())
        else {
            return;
        };

        for (key, entry) in xobjects.iter() {
            let id = entry.as_reference().ok();
            let Some(stream) = resolve(doc, entry).and_then(|o| o.as_stream().ok()) else {
                continue;
            };
            let subtype = stream.dict.get(b"Subtype").ok().and_then(|s| s.as_name().ok());
            let resource_key = String::from_utf8_lossy(key).into_owned();

            match subtype {
                Some(b"Image") => {
                    if let Some(id) = id {
                        if !self.seen_images.insert(id) {
                            continue;
                        }
                    }
                    self.record_image(stream, id.unwrap_or((0, 0)), resource_key);
                }
                Some(b"Form") => {
                    if depth >= MAX_FORM_DEPTH {
                        warn!(
                            "page {}: form XObject {} nested too deep, skipped",
                            self.page_index + 1,
                            resource_key
                        );
                        continue;
                    }
                    if let Some(id) = id {
                        if !self.open_forms.insert(id) {
                            continue;
                        }
                    }
                    if let Some(form_resources) = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|r| resolve(doc, r))
                        .and_then(|r| r.as_dict().ok())
                    {
                        self.visit_resources(form_resources, depth + 1);
                    }
                    if let Some(id) = id {
                        self.open_forms.remove(&id);
                    }
                }
                _ => {}
            }
        }
    }

    fn record_image(&mut self, stream: &lopdf::Stream, object_id: ObjectId, resource_key: String) {
        let slot = ImageSlot {
            page: self.page_index,
            ordinal: self.next_ordinal,
        };
        self.next_ordinal += 1;

        match decode_image(self.doc, stream, slot) {
            Ok(pixels) => {
                let raw_name = image_name(self.doc, &stream.dict);
                self.records.push(EmbeddedImageRecord::new(
                    slot.page,
                    slot.ordinal,
                    raw_name,
                    self.fallback_template,
                    pixels,
                    object_id,
                    resource_key,
                ));
            }
            Err(e) => {
                warn!("Skipping image {} ({}): {}", resource_key, format_id(object_id), e);
                self.skipped.push(e);
            }
        }
    }
}

fn format_id((num, gen): ObjectId) -> String {
    format!("{num} {gen} R")
}

/// The image dictionary's `/Name`, as a name or a text string.
fn image_name(doc: &Document, dict: &Dictionary) -> Option<String> {
    match resolve(doc, dict.get(b"Name").ok()?)? {
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, else
/// byte-per-char.
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    #[test]
    fn text_string_utf16_with_bom() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "Śavāsana".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text_string(&bytes), "Śavāsana");
    }

    #[test]
    fn text_string_plain_ascii() {
        assert_eq!(decode_text_string(b"Warrior Pose"), "Warrior Pose");
    }

    #[test]
    fn text_string_latin1_fallback() {
        assert_eq!(decode_text_string(&[b'P', 0xE9, b'x']), "Péx");
    }

    #[test]
    fn image_name_accepts_name_and_string() {
        let doc = Document::with_version("1.5");
        let mut dict = Dictionary::new();
        dict.set("Name", Object::Name(b"Tree".to_vec()));
        assert_eq!(image_name(&doc, &dict).as_deref(), Some("Tree"));

        dict.set(
            "Name",
            Object::String(b"Downward Dog".to_vec(), StringFormat::Literal),
        );
        assert_eq!(image_name(&doc, &dict).as_deref(), Some("Downward Dog"));

        dict.set("Name", Object::Integer(3));
        assert_eq!(image_name(&doc, &dict), None);
    }

    #[test]
    fn garbage_bytes_are_a_document_error() {
        let err = extract_images(b"%PDF-1.4 this is not really a pdf", "Image {page}").unwrap_err();
        assert!(matches!(err, PoseError::DocumentOpen { .. }));
    }
}
