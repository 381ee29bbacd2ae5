//! Image decoding: PDF image XObject stream → [`PixelData`].
//!
//! Two paths, chosen by the stream's `/Filter`:
//!
//! * **`DCTDecode`** — the stream *is* a JPEG file. The bytes are kept exactly
//!   as embedded and decoded once with the `image` crate for pixel access.
//! * **Raw samples** (no filter, or `FlateDecode`/`LZWDecode`/… undone by
//!   [`super::filters`]) — samples are interpreted from `/Width`, `/Height`,
//!   `/BitsPerComponent` and `/ColorSpace`, then wrapped losslessly as PNG.
//!
//! `JPXDecode`, `JBIG2Decode` and `CCITTFaxDecode` need codecs this crate does
//! not ship; such images fail with [`ImageDecodeError::UnsupportedFilter`] and
//! the extractor skips them.

use super::extract::resolve;
use super::filters::{decode_stream, FilterError};
use crate::error::ImageDecodeError;
use crate::output::{ImageEncoding, PixelData};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, Stream};
use std::io::Cursor;
use tracing::debug;

/// Refuse anything larger than this many pixels (~100 MP).
const MAX_PIXELS: u64 = 100_000_000;

/// Filters whose output is an image codec rather than raw samples.
const CODEC_FILTERS: &[&str] = &["JPXDecode", "JBIG2Decode", "CCITTFaxDecode"];

/// Where the image sits, for error reporting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ImageSlot {
    pub page: usize,
    pub ordinal: usize,
}

impl ImageSlot {
    fn corrupt(self, detail: impl Into<String>) -> ImageDecodeError {
        ImageDecodeError::Corrupt {
            page: self.page,
            ordinal: self.ordinal,
            detail: detail.into(),
        }
    }

    fn geometry(self, detail: impl Into<String>) -> ImageDecodeError {
        ImageDecodeError::InvalidGeometry {
            page: self.page,
            ordinal: self.ordinal,
            detail: detail.into(),
        }
    }

    fn color_space(self, color_space: impl Into<String>) -> ImageDecodeError {
        ImageDecodeError::UnsupportedColorSpace {
            page: self.page,
            ordinal: self.ordinal,
            color_space: color_space.into(),
        }
    }
}

/// Colour spaces we can turn into Luma8 or Rgb8.
#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorSpace>,
        hival: usize,
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }
}

/// Decode one image XObject stream.
pub(crate) fn decode_image(
    doc: &Document,
    stream: &Stream,
    slot: ImageSlot,
) -> Result<PixelData, ImageDecodeError> {
    let filters = stream_filters(doc, stream);

    if let Some(codec) = filters.iter().find(|f| CODEC_FILTERS.contains(&f.as_str())) {
        return Err(ImageDecodeError::UnsupportedFilter {
            page: slot.page,
            ordinal: slot.ordinal,
            filter: codec.clone(),
        });
    }

    match filters.last().map(String::as_str) {
        Some("DCTDecode") | Some("DCT") => {
            if filters.len() > 1 {
                return Err(ImageDecodeError::UnsupportedFilter {
                    page: slot.page,
                    ordinal: slot.ordinal,
                    filter: filters.join("+"),
                });
            }
            decode_jpeg(stream.content.clone(), slot)
        }
        _ => {
            let samples = match decode_stream(doc, stream, &filters) {
                Ok(samples) => samples,
                Err(FilterError::Unsupported(filter)) => {
                    return Err(ImageDecodeError::UnsupportedFilter {
                        page: slot.page,
                        ordinal: slot.ordinal,
                        filter,
                    })
                }
                Err(FilterError::Corrupt(detail)) => return Err(slot.corrupt(detail)),
            };
            decode_samples(doc, stream, &samples, slot)
        }
    }
}

/// Filter names in application order.
fn stream_filters(doc: &Document, stream: &Stream) -> Vec<String> {
    let Some(filter) = stream.dict.get(b"Filter").ok().and_then(|f| resolve(doc, f)) else {
        return Vec::new();
    };
    match filter {
        Object::Name(name) => vec![String::from_utf8_lossy(name).into_owned()],
        Object::Array(items) => items
            .iter()
            .filter_map(|item| resolve(doc, item))
            .filter_map(|item| item.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_jpeg(bytes: Vec<u8>, slot: ImageSlot) -> Result<PixelData, ImageDecodeError> {
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
        .map_err(|e| slot.corrupt(format!("JPEG: {e}")))?;
    debug!(
        "page {} image {}: JPEG {}x{}, {} bytes kept as-is",
        slot.page + 1,
        slot.ordinal,
        image.width(),
        image.height(),
        bytes.len()
    );
    Ok(PixelData::new(image, ImageEncoding::Jpeg, bytes))
}

fn decode_samples(
    doc: &Document,
    stream: &Stream,
    samples: &[u8],
    slot: ImageSlot,
) -> Result<PixelData, ImageDecodeError> {
    let dict = &stream.dict;
    let dimension = |key: &[u8]| -> Result<u32, ImageDecodeError> {
        let value = dict
            .get(key)
            .ok()
            .and_then(|v| resolve(doc, v))
            .and_then(|v| v.as_i64().ok())
            .ok_or_else(|| slot.geometry(format!("missing /{}", String::from_utf8_lossy(key))))?;
        u32::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| slot.geometry(format!("/{} = {value}", String::from_utf8_lossy(key))))
    };

    let width = dimension(b"Width")?;
    let height = dimension(b"Height")?;
    if u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(slot.geometry(format!("{width}x{height} exceeds the pixel limit")));
    }

    let is_mask = dict
        .get(b"ImageMask")
        .ok()
        .and_then(|v| v.as_bool().ok())
        .unwrap_or(false);

    let (space, bpc) = if is_mask {
        (ColorSpace::Gray, 1)
    } else {
        let space = match dict.get(b"ColorSpace").ok().and_then(|v| resolve(doc, v)) {
            Some(cs) => parse_color_space(doc, cs, slot)?,
            None => return Err(slot.color_space("none")),
        };
        let bpc = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|v| resolve(doc, v))
            .and_then(|v| v.as_i64().ok())
            .unwrap_or(8);
        (space, bpc)
    };

    let bpc = match bpc {
        1 | 2 | 4 | 8 | 16 => bpc as usize,
        other => return Err(slot.geometry(format!("/BitsPerComponent = {other}"))),
    };

    let (w, h) = (width as usize, height as usize);
    let components = space.components();
    let row_bytes = (w * components * bpc).div_ceil(8);
    let expected = row_bytes * h;
    if samples.len() < expected {
        return Err(ImageDecodeError::TruncatedSamples {
            page: slot.page,
            ordinal: slot.ordinal,
            expected,
            actual: samples.len(),
        });
    }

    let image = match &space {
        ColorSpace::Gray => {
            let mut pixels = Vec::with_capacity(w * h);
            for row in samples[..expected].chunks_exact(row_bytes) {
                pixels.extend(unpack_row(row, w, bpc).into_iter().map(|v| scale(v, bpc)));
            }
            GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        ColorSpace::Rgb => {
            let mut pixels = Vec::with_capacity(w * h * 3);
            for row in samples[..expected].chunks_exact(row_bytes) {
                pixels.extend(unpack_row(row, w * 3, bpc).into_iter().map(|v| scale(v, bpc)));
            }
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        ColorSpace::Cmyk => {
            let mut pixels = Vec::with_capacity(w * h * 3);
            for row in samples[..expected].chunks_exact(row_bytes) {
                let values: Vec<u8> = unpack_row(row, w * 4, bpc)
                    .into_iter()
                    .map(|v| scale(v, bpc))
                    .collect();
                for cmyk in values.chunks_exact(4) {
                    pixels.extend_from_slice(&cmyk_to_rgb(cmyk));
                }
            }
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        ColorSpace::Indexed {
            base,
            hival,
            lookup,
        } => {
            let n = base.components();
            let mut pixels = Vec::with_capacity(w * h * 3);
            for row in samples[..expected].chunks_exact(row_bytes) {
                for index in unpack_row(row, w, bpc) {
                    let index = (index as usize).min(*hival);
                    let entry = lookup.get(index * n..index * n + n).ok_or_else(|| {
                        slot.corrupt(format!("palette index {index} out of range"))
                    })?;
                    match base.as_ref() {
                        ColorSpace::Gray => pixels.extend_from_slice(&[entry[0]; 3]),
                        ColorSpace::Rgb => pixels.extend_from_slice(entry),
                        ColorSpace::Cmyk => pixels.extend_from_slice(&cmyk_to_rgb(entry)),
                        ColorSpace::Indexed { .. } => {
                            return Err(slot.color_space("Indexed over Indexed"))
                        }
                    }
                }
            }
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
    }
    .ok_or_else(|| slot.corrupt("pixel buffer does not match geometry"))?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| slot.corrupt(format!("PNG encode: {e}")))?;

    debug!(
        "page {} image {}: {:?} {}x{} @{}bpc → {} byte PNG",
        slot.page + 1,
        slot.ordinal,
        space_label(&space),
        width,
        height,
        bpc,
        png.len()
    );
    Ok(PixelData::new(image, ImageEncoding::Png, png))
}

fn space_label(space: &ColorSpace) -> &'static str {
    match space {
        ColorSpace::Gray => "Gray",
        ColorSpace::Rgb => "RGB",
        ColorSpace::Cmyk => "CMYK",
        ColorSpace::Indexed { .. } => "Indexed",
    }
}

fn parse_color_space(
    doc: &Document,
    cs: &Object,
    slot: ImageSlot,
) -> Result<ColorSpace, ImageDecodeError> {
    match cs {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
            other => Err(slot.color_space(String::from_utf8_lossy(other))),
        },
        Object::Array(items) => {
            let family = items
                .first()
                .and_then(|f| resolve(doc, f))
                .and_then(|f| f.as_name().ok())
                .ok_or_else(|| slot.color_space("empty array"))?;
            match family {
                b"CalGray" => Ok(ColorSpace::Gray),
                b"CalRGB" => Ok(ColorSpace::Rgb),
                b"ICCBased" => {
                    let profile = items
                        .get(1)
                        .and_then(|p| resolve(doc, p))
                        .and_then(|p| p.as_stream().ok())
                        .ok_or_else(|| slot.color_space("ICCBased without profile"))?;
                    match profile.dict.get(b"N").ok().and_then(|n| n.as_i64().ok()) {
                        Some(1) => Ok(ColorSpace::Gray),
                        Some(3) => Ok(ColorSpace::Rgb),
                        Some(4) => Ok(ColorSpace::Cmyk),
                        n => Err(slot.color_space(format!("ICCBased N={n:?}"))),
                    }
                }
                b"Indexed" | b"I" => {
                    let base = items
                        .get(1)
                        .and_then(|b| resolve(doc, b))
                        .ok_or_else(|| slot.color_space("Indexed without base"))?;
                    let base = parse_color_space(doc, base, slot)?;
                    if matches!(base, ColorSpace::Indexed { .. }) {
                        return Err(slot.color_space("Indexed over Indexed"));
                    }
                    let hival = items
                        .get(2)
                        .and_then(|h| resolve(doc, h))
                        .and_then(|h| h.as_i64().ok())
                        .filter(|h| (0..=255).contains(h))
                        .ok_or_else(|| slot.color_space("Indexed with invalid hival"))?
                        as usize;
                    let lookup = match items.get(3).and_then(|l| resolve(doc, l)) {
                        Some(Object::String(bytes, _)) => bytes.clone(),
                        Some(Object::Stream(s)) => s
                            .decompressed_content()
                            .unwrap_or_else(|_| s.content.clone()),
                        _ => return Err(slot.color_space("Indexed without lookup table")),
                    };
                    Ok(ColorSpace::Indexed {
                        base: Box::new(base),
                        hival,
                        lookup,
                    })
                }
                other => Err(slot.color_space(String::from_utf8_lossy(other))),
            }
        }
        _ => Err(slot.color_space("not a name or array")),
    }
}

/// Read `count` samples of `bpc` bits each from one row.
fn unpack_row(row: &[u8], count: usize, bpc: usize) -> Vec<u16> {
    match bpc {
        8 => row[..count].iter().map(|&b| u16::from(b)).collect(),
        16 => row
            .chunks_exact(2)
            .take(count)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect(),
        _ => {
            let per_byte = 8 / bpc;
            let mask = (1u16 << bpc) - 1;
            (0..count)
                .map(|i| {
                    let byte = u16::from(row[i / per_byte]);
                    let shift = 8 - bpc * (i % per_byte + 1);
                    (byte >> shift) & mask
                })
                .collect()
        }
    }
}

/// Scale a `bpc`-bit sample to 0..=255.
fn scale(value: u16, bpc: usize) -> u8 {
    match bpc {
        8 => value as u8,
        16 => (value >> 8) as u8,
        _ => {
            let max = (1u32 << bpc) - 1;
            (u32::from(value) * 255 / max) as u8
        }
    }
}

fn cmyk_to_rgb(cmyk: &[u8]) -> [u8; 3] {
    let k = 255 - u16::from(cmyk[3]);
    let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
    [channel(cmyk[0]), channel(cmyk[1]), channel(cmyk[2])]
}
