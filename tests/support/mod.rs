//! Synthetic PDF fixtures built with lopdf.
//!
//! Every document is assembled in memory so the tests need no binary files.

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use flate2::{write::ZlibEncoder, Compression};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Write};

/// Builds a PDF one page at a time.
pub struct PdfFixture {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    inherited: Option<Dictionary>,
}

impl PdfFixture {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            inherited: None,
        }
    }

    // ── Images ───────────────────────────────────────────────────────────

    /// An uncompressed 8-bit RGB image filled with one colour.
    pub fn rgb_image(
        &mut self,
        name: Option<&str>,
        width: u32,
        height: u32,
        fill: [u8; 3],
    ) -> ObjectId {
        let samples: Vec<u8> = fill
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        self.raw_image(name, width, height, "DeviceRGB", samples, Dictionary::new())
    }

    /// An 8-bit gray image stored as a zlib `FlateDecode` stream.
    pub fn compressed_gray_image(
        &mut self,
        name: Option<&str>,
        width: u32,
        height: u32,
        samples: &[u8],
    ) -> ObjectId {
        let filter = dictionary! { "Filter" => "FlateDecode" };
        self.raw_image(name, width, height, "DeviceGray", zlib(samples), filter)
    }

    /// An 8-bit gray `FlateDecode` image with PNG predictors
    /// (`/Predictor 15`): even rows use "Sub", odd rows use "Up".
    pub fn predicted_gray_image(
        &mut self,
        name: Option<&str>,
        width: u32,
        height: u32,
        samples: &[u8],
    ) -> ObjectId {
        let w = width as usize;
        let mut encoded = Vec::with_capacity(samples.len() + height as usize);
        for (y, row) in samples.chunks(w).enumerate() {
            if y % 2 == 0 {
                encoded.push(1);
                encoded.extend(row.iter().enumerate().map(|(x, &v)| {
                    v.wrapping_sub(if x == 0 { 0 } else { row[x - 1] })
                }));
            } else {
                let above = &samples[(y - 1) * w..y * w];
                encoded.push(2);
                encoded.extend(row.iter().zip(above).map(|(&v, &up)| v.wrapping_sub(up)));
            }
        }
        let filter = dictionary! {
            "Filter" => "FlateDecode",
            "DecodeParms" => dictionary! {
                "Predictor" => 15,
                "Colors" => 1,
                "Columns" => width as i64,
            },
        };
        self.raw_image(name, width, height, "DeviceGray", zlib(&encoded), filter)
    }

    fn raw_image(
        &mut self,
        name: Option<&str>,
        width: u32,
        height: u32,
        color_space: &str,
        content: Vec<u8>,
        filter: Dictionary,
    ) -> ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
        };
        for (key, value) in filter.iter() {
            dict.set(key.clone(), value.clone());
        }
        if let Some(name) = name {
            dict.set("Name", Object::string_literal(name));
        }
        self.doc.add_object(Stream::new(dict, content))
    }

    /// A DCTDecode image whose stream is `jpeg` verbatim.
    pub fn jpeg_image(
        &mut self,
        name: Option<&str>,
        jpeg: Vec<u8>,
        width: u32,
        height: u32,
    ) -> ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        if let Some(name) = name {
            dict.set("Name", Object::string_literal(name));
        }
        self.doc.add_object(Stream::new(dict, jpeg))
    }

    /// An RGB image whose sample data is too short for its geometry.
    pub fn truncated_image(&mut self) -> ObjectId {
        let samples = vec![1, 2, 3];
        self.raw_image(Some("Broken Pose"), 4, 4, "DeviceRGB", samples, Dictionary::new())
    }

    /// A JPEG 2000 image, which the extractor cannot decode.
    pub fn jpx_image(&mut self) -> ObjectId {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "JPXDecode",
        };
        self.doc.add_object(Stream::new(dict, vec![0u8; 16]))
    }

    /// A Form XObject whose own resources reference `xobjects`.
    pub fn form(&mut self, xobjects: &[(&str, ObjectId)]) -> ObjectId {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
            "Resources" => dictionary! { "XObject" => xobject_dict(xobjects) },
        };
        self.doc.add_object(Stream::new(dict, Vec::new()))
    }

    // ── Pages ────────────────────────────────────────────────────────────

    /// A page with its own `/Resources` naming `xobjects` in order.
    pub fn page(&mut self, xobjects: &[(&str, ObjectId)]) -> &mut Self {
        let resources = dictionary! { "XObject" => xobject_dict(xobjects) };
        self.push_page(Some(resources))
    }

    /// A page without `/Resources`; it inherits from the page tree root.
    pub fn inheriting_page(&mut self) -> &mut Self {
        self.push_page(None)
    }

    /// Resources on the `/Pages` root, inherited by pages that lack their own.
    pub fn inherited_resources(&mut self, xobjects: &[(&str, ObjectId)]) -> &mut Self {
        self.inherited = Some(dictionary! { "XObject" => xobject_dict(xobjects) });
        self
    }

    fn push_page(&mut self, resources: Option<Dictionary>) -> &mut Self {
        let mut dict = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        if let Some(resources) = resources {
            dict.set("Resources", resources);
        }
        let id = self.doc.add_object(dict);
        self.kids.push(id);
        self
    }

    /// Serialise the document.
    pub fn build(mut self) -> Vec<u8> {
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => self.kids.len() as i64,
        };
        if let Some(resources) = self.inherited.take() {
            pages.set("Resources", resources);
        }
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).expect("serialise pdf");
        bytes
    }
}

fn xobject_dict(xobjects: &[(&str, ObjectId)]) -> Dictionary {
    let mut dict = Dictionary::new();
    for (key, id) in xobjects {
        dict.set(*key, Object::Reference(*id));
    }
    dict
}

/// Zlib-encode `data` unconditionally, so every fixture stream is filtered.
fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("zlib write");
    encoder.finish().expect("zlib finish")
}

/// A small solid-colour JPEG produced by the `image` crate.
pub fn jpeg_bytes(width: u32, height: u32, fill: [u8; 3]) -> Vec<u8> {
    let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(fill)));
    let mut jpeg = Vec::new();
    source
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .expect("jpeg encode");
    jpeg
}

/// The yoga catalogue used across tests.
///
/// * page 1: "Warrior Pose" (named) then an unnamed image
/// * page 2: one unnamed image
/// * page 3: no images
pub fn yoga_catalogue() -> Vec<u8> {
    let mut pdf = PdfFixture::new();
    let warrior = pdf.rgb_image(Some("Warrior Pose"), 2, 2, [200, 10, 10]);
    let plain = pdf.rgb_image(None, 3, 1, [0, 120, 0]);
    let later = pdf.rgb_image(None, 1, 1, [0, 0, 255]);
    pdf.page(&[("Im0", warrior), ("Im1", plain)])
        .page(&[("Im0", later)])
        .page(&[]);
    pdf.build()
}
