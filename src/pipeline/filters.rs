//! Stream filters for image XObjects.
//!
//! lopdf refuses to decompress streams whose dictionary says
//! `/Subtype /Image`, so image samples are decoded here instead:
//!
//! * `FlateDecode`: zlib via `flate2`, then the `/DecodeParms` predictor
//! * `LZWDecode`: handed to lopdf on a scratch stream without `/Subtype`,
//!   then the predictor
//! * `ASCII85Decode`: handed to lopdf the same way
//! * `ASCIIHexDecode`, `RunLengthDecode`: decoded in place
//!
//! Filters are applied in array order, each with its own `/DecodeParms`
//! entry.

use super::extract::resolve;
use flate2::read::ZlibDecoder;
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::io::Read;
use tracing::debug;

/// Why a filter chain could not be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FilterError {
    /// No decoder for this filter name.
    Unsupported(String),
    /// The decoder rejected the data.
    Corrupt(String),
}

/// Undo every filter in `filters`, in order.
pub(crate) fn decode_stream(
    doc: &Document,
    stream: &Stream,
    filters: &[String],
) -> Result<Vec<u8>, FilterError> {
    let parms = decode_parms(doc, stream, filters.len());
    let mut data = stream.content.clone();

    for (filter, parms) in filters.iter().zip(parms) {
        data = match filter.as_str() {
            "FlateDecode" | "Fl" => predict(inflate(&data)?, parms)?,
            "LZWDecode" | "LZW" => {
                let early = parms.and_then(|p| p.get(b"EarlyChange").ok()).cloned();
                predict(via_lopdf(data, "LZWDecode", early)?, parms)?
            }
            "ASCII85Decode" | "A85" => via_lopdf(data, "ASCII85Decode", None)?,
            "ASCIIHexDecode" | "AHx" => ascii_hex(&data)?,
            "RunLengthDecode" | "RL" => run_length(&data)?,
            other => return Err(FilterError::Unsupported(other.to_string())),
        };
    }
    Ok(data)
}

/// One `/DecodeParms` dictionary per filter; `None` where absent or null.
fn decode_parms<'a>(
    doc: &'a Document,
    stream: &'a Stream,
    n: usize,
) -> Vec<Option<&'a Dictionary>> {
    let parms = stream
        .dict
        .get(b"DecodeParms")
        .or_else(|_| stream.dict.get(b"DP"))
        .ok()
        .and_then(|p| resolve(doc, p));

    match parms {
        Some(Object::Dictionary(dict)) => {
            let mut all = vec![None; n];
            if let Some(first) = all.first_mut() {
                *first = Some(dict);
            }
            all
        }
        Some(Object::Array(items)) => (0..n)
            .map(|i| {
                items
                    .get(i)
                    .and_then(|p| resolve(doc, p))
                    .and_then(|p| p.as_dict().ok())
            })
            .collect(),
        _ => vec![None; n],
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, FilterError> {
    let mut out = Vec::new();
    match ZlibDecoder::new(data).read_to_end(&mut out) {
        Ok(_) => Ok(out),
        // Truncated or checksum-damaged streams are common; keep what inflated.
        Err(e) if !out.is_empty() => {
            debug!("FlateDecode: keeping {} bytes after error: {}", out.len(), e);
            Ok(out)
        }
        Err(e) => Err(FilterError::Corrupt(format!("FlateDecode: {e}"))),
    }
}

/// Run one filter through lopdf on a stream that is not marked as an image.
fn via_lopdf(
    data: Vec<u8>,
    filter: &str,
    early_change: Option<Object>,
) -> Result<Vec<u8>, FilterError> {
    let mut dict = dictionary! { "Filter" => filter };
    if let Some(early) = early_change {
        dict.set("DecodeParms", dictionary! { "EarlyChange" => early });
    }
    Stream::new(dict, data)
        .decompressed_content()
        .map_err(|e| FilterError::Corrupt(format!("{filter}: {e}")))
}

fn ascii_hex(data: &[u8]) -> Result<Vec<u8>, FilterError> {
    let mut digits = Vec::with_capacity(data.len());
    for &b in data {
        match b {
            b'>' => break,
            b if b.is_ascii_whitespace() => {}
            b if b.is_ascii_hexdigit() => digits.push(b),
            other => {
                return Err(FilterError::Corrupt(format!(
                    "ASCIIHexDecode: unexpected byte 0x{other:02x}"
                )))
            }
        }
    }
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    Ok(digits
        .chunks_exact(2)
        .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
        .collect())
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

fn run_length(data: &[u8]) -> Result<Vec<u8>, FilterError> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let len = data[i];
        i += 1;
        match len {
            128 => break,
            0..=127 => {
                let end = i + len as usize + 1;
                let run = data.get(i..end).ok_or_else(|| {
                    FilterError::Corrupt("RunLengthDecode: short literal run".into())
                })?;
                out.extend_from_slice(run);
                i = end;
            }
            _ => {
                let byte = *data.get(i).ok_or_else(|| {
                    FilterError::Corrupt("RunLengthDecode: missing repeat byte".into())
                })?;
                out.extend(std::iter::repeat(byte).take(257 - len as usize));
                i += 1;
            }
        }
    }
    Ok(out)
}

// ── Predictors ───────────────────────────────────────────────────────────

fn parm(parms: &Dictionary, key: &[u8], default: i64) -> i64 {
    parms
        .get(key)
        .ok()
        .and_then(|v| v.as_i64().ok())
        .unwrap_or(default)
}

/// Undo the `/Predictor` named in `parms` (1 = none, 2 = TIFF, ≥10 = PNG).
fn predict(data: Vec<u8>, parms: Option<&Dictionary>) -> Result<Vec<u8>, FilterError> {
    let Some(parms) = parms else {
        return Ok(data);
    };
    let predictor = parm(parms, b"Predictor", 1);
    if predictor <= 1 {
        return Ok(data);
    }

    let colors = parm(parms, b"Colors", 1).clamp(1, 32) as usize;
    let bpc = parm(parms, b"BitsPerComponent", 8).clamp(1, 16) as usize;
    let columns = parm(parms, b"Columns", 1).max(1) as usize;
    let row_len = (colors * bpc * columns).div_ceil(8);
    let bpp = (colors * bpc).div_ceil(8);

    match predictor {
        2 => tiff_predictor(data, row_len, colors, bpc),
        10..=15 => png_predictor(&data, row_len, bpp),
        other => Err(FilterError::Unsupported(format!("Predictor {other}"))),
    }
}

fn tiff_predictor(
    mut data: Vec<u8>,
    row_len: usize,
    colors: usize,
    bpc: usize,
) -> Result<Vec<u8>, FilterError> {
    if bpc != 8 {
        return Err(FilterError::Unsupported(format!("TIFF predictor at {bpc} bpc")));
    }
    for row in data.chunks_mut(row_len) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    Ok(data)
}

/// PNG predictors: every row starts with its own filter-type byte.
fn png_predictor(data: &[u8], row_len: usize, bpp: usize) -> Result<Vec<u8>, FilterError> {
    let mut out = Vec::with_capacity(data.len() / (row_len + 1) * row_len);
    let mut prev = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let (&tag, encoded) = match chunk.split_first() {
            Some(split) if !split.1.is_empty() => split,
            _ => break,
        };
        let mut row = encoded.to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let delta = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(FilterError::Corrupt(format!(
                        "PNG predictor: row filter {other}"
                    )))
                }
            };
            row[i] = row[i].wrapping_add(delta);
        }

        out.extend_from_slice(&row);
        prev = row;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn image_stream(extra: Dictionary, content: Vec<u8>) -> Stream {
        let mut dict = dictionary! { "Type" => "XObject", "Subtype" => "Image" };
        for (k, v) in extra.iter() {
            dict.set(k.clone(), v.clone());
        }
        Stream::new(dict, content)
    }

    fn names(filters: &[&str]) -> Vec<String> {
        filters.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn flate_image_stream_inflates() {
        let doc = Document::with_version("1.5");
        let samples: Vec<u8> = (0..=255).cycle().take(4096).collect();
        let stream = image_stream(dictionary! { "Filter" => "FlateDecode" }, zlib(&samples));

        let out = decode_stream(&doc, &stream, &names(&["FlateDecode"])).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn png_up_and_sub_rows() {
        // 3 columns, 1 colour: row 1 "Sub", row 2 "Up".
        let encoded = vec![1, 10, 5, 5, 2, 1, 1, 1];
        let out = png_predictor(&encoded, 3, 1).unwrap();
        assert_eq!(out, vec![10, 15, 20, 11, 16, 21]);
    }

    #[test]
    fn png_average_and_paeth_rows() {
        let encoded = vec![0, 10, 20, 3, 5, 5, 4, 1, 1];
        let out = png_predictor(&encoded, 2, 1).unwrap();
        // Average: 5 + (0+10)/2 = 10, 5 + (10+20)/2 = 20.
        // Paeth: 1 + paeth(0,10,0)=10 → 11, 1 + paeth(11,20,10)=20 → 21.
        assert_eq!(out, vec![10, 20, 10, 20, 11, 21]);
    }

    #[test]
    fn predictor_parms_from_dictionary() {
        let doc = Document::with_version("1.5");
        let rows = vec![2u8, 7, 8, 2, 1, 1];
        let stream = image_stream(
            dictionary! {
                "Filter" => "FlateDecode",
                "DecodeParms" => dictionary! {
                    "Predictor" => 15,
                    "Colors" => 1,
                    "Columns" => 2,
                },
            },
            zlib(&rows),
        );
        let out = decode_stream(&doc, &stream, &names(&["FlateDecode"])).unwrap();
        assert_eq!(out, vec![7, 8, 8, 9]);
    }

    #[test]
    fn tiff_predictor_accumulates_per_colour() {
        let out = tiff_predictor(vec![10, 20, 1, 2, 5, 5, 1, 1], 4, 2, 8).unwrap();
        assert_eq!(out, vec![10, 20, 11, 22, 5, 5, 6, 6]);
    }

    #[test]
    fn hex_then_flate_chain() {
        let doc = Document::with_version("1.5");
        let samples = vec![1u8, 2, 3, 4, 5, 6];
        let hex: String = zlib(&samples).iter().map(|b| format!("{b:02X} ")).collect();
        let stream = image_stream(
            dictionary! {
                "Filter" => vec![
                    Object::Name(b"ASCIIHexDecode".to_vec()),
                    Object::Name(b"FlateDecode".to_vec()),
                ],
            },
            format!("{hex}>").into_bytes(),
        );
        let filters = names(&["ASCIIHexDecode", "FlateDecode"]);
        let out = decode_stream(&doc, &stream, &filters).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn run_length_runs() {
        // literal "ab", then 'z' repeated 3 times, then EOD.
        let out = run_length(&[1, b'a', b'b', 254, b'z', 128]).unwrap();
        assert_eq!(out, b"abzzz");
    }

    #[test]
    fn garbage_flate_is_corrupt() {
        assert!(matches!(
            inflate(b"definitely not zlib"),
            Err(FilterError::Corrupt(_))
        ));
    }

    #[test]
    fn unknown_filter_is_unsupported() {
        let doc = Document::with_version("1.5");
        let stream = image_stream(dictionary! { "Filter" => "Crypt" }, vec![0; 4]);
        assert_eq!(
            decode_stream(&doc, &stream, &names(&["Crypt"])),
            Err(FilterError::Unsupported("Crypt".into()))
        );
    }
}
