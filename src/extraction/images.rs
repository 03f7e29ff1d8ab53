/*!
 * Image XObjects: the encoded payload is kept verbatim, only the dictionary
 * is read into an [`ImageEncoding`] so the image can be re-embedded.
 */

use std::collections::BTreeMap;

use bytes::Bytes;
use log::warn;
use lopdf::{Document, Object, Stream};

use super::objects::{as_i64, name_of, number_array, resolve, resolve_stream, stream_bytes};
use crate::document::{ColorSpace, ImageEncoding, RasterImage};

const MAX_MASK_DEPTH: usize = 1;

pub fn parse_raster(doc: &Document, stream: &Stream) -> Option<RasterImage> {
    parse_with_depth(doc, stream, 0)
}

fn parse_with_depth(doc: &Document, stream: &Stream, depth: usize) -> Option<RasterImage> {
    let dict = &stream.dict;
    let int = |key: &[u8]| dict.get(key).ok().and_then(|o| as_i64(doc, o));

    let width = u32::try_from(int(b"Width")?).ok()?;
    let height = u32::try_from(int(b"Height")?).ok()?;
    let image_mask = int(b"ImageMask").unwrap_or(0) != 0;
    let bits_per_component = if image_mask { 1 } else { int(b"BitsPerComponent").unwrap_or(8).clamp(1, 16) as u8 };

    let mut decode = dict.get(b"Decode").ok().and_then(|o| number_array(doc, o));
    let color_space = if image_mask {
        None
    } else {
        let (space, implied_decode) = dict
            .get(b"ColorSpace")
            .ok()
            .map(|cs| parse_color_space(doc, cs))
            .unwrap_or((ColorSpace::DeviceGray, None));
        if decode.is_none() {
            decode = implied_decode;
        }
        Some(space)
    };

    let soft_mask = if depth < MAX_MASK_DEPTH {
        dict.get(b"SMask")
            .ok()
            .and_then(|o| resolve_stream(doc, o))
            .and_then(|mask| parse_with_depth(doc, mask, depth + 1))
            .map(Box::new)
    } else {
        None
    };

    Some(RasterImage {
        encoding: ImageEncoding {
            width,
            height,
            bits_per_component,
            color_space,
            filters: filters(doc, stream),
            decode_parms: decode_parms(doc, stream),
            decode,
            image_mask,
        },
        payload: Bytes::from(stream.content.clone()),
        soft_mask,
    })
}

fn filters(doc: &Document, stream: &Stream) -> Vec<String> {
    match stream.dict.get(b"Filter").ok().and_then(|o| resolve(doc, o)) {
        Some(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Some(Object::Array(items)) => items.iter().filter_map(|o| name_of(doc, o)).collect(),
        _ => Vec::new(),
    }
}

fn decode_parms(doc: &Document, stream: &Stream) -> BTreeMap<String, i64> {
    let parms = match stream.dict.get(b"DecodeParms").ok().and_then(|o| resolve(doc, o)) {
        Some(Object::Dictionary(dict)) => Some(dict),
        Some(Object::Array(items)) => items.iter().find_map(|o| match resolve(doc, o) {
            Some(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        }),
        _ => None,
    };
    parms
        .map(|dict| {
            dict.iter()
                .filter_map(|(key, value)| Some((String::from_utf8_lossy(key).into_owned(), as_i64(doc, value)?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Color space plus the Decode array that approximates it when it has no device equivalent
fn parse_color_space(doc: &Document, object: &Object) -> (ColorSpace, Option<Vec<f32>>) {
    let Some(resolved) = resolve(doc, object) else {
        return (ColorSpace::DeviceGray, None);
    };
    match resolved {
        Object::Name(name) => (device_space(&String::from_utf8_lossy(name)), None),
        Object::Array(items) => {
            let family = items.first().and_then(|o| name_of(doc, o)).unwrap_or_default();
            match family.as_str() {
                "ICCBased" => {
                    let components = items
                        .get(1)
                        .and_then(|o| resolve_stream(doc, o))
                        .and_then(|s| s.dict.get(b"N").ok().and_then(|n| as_i64(doc, n)))
                        .unwrap_or(3);
                    (space_for_components(components), None)
                }
                "CalGray" => (ColorSpace::DeviceGray, None),
                "CalRGB" | "Lab" => (ColorSpace::DeviceRgb, None),
                "Indexed" | "I" => indexed_space(doc, items),
                "Separation" => (ColorSpace::DeviceGray, Some(vec![1.0, 0.0])),
                "DeviceN" => {
                    let count = items.get(1).and_then(|o| resolve(doc, o)).and_then(|o| o.as_array().ok()).map(Vec::len);
                    match count {
                        Some(1) => (ColorSpace::DeviceGray, Some(vec![1.0, 0.0])),
                        Some(n) => (space_for_components(n as i64), None),
                        None => (ColorSpace::DeviceGray, None),
                    }
                }
                other => {
                    warn!("Unsupported image color space {}, embedding as DeviceRGB", other);
                    (ColorSpace::DeviceRgb, None)
                }
            }
        }
        _ => (ColorSpace::DeviceGray, None),
    }
}

fn device_space(name: &str) -> ColorSpace {
    match name {
        "DeviceRGB" | "RGB" | "CalRGB" => ColorSpace::DeviceRgb,
        "DeviceCMYK" | "CMYK" => ColorSpace::DeviceCmyk,
        _ => ColorSpace::DeviceGray,
    }
}

fn space_for_components(components: i64) -> ColorSpace {
    match components {
        1 => ColorSpace::DeviceGray,
        4 => ColorSpace::DeviceCmyk,
        _ => ColorSpace::DeviceRgb,
    }
}

fn indexed_space(doc: &Document, items: &[Object]) -> (ColorSpace, Option<Vec<f32>>) {
    let base = items.get(1).map(|o| parse_color_space(doc, o).0).unwrap_or(ColorSpace::DeviceRgb);
    let hival = items.get(2).and_then(|o| as_i64(doc, o)).unwrap_or(255).clamp(0, 255) as u8;
    let lookup = match items.get(3).and_then(|o| resolve(doc, o)) {
        Some(Object::String(bytes, _)) => bytes.clone(),
        Some(stream @ Object::Stream(_)) => stream_bytes(doc, stream).unwrap_or_default(),
        _ => Vec::new(),
    };
    (
        ColorSpace::Indexed {
            base: Box::new(base),
            hival,
            lookup,
        },
        None,
    )
}
