//! Small helpers for reading loosely typed PDF objects.

use lopdf::{Dictionary, Document, Object, Stream};

const MAX_REFERENCE_DEPTH: usize = 16;

/// Follow references until a direct object is reached
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..MAX_REFERENCE_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

pub fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub fn resolve_stream<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Stream> {
    match resolve(doc, object)? {
        Object::Stream(stream) => Some(stream),
        _ => None,
    }
}

pub fn as_f32(doc: &Document, object: &Object) -> Option<f32> {
    match resolve(doc, object)? {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

pub fn as_i64(doc: &Document, object: &Object) -> Option<i64> {
    match resolve(doc, object)? {
        Object::Integer(i) => Some(*i),
        Object::Real(r) => Some(r.round() as i64),
        Object::Boolean(b) => Some(*b as i64),
        _ => None,
    }
}

pub fn name_of(doc: &Document, object: &Object) -> Option<String> {
    match resolve(doc, object)? {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Decoded content of a stream object
pub fn stream_bytes(doc: &Document, object: &Object) -> Option<Vec<u8>> {
    decoded_stream(resolve_stream(doc, object)?)
}

pub fn decoded_stream(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Some(stream.content.clone());
    }
    stream.decompressed_content().ok()
}

/// Numbers of an array operand or entry, skipping anything else
pub fn number_array(doc: &Document, object: &Object) -> Option<Vec<f32>> {
    match resolve(doc, object)? {
        Object::Array(items) => Some(items.iter().filter_map(|o| as_f32(doc, o)).collect()),
        _ => None,
    }
}

/// Look up `key` on a page node, walking `/Parent` for inheritable attributes
pub fn inherited<'a>(doc: &'a Document, node: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = node;
    for _ in 0..MAX_REFERENCE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        current = current.get(b"Parent").ok().and_then(|p| resolve_dict(doc, p))?;
    }
    None
}
