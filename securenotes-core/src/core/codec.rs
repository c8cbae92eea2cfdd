//! JSON encoding of notes and of the note index.

use std::collections::BTreeMap;

use crate::{Note, Result};

/// Note id to metadata-only note.
pub type IndexMap = BTreeMap<String, Note>;

/// Encodes the full form of `note`, content included.
pub fn encode_note(note: &Note) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(note)?)
}

pub fn decode_note(bytes: &[u8]) -> Result<Note> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encodes the index as one JSON object keyed by note id.
pub fn encode_index(index: &IndexMap) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(index)?)
}

/// Parses an index previously written by [`encode_index`].
pub fn decode_index(bytes: &[u8]) -> serde_json::Result<IndexMap> {
    serde_json::from_slice(bytes)
}

/// Cheap check that `bytes` could hold a JSON object at all.
pub fn looks_like_object(bytes: &[u8]) -> bool {
    bytes.first() == Some(&b'{')
}
