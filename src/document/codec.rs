//! Durable representation of the live stroke set.
//!
//! The payload is JSON with `format_version` as its first field. Output is
//! deterministic (pages ascending, strokes in z-order) and floats round-trip
//! exactly, so decoding and re-encoding reproduces the same bytes.

use super::history::PageMap;
use crate::draw::Stroke;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Current payload format.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("annotation format version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("annotation payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("annotation payload is inconsistent: {0}")]
    Invalid(String),
}

/// Cheap copy of the persistent part of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSnapshot {
    pub page_count: Option<u32>,
    pub next_stroke_id: u64,
    pub pages: BTreeMap<u32, Vec<Arc<Stroke>>>,
}

impl DocumentSnapshot {
    pub fn stroke_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    format_version: u32,
    page_count: Option<u32>,
    next_stroke_id: u64,
    pages: Vec<PageRef<'a>>,
}

#[derive(Serialize)]
struct PageRef<'a> {
    page_index: u32,
    strokes: Vec<&'a Stroke>,
}

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    page_count: Option<u32>,
    #[serde(default)]
    next_stroke_id: u64,
    #[serde(default)]
    pages: Vec<PagePayload>,
}

#[derive(Deserialize)]
struct PagePayload {
    page_index: u32,
    strokes: Vec<Stroke>,
}

#[derive(Deserialize)]
struct VersionHeader {
    format_version: u32,
}

pub fn encode(snapshot: &DocumentSnapshot) -> Result<Vec<u8>, CodecError> {
    let payload = PayloadRef {
        format_version: FORMAT_VERSION,
        page_count: snapshot.page_count,
        next_stroke_id: snapshot.next_stroke_id,
        pages: snapshot
            .pages
            .iter()
            .filter(|(_, strokes)| !strokes.is_empty())
            .map(|(page_index, strokes)| PageRef {
                page_index: *page_index,
                strokes: strokes.iter().map(|s| s.as_ref()).collect(),
            })
            .collect(),
    };
    Ok(serde_json::to_vec(&payload)?)
}

pub fn decode(bytes: &[u8]) -> Result<DocumentSnapshot, CodecError> {
    let header: VersionHeader = serde_json::from_slice(bytes)?;
    if header.format_version > FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: header.format_version,
            supported: FORMAT_VERSION,
        });
    }

    let payload: Payload = serde_json::from_slice(bytes)?;
    let mut pages: PageMap = BTreeMap::new();
    let mut seen = HashSet::new();
    let mut max_id = None;

    for page in payload.pages {
        if let Some(count) = payload.page_count {
            if page.page_index >= count {
                return Err(CodecError::Invalid(format!(
                    "page {} is outside the {} page document",
                    page.page_index, count
                )));
            }
        }
        if pages.contains_key(&page.page_index) {
            return Err(CodecError::Invalid(format!(
                "page {} appears twice",
                page.page_index
            )));
        }
        let mut strokes = Vec::with_capacity(page.strokes.len());
        for stroke in page.strokes {
            if stroke.page_index != page.page_index {
                return Err(CodecError::Invalid(format!(
                    "stroke {} claims page {} but is stored under page {}",
                    stroke.id, stroke.page_index, page.page_index
                )));
            }
            stroke.validate().map_err(CodecError::Invalid)?;
            if !seen.insert(stroke.id) {
                return Err(CodecError::Invalid(format!(
                    "stroke id {} is used twice",
                    stroke.id
                )));
            }
            max_id = max_id.max(Some(stroke.id.0));
            strokes.push(Arc::new(stroke));
        }
        if !strokes.is_empty() {
            pages.insert(page.page_index, strokes);
        }
    }

    let floor = max_id.map_or(1, |id| id.saturating_add(1));
    Ok(DocumentSnapshot {
        page_count: payload.page_count,
        next_stroke_id: payload.next_stroke_id.max(floor),
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{BLUE, Point, PressureCurve, StrokeId, Tool};

    fn stroke(id: u64, page: u32) -> Arc<Stroke> {
        Arc::new(Stroke {
            id: StrokeId(id),
            page_index: page,
            tool: Tool::Fountain,
            color: BLUE.with_alpha(0.3),
            base_width: 2.5,
            curve: PressureCurve::table(vec![(0.0, 0.4), (0.7, 1.1), (1.0, 1.9)]),
            points: vec![
                Point::new(0.1, 0.2, 0.3, 1_000),
                Point::new(1.0 / 3.0, 0.987_654_321, 0.75, 1_016),
            ],
        })
    }

    #[test]
    fn version_is_the_leading_field() {
        let bytes = encode(&DocumentSnapshot::default()).unwrap();
        assert!(bytes.starts_with(b"{\"format_version\":1"));
    }

    #[test]
    fn encode_decode_encode_is_byte_stable() {
        let mut pages = BTreeMap::new();
        pages.insert(0, vec![stroke(1, 0), stroke(4, 0)]);
        pages.insert(7, vec![stroke(2, 7)]);
        let snapshot = DocumentSnapshot {
            page_count: Some(10),
            next_stroke_id: 5,
            pages,
        };
        let bytes = encode(&snapshot).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(encode(&decoded).unwrap(), bytes);
    }

    #[test]
    fn newer_versions_are_rejected() {
        let err = decode(br#"{"format_version": 99, "pages": []}"#).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedVersion {
                found: 99,
                supported: FORMAT_VERSION
            }
        ));
    }

    #[test]
    fn structural_problems_are_reported() {
        assert!(matches!(decode(b"not json"), Err(CodecError::Malformed(_))));

        let mut pages = BTreeMap::new();
        pages.insert(0, vec![stroke(1, 0)]);
        pages.insert(1, vec![stroke(1, 1)]);
        let bytes = encode(&DocumentSnapshot {
            page_count: None,
            next_stroke_id: 2,
            pages,
        })
        .unwrap();
        assert!(matches!(decode(&bytes), Err(CodecError::Invalid(_))));
    }

    #[test]
    fn next_id_never_trails_stored_ids() {
        let mut pages = BTreeMap::new();
        pages.insert(0, vec![stroke(41, 0)]);
        let bytes = encode(&DocumentSnapshot {
            page_count: None,
            next_stroke_id: 3,
            pages,
        })
        .unwrap();
        assert_eq!(decode(&bytes).unwrap().next_stroke_id, 42);
    }
}
