//! Last-page geometry extraction.
//!
//! Reads a PDF with lopdf and reports the last page's dimensions together
//! with the anchor points of text-showing operations on that page. The
//! anchors feed the occupancy probe in [`crate::placement`]; only the text
//! origin is recorded, never glyph extents.

use std::path::Path;

use lopdf::content::Content;
use lopdf::{Document, ObjectId};

use crate::error::SignError;

/// Dimensions of a single page, derived read-only from a parsed PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    /// 0-based index of the page within the document.
    pub page_index: usize,
}

/// Origin point of one text-showing operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextAnchor {
    pub x: f64,
    pub y: f64,
}

/// Geometry and text occupancy of a document's last page.
#[derive(Debug, Clone)]
pub struct LastPage {
    pub geometry: PageGeometry,
    pub anchors: Vec<TextAnchor>,
}

/// Read the last page of the PDF at `path`.
///
/// Fails with [`SignError::DocumentRead`] when the file cannot be parsed
/// as a PDF or contains zero pages. Content-stream oddities do not fail
/// the read; they only reduce the anchor set.
pub fn read_last_page(path: &Path) -> Result<LastPage, SignError> {
    let doc = Document::load(path)
        .map_err(|e| SignError::DocumentRead(format!("{}: {e}", path.display())))?;
    read_last_page_of(&doc)
}

/// In-memory variant of [`read_last_page`].
pub fn read_last_page_mem(bytes: &[u8]) -> Result<LastPage, SignError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| SignError::DocumentRead(format!("failed to parse PDF: {e}")))?;
    read_last_page_of(&doc)
}

fn read_last_page_of(doc: &Document) -> Result<LastPage, SignError> {
    // get_pages returns a BTreeMap keyed by 1-based page number, so the
    // last entry is the last page.
    let pages = doc.get_pages();
    let (&page_number, &page_id) = pages
        .iter()
        .next_back()
        .ok_or_else(|| SignError::DocumentRead("document has no pages".to_string()))?;

    let (width, height) = page_box(doc, page_id)?;
    let geometry = PageGeometry {
        width,
        height,
        page_index: page_number as usize - 1,
    };

    let anchors = match text_anchors(doc, page_id) {
        Ok(anchors) => anchors,
        Err(e) => {
            tracing::debug!("could not extract text anchors: {e}");
            Vec::new()
        }
    };

    Ok(LastPage { geometry, anchors })
}

/// Resolve the page box, normalizing across the historical names: the
/// inherited /MediaBox is preferred, /CropBox is accepted when no MediaBox
/// exists anywhere in the page tree.
fn page_box(doc: &Document, page_id: ObjectId) -> Result<(f64, f64), SignError> {
    let obj = match resolve_inherited(doc, page_id, b"MediaBox")? {
        Some(obj) => obj,
        None => resolve_inherited(doc, page_id, b"CropBox")?.ok_or_else(|| {
            SignError::DocumentRead("no MediaBox or CropBox on page or ancestors".to_string())
        })?,
    };

    let array = obj
        .as_array()
        .map_err(|e| SignError::DocumentRead(format!("page box is not an array: {e}")))?;
    if array.len() != 4 {
        return Err(SignError::DocumentRead(format!(
            "expected 4-element page box, got {}",
            array.len()
        )));
    }

    let x0 = object_to_f64(&array[0])?;
    let y0 = object_to_f64(&array[1])?;
    let x1 = object_to_f64(&array[2])?;
    let y1 = object_to_f64(&array[3])?;
    Ok(((x1 - x0).abs(), (y1 - y0).abs()))
}

/// Page trees in the wild are shallow; anything deeper than this is a
/// malformed document, most likely a /Parent cycle.
const MAX_PARENT_DEPTH: usize = 64;

/// Look up a key in the page dictionary, walking up the page tree via
/// /Parent when the key is not present on the page itself. The walk is
/// bounded so a cyclic /Parent chain cannot hang the read.
fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a lopdf::Object>, SignError> {
    let mut current_id = page_id;
    for _ in 0..MAX_PARENT_DEPTH {
        let dict = doc
            .get_object(current_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| SignError::DocumentRead(format!("failed to get page dictionary: {e}")))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }

        match dict.get(b"Parent") {
            Ok(parent) => {
                current_id = parent.as_reference().map_err(|e| {
                    SignError::DocumentRead(format!("invalid /Parent reference: {e}"))
                })?;
            }
            Err(_) => return Ok(None),
        }
    }
    Err(SignError::DocumentRead(
        "page tree /Parent chain too deep or cyclic".to_string(),
    ))
}

fn object_to_f64(obj: &lopdf::Object) -> Result<f64, SignError> {
    match obj {
        lopdf::Object::Integer(i) => Ok(*i as f64),
        lopdf::Object::Real(f) => Ok(*f as f64),
        _ => Err(SignError::DocumentRead(format!(
            "expected number, got {obj:?}"
        ))),
    }
}

fn operand_f64(obj: &lopdf::Object) -> Option<f64> {
    match obj {
        lopdf::Object::Integer(i) => Some(*i as f64),
        lopdf::Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// Collect the content stream bytes of a page, decompressing filtered
/// streams and concatenating /Contents arrays.
fn page_content_bytes(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>, SignError> {
    let dict = doc
        .get_object(page_id)
        .and_then(|o| o.as_dict())
        .map_err(|e| SignError::DocumentRead(format!("failed to get page dictionary: {e}")))?;

    let contents = match dict.get(b"Contents") {
        Ok(obj) => obj,
        Err(_) => return Ok(Vec::new()), // page with no content
    };

    match contents {
        lopdf::Object::Reference(id) => stream_bytes(doc, *id),
        lopdf::Object::Array(items) => {
            let mut combined = Vec::new();
            for item in items {
                let id = item.as_reference().map_err(|e| {
                    SignError::DocumentRead(format!("/Contents item is not a reference: {e}"))
                })?;
                let bytes = stream_bytes(doc, id)?;
                if !combined.is_empty() {
                    combined.push(b' ');
                }
                combined.extend_from_slice(&bytes);
            }
            Ok(combined)
        }
        _ => Err(SignError::DocumentRead(
            "/Contents is not a reference or array".to_string(),
        )),
    }
}

fn stream_bytes(doc: &Document, id: ObjectId) -> Result<Vec<u8>, SignError> {
    let stream = doc
        .get_object(id)
        .and_then(|o| o.as_stream())
        .map_err(|e| SignError::DocumentRead(format!("/Contents is not a stream: {e}")))?;
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| SignError::DocumentRead(format!("failed to decompress content: {e}")))
    } else {
        Ok(stream.content.clone())
    }
}

/// Walk the page's text operators and record the current text position at
/// each showing operator.
///
/// The state machine is deliberately minimal: BT resets the position, Tm
/// sets it absolutely, Td/TD translate it, TL/T* handle line advances.
/// General text-matrix rotation/scaling is ignored; for occupancy testing
/// the translation components are what matter.
fn text_anchors(doc: &Document, page_id: ObjectId) -> Result<Vec<TextAnchor>, SignError> {
    let bytes = page_content_bytes(doc, page_id)?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let content = Content::decode(&bytes)
        .map_err(|e| SignError::DocumentRead(format!("failed to decode content stream: {e}")))?;

    let mut anchors = Vec::new();
    let mut line = (0.0f64, 0.0f64);
    let mut leading = 0.0f64;

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => {
                line = (0.0, 0.0);
                leading = 0.0;
            }
            "Tm" => {
                if operands.len() == 6 {
                    if let (Some(e), Some(f)) = (operand_f64(&operands[4]), operand_f64(&operands[5]))
                    {
                        line = (e, f);
                    }
                }
            }
            "Td" => {
                if operands.len() == 2 {
                    if let (Some(tx), Some(ty)) =
                        (operand_f64(&operands[0]), operand_f64(&operands[1]))
                    {
                        line = (line.0 + tx, line.1 + ty);
                    }
                }
            }
            "TD" => {
                // Like Td, but also sets the leading to -ty.
                if operands.len() == 2 {
                    if let (Some(tx), Some(ty)) =
                        (operand_f64(&operands[0]), operand_f64(&operands[1]))
                    {
                        leading = -ty;
                        line = (line.0 + tx, line.1 + ty);
                    }
                }
            }
            "TL" => {
                if let Some(tl) = operands.first().and_then(operand_f64) {
                    leading = tl;
                }
            }
            "T*" => {
                line = (line.0, line.1 - leading);
            }
            "Tj" | "TJ" => {
                anchors.push(TextAnchor {
                    x: line.0,
                    y: line.1,
                });
            }
            "'" | "\"" => {
                // Both imply a T* before showing.
                line = (line.0, line.1 - leading);
                anchors.push(TextAnchor {
                    x: line.0,
                    y: line.1,
                });
            }
            _ => {}
        }
    }

    Ok(anchors)
}
