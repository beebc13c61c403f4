//! Embedded-image detection using lopdf.
//!
//! Walks page → /Resources (inherited through /Parent if absent) →
//! /XObject and looks for /Subtype /Image streams, descending into Form
//! XObjects a few levels deep.

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::types::PageInspector;
use super::FigureError;

/// Maximum Form XObject nesting followed when looking for images.
const MAX_FORM_DEPTH: usize = 4;

/// Maximum /Parent hops when resolving inherited page resources.
const MAX_INHERITANCE_DEPTH: usize = 16;

/// lopdf-based page inspector.
pub struct LopdfPageInspector;

impl PageInspector for LopdfPageInspector {
    fn pages_with_images(&self, pdf_bytes: &[u8]) -> Result<Vec<bool>, FigureError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| FigureError::DocumentOpen(e.to_string()))?;

        // get_pages() is keyed by 1-based page number, so iteration is in page order.
        let flags: Vec<bool> = doc
            .get_pages()
            .values()
            .map(|&page_id| page_has_image(&doc, page_id))
            .collect();

        tracing::debug!(
            pages = flags.len(),
            with_images = flags.iter().filter(|f| **f).count(),
            "Inspected PDF pages for embedded images"
        );

        Ok(flags)
    }
}

fn page_has_image(doc: &Document, page_id: ObjectId) -> bool {
    page_resources(doc, page_id).is_some_and(|res| resources_have_image(doc, res, 0))
}

/// Follow a reference to the underlying object.
fn resolve_object<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Get a dictionary entry, following references, as a Dictionary.
fn resolve_dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    let obj = dict.get(key).ok()?;
    resolve_object(doc, obj).as_dict().ok()
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Some(resources) = resolve_dict_entry(doc, node, b"Resources") {
            return Some(resources);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

/// Check if a stream dictionary has the given /Subtype name.
fn has_subtype(dict: &Dictionary, subtype: &[u8]) -> bool {
    dict.get(b"Subtype")
        .map(|obj| matches!(obj, Object::Name(ref n) if n == subtype))
        .unwrap_or(false)
}

fn resources_have_image(doc: &Document, resources: &Dictionary, depth: usize) -> bool {
    let Some(xobjects) = resolve_dict_entry(doc, resources, b"XObject") else {
        return false;
    };

    for (_name, obj_ref) in xobjects.iter() {
        let Object::Stream(stream) = resolve_object(doc, obj_ref) else {
            continue;
        };

        if has_subtype(&stream.dict, b"Image") {
            return true;
        }

        if depth < MAX_FORM_DEPTH && has_subtype(&stream.dict, b"Form") {
            if let Some(form_resources) = resolve_dict_entry(doc, &stream.dict, b"Resources") {
                if resources_have_image(doc, form_resources, depth + 1) {
                    return true;
                }
            }
        }
    }
    false
}
