//! Merge label PDFs into one document.
//!
//! Each input is renumbered into a shared object space. Its page objects are
//! re-parented under a fresh page tree, and its old catalog and page-tree nodes
//! are dropped. Pages keep input order, and within an input, document order.

use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;

/// Attributes a page may inherit from its page-tree ancestors.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed (cyclic) page trees.
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum PdfMergeError {
    #[error("nothing to merge")]
    Empty,

    #[error("document #{index} is not a readable PDF: {reason}")]
    Unreadable { index: usize, reason: String },

    #[error("document #{index} has no pages")]
    NoPages { index: usize },

    #[error("failed to write merged document: {0}")]
    Write(String),
}

/// Merge `documents` in order into a single PDF.
pub fn merge_pdfs<B: AsRef<[u8]>>(documents: &[B]) -> Result<Vec<u8>, PdfMergeError> {
    if documents.is_empty() {
        return Err(PdfMergeError::Empty);
    }

    let mut merged = Document::with_version("1.5");
    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();

    for (index, bytes) in documents.iter().enumerate() {
        let unreadable = |reason: String| PdfMergeError::Unreadable { index, reason };

        let mut doc = Document::load_mem(bytes.as_ref()).map_err(|e| unreadable(e.to_string()))?;
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(PdfMergeError::NoPages { index });
        }

        for page_id in page_ids {
            let mut page = doc
                .get_object(page_id)
                .and_then(Object::as_dict)
                .map_err(|e| unreadable(e.to_string()))?
                .clone();
            for key in INHERITABLE {
                if !page.has(key) {
                    if let Some(value) = inherited_attribute(&doc, &page, key) {
                        page.set(key, value);
                    }
                }
            }
            pages.push((page_id, page));
        }

        for (id, object) in doc.objects {
            if !is_structural(&object) {
                merged.objects.insert(id, object);
            }
        }
    }

    merged.max_id = next_id;
    let pages_id = merged.new_object_id();
    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let count = kids.len() as i64;

    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        merged.objects.insert(id, Object::Dictionary(page));
    }

    let mut tree = Dictionary::new();
    tree.set("Type", Object::Name(b"Pages".to_vec()));
    tree.set("Kids", Object::Array(kids));
    tree.set("Count", Object::Integer(count));
    merged.objects.insert(pages_id, Object::Dictionary(tree));

    let catalog_id = merged.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", pages_id);
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged.trailer.set("Root", catalog_id);

    merged.renumber_objects();
    merged.compress();

    let mut out = Vec::new();
    merged
        .save_to(&mut out)
        .map_err(|e| PdfMergeError::Write(e.to_string()))?;
    Ok(out)
}

/// Number of pages in a PDF.
pub fn page_count(bytes: &[u8]) -> Result<usize, PdfMergeError> {
    Document::load_mem(bytes)
        .map(|doc| doc.get_pages().len())
        .map_err(|e| PdfMergeError::Unreadable {
            index: 0,
            reason: e.to_string(),
        })
}

/// Catalog, page-tree and outline nodes are rebuilt (or dropped) by the merge.
fn is_structural(object: &Object) -> bool {
    let Ok(dict) = object.as_dict() else {
        return false;
    };
    matches!(
        dict.get(b"Type").and_then(Object::as_name),
        Ok(b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline")
    )
}

fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_object(parent?).and_then(Object::as_dict).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    /// One A4 page printing `text`; resources and media box live on the page
    /// tree so merging must carry them down to the page.
    pub(crate) fn one_page_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn merges_pages_in_input_order() {
        let merged = merge_pdfs(&[one_page_pdf("A"), one_page_pdf("B"), one_page_pdf("C")]).unwrap();
        assert_eq!(page_count(&merged).unwrap(), 3);

        let doc = Document::load_mem(&merged).unwrap();
        for page_id in doc.get_pages().into_values() {
            let page = doc.get_object(page_id).and_then(Object::as_dict).unwrap();
            assert!(page.has(b"MediaBox"));
            assert!(page.has(b"Resources"));
        }
    }

    #[test]
    fn single_document_round_trips() {
        let merged = merge_pdfs(&[one_page_pdf("only")]).unwrap();
        assert_eq!(page_count(&merged).unwrap(), 1);
    }

    #[test]
    fn unreadable_input_is_reported_by_position() {
        let err = merge_pdfs(&[one_page_pdf("A"), b"not a pdf".to_vec()]).unwrap_err();
        assert!(matches!(err, PdfMergeError::Unreadable { index: 1, .. }));
    }

    #[test]
    fn empty_input_is_rejected() {
        let none: [Vec<u8>; 0] = [];
        assert!(matches!(merge_pdfs(&none), Err(PdfMergeError::Empty)));
    }
}
