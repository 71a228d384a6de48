//! PDF document library backed by `lopdf`.
//!
//! Copied pages are imported into a fresh document with their full object
//! graph (content streams, fonts, images). Objects shared by several pages of
//! the same source are imported once per written document. Attributes a page
//! inherits from its page tree (`Resources`, `MediaBox`, `CropBox`, `Rotate`)
//! are materialised on the page, since the source tree is not carried over.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use packslip_core::{DocumentLibrary, Error, Result};

/// Page attributes inherited through the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// PDF version of written documents.
const PDF_VERSION: &str = "1.5";

/// [`DocumentLibrary`] for PDF files.
#[derive(Debug, Clone, Default)]
pub struct LopdfLibrary;

impl LopdfLibrary {
    pub fn new() -> Self {
        Self
    }
}

/// An opened PDF with its pages in document order.
pub struct PdfSource {
    doc: Arc<Document>,
    pages: Vec<ObjectId>,
}

/// A page selected for copying. Keeps its source document alive until written.
pub struct PdfPage {
    doc: Arc<Document>,
    page_id: ObjectId,
}

impl DocumentLibrary for LopdfLibrary {
    type Source = PdfSource;
    type Page = PdfPage;

    fn extension(&self) -> &str {
        "pdf"
    }

    fn open(&self, path: &Path) -> Result<Self::Source> {
        let doc = Document::load(path)
            .map_err(|e| Error::Document(format!("Failed to load {}: {}", path.display(), e)))?;
        let pages = doc.get_pages().into_values().collect();
        Ok(PdfSource {
            doc: Arc::new(doc),
            pages,
        })
    }

    fn page_count(&self, source: &Self::Source) -> usize {
        source.pages.len()
    }

    fn extract_text(&self, source: &Self::Source, page_index: usize) -> Result<String> {
        if page_index >= source.pages.len() {
            return Err(Error::Document(format!("Page {} out of range", page_index)));
        }
        // get_pages() numbers pages from 1
        let page_number = page_index as u32 + 1;
        source
            .doc
            .extract_text(&[page_number])
            .map_err(|e| Error::Document(format!("Text extraction failed on page {}: {}", page_index, e)))
    }

    fn copy_page(&self, source: &Self::Source, page_index: usize) -> Result<Self::Page> {
        let page_id = *source
            .pages
            .get(page_index)
            .ok_or_else(|| Error::Document(format!("Page {} out of range", page_index)))?;
        source
            .doc
            .get_dictionary(page_id)
            .map_err(|e| Error::Document(format!("Page {} is unreadable: {}", page_index, e)))?;
        Ok(PdfPage {
            doc: source.doc.clone(),
            page_id,
        })
    }

    fn write(&self, pages: Vec<Self::Page>, dest: &Path) -> Result<()> {
        if pages.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Refusing to write {} without pages",
                dest.display()
            )));
        }
        let mut assembler = Assembler::new();
        for page in &pages {
            assembler.import_page(page)?;
        }
        assembler.save(dest)
    }
}

/// Builds a new document from pages of one or more sources.
struct Assembler {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    // Source document address -> (source id -> imported id)
    remaps: HashMap<usize, HashMap<ObjectId, ObjectId>>,
}

impl Assembler {
    fn new() -> Self {
        let mut doc = Document::with_version(PDF_VERSION);
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            remaps: HashMap::new(),
        }
    }

    fn import_page(&mut self, page: &PdfPage) -> Result<()> {
        let src = page.doc.as_ref();
        let mut dict = src
            .get_dictionary(page.page_id)
            .map_err(|e| Error::Document(format!("Page object unreadable: {}", e)))?
            .clone();

        for key in INHERITABLE {
            if !dict.has(key) {
                if let Some(value) = inherited_attribute(src, &dict, key) {
                    dict.set(key.to_vec(), value);
                }
            }
        }
        dict.remove(b"Parent");

        let source_key = Arc::as_ptr(&page.doc) as usize;
        let remap = self.remaps.entry(source_key).or_default();
        let mut imported = import_dictionary(&mut self.doc, src, &dict, remap);
        imported.set("Parent", Object::Reference(self.pages_id));

        let id = self.doc.add_object(Object::Dictionary(imported));
        self.kids.push(Object::Reference(id));
        Ok(())
    }

    fn save(mut self, dest: &Path) -> Result<()> {
        let count = self.kids.len() as i64;

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(self.kids));
        pages.set("Count", Object::Integer(count));
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.doc.add_object(Object::Dictionary(catalog));
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        self.doc.compress();
        self.doc
            .save(dest)
            .map_err(|e| Error::Document(format!("Failed to write {}: {}", dest.display(), e)))?;
        debug!(path = %dest.display(), page_count = count, "Wrote PDF");
        Ok(())
    }
}

/// Walk up the page tree looking for `key`.
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(id) = parent {
        if depth >= MAX_TREE_DEPTH {
            return None;
        }
        let node = doc.get_dictionary(id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    None
}

fn is_page_tree_node(dict: &Dictionary) -> bool {
    dict.get(b"Type")
        .and_then(Object::as_name)
        .map(|name| name == b"Page" || name == b"Pages")
        .unwrap_or(false)
}

fn import_dictionary(
    dest: &mut Document,
    src: &Document,
    dict: &Dictionary,
    remap: &mut HashMap<ObjectId, ObjectId>,
) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        out.set(key.clone(), import_object(dest, src, value, remap));
    }
    out
}

fn import_object(
    dest: &mut Document,
    src: &Document,
    object: &Object,
    remap: &mut HashMap<ObjectId, ObjectId>,
) -> Object {
    match object {
        Object::Reference(id) => Object::Reference(import_reference(dest, src, *id, remap)),
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| import_object(dest, src, item, remap))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(import_dictionary(dest, src, dict, remap)),
        Object::Stream(stream) => {
            let mut copy = stream.clone();
            copy.dict = import_dictionary(dest, src, &stream.dict, remap);
            Object::Stream(copy)
        }
        other => other.clone(),
    }
}

fn import_reference(
    dest: &mut Document,
    src: &Document,
    id: ObjectId,
    remap: &mut HashMap<ObjectId, ObjectId>,
) -> ObjectId {
    if let Some(&new_id) = remap.get(&id) {
        return new_id;
    }
    // Reserve before recursing so reference cycles terminate.
    let new_id = dest.new_object_id();
    remap.insert(id, new_id);

    let copied = match src.get_object(id) {
        // Links to other pages would drag the whole source tree along.
        Ok(Object::Dictionary(dict)) if is_page_tree_node(dict) => Object::Null,
        Ok(object) => import_object(dest, src, object, remap),
        Err(_) => Object::Null,
    };
    dest.objects.insert(new_id, copied);
    new_id
}
