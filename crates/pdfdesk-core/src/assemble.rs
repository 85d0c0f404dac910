//! Document assembly
//!
//! Builds a new document from a [`PageSelection`] over one or more sources.
//!
//! The algorithm:
//! 1. Create an empty destination with a fresh page tree root
//! 2. For each page in the selection:
//!    a. Import the page's source once, offsetting its object IDs
//!    b. Copy inherited attributes onto the page dictionary
//!    c. Point the page at the new root (a repeated page gets a new object)
//! 3. Write the Pages root and Catalog
//! 4. Prune objects no longer reachable from the trailer, renumber, compress

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, EncryptionState, EncryptionVersion, Object, ObjectId, Permissions};
use tracing::debug;
use uuid::Uuid;

use crate::error::PdfDeskError;
use crate::selection::PageSelection;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Build a new document holding exactly the selected pages, in order
pub fn assemble(sources: &[Document], selection: &PageSelection) -> Result<Document, PdfDeskError> {
    let mut dest = Document::with_version("1.5");
    let pages_id = dest.new_object_id();

    let page_tables: Vec<Vec<ObjectId>> = sources
        .iter()
        .map(|doc| doc.get_pages().into_values().collect())
        .collect();

    let mut offsets: HashMap<usize, u32> = HashMap::new();
    let mut placed: HashSet<ObjectId> = HashSet::new();
    let mut kids = Vec::with_capacity(selection.len());

    for page in selection.iter() {
        let source = sources.get(page.source).ok_or_else(|| {
            PdfDeskError::AssemblyFailed(format!("No source document #{}", page.source))
        })?;
        let old_page_id = *page_tables[page.source].get(page.index).ok_or_else(|| {
            PdfDeskError::AssemblyFailed(format!(
                "Page {} does not exist (document has {} pages)",
                page.index + 1,
                page_tables[page.source].len()
            ))
        })?;

        let offset = match offsets.get(&page.source) {
            Some(&offset) => offset,
            None => {
                let offset = import_objects(&mut dest, source);
                offsets.insert(page.source, offset);
                offset
            }
        };

        let mut page_dict = remap_dict_refs(flatten_page(source, old_page_id)?, offset);
        page_dict.set("Parent", Object::Reference(pages_id));

        let new_page_id = (old_page_id.0 + offset, old_page_id.1);
        let target_id = if placed.insert(new_page_id) {
            dest.objects
                .insert(new_page_id, Object::Dictionary(page_dict));
            new_page_id
        } else {
            dest.add_object(page_dict)
        };
        kids.push(Object::Reference(target_id));
    }

    let count = kids.len();
    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", Object::Integer(count as i64));
    dest.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog_dict = Dictionary::new();
    catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog_dict.set("Pages", Object::Reference(pages_id));
    let catalog_id = dest.add_object(catalog_dict);
    dest.trailer.set("Root", Object::Reference(catalog_id));

    let pruned = dest.prune_objects();
    dest.renumber_objects();
    dest.compress();

    debug!(
        "Assembled {} pages from {} sources ({} unreachable objects dropped)",
        count,
        offsets.len(),
        pruned.len()
    );

    Ok(dest)
}

/// Copy every object of `source` into `dest` with shifted IDs; returns the
/// offset that was applied
fn import_objects(dest: &mut Document, source: &Document) -> u32 {
    let offset = dest.max_id;
    for (old_id, object) in source.objects.iter() {
        let new_id = (old_id.0 + offset, old_id.1);
        dest.objects
            .insert(new_id, remap_object_refs(object.clone(), offset));
    }
    dest.max_id = offset + source.max_id;
    offset
}

/// Page dictionary with inherited attributes materialised from its ancestors
fn flatten_page(source: &Document, page_id: ObjectId) -> Result<Dictionary, PdfDeskError> {
    let mut page = source
        .get_dictionary(page_id)
        .map_err(|e| PdfDeskError::AssemblyFailed(format!("Invalid page object: {}", e)))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut visited = HashSet::new();
    while let Some(parent_id) = parent {
        if !visited.insert(parent_id) {
            break;
        }
        let Ok(node) = source.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(page)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict_refs(dict, offset)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dict_refs(stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict_refs(mut dict: Dictionary, offset: u32) -> Dictionary {
    for (_, value) in dict.iter_mut() {
        *value = remap_object_refs(value.clone(), offset);
    }
    dict
}

/// Encrypt `doc` with the standard security handler (RC4, 128-bit key).
/// The same password opens and owns the document.
pub fn protect(doc: &mut Document, password: &str) -> Result<(), PdfDeskError> {
    encrypt(doc, password, password)
}

/// Encrypt with separate owner and user passwords. An empty user password
/// yields a document any reader can open.
pub(crate) fn encrypt(
    doc: &mut Document,
    owner_password: &str,
    user_password: &str,
) -> Result<(), PdfDeskError> {
    if doc.trailer.get(b"ID").is_err() {
        let id = Uuid::new_v4().as_bytes().to_vec();
        doc.trailer.set(
            "ID",
            Object::Array(vec![
                Object::String(id.clone(), lopdf::StringFormat::Hexadecimal),
                Object::String(id, lopdf::StringFormat::Hexadecimal),
            ]),
        );
    }

    let version = EncryptionVersion::V2 {
        document: &*doc,
        owner_password,
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    };
    let state = EncryptionState::try_from(version)
        .map_err(|e| PdfDeskError::AssemblyFailed(format!("Encryption setup failed: {}", e)))?;

    doc.encrypt(&state)
        .map_err(|e| PdfDeskError::AssemblyFailed(format!("Encryption failed: {}", e)))?;
    Ok(())
}

/// Serialize a document
pub fn to_bytes(doc: &mut Document) -> Result<Vec<u8>, PdfDeskError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfDeskError::AssemblyFailed(format!("Save failed: {}", e)))?;
    Ok(buffer)
}
