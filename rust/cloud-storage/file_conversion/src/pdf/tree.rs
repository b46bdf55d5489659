//! Page tree surgery shared by merge and split.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::{ConversionError, Result};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards against malformed trees whose Parent links loop
const MAX_TREE_DEPTH: usize = 64;

/// Copies inherited attributes onto the page itself so the page can be re-parented
pub(crate) fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let mut inherited: Vec<(Vec<u8>, Object)> = Vec::new();

    {
        let page = doc.get_dictionary(page_id)?;
        let mut remaining: Vec<&[u8]> = INHERITABLE
            .iter()
            .copied()
            .filter(|key| !page.has(key))
            .collect();
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;

        while let Some(parent_id) = parent {
            if remaining.is_empty() || depth >= MAX_TREE_DEPTH {
                break;
            }
            let node = doc.get_dictionary(parent_id)?;
            remaining.retain(|key| match node.get(key) {
                Ok(value) => {
                    inherited.push((key.to_vec(), value.clone()));
                    false
                }
                Err(_) => true,
            });
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            depth += 1;
        }
    }

    if inherited.is_empty() {
        return Ok(());
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}

/// Builds a new document out of the selected pages (1-based page numbers) of each source, in order
pub(crate) fn assemble(sources: Vec<(Document, Vec<u32>)>) -> Result<Document> {
    let mut assembled = Document::with_version("1.7");
    let pages_id = assembled.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for (mut doc, selection) in sources {
        doc.renumber_objects_with(assembled.max_id + 1);

        let page_numbers = doc.get_pages();
        let selected = selection
            .iter()
            .map(|number| {
                page_numbers.get(number).copied().ok_or_else(|| {
                    ConversionError::invalid(format!(
                        "page {number} is outside of 1-{}",
                        page_numbers.len()
                    ))
                })
            })
            .collect::<Result<Vec<ObjectId>>>()?;

        for page_id in &selected {
            materialize_inherited(&mut doc, *page_id)?;
        }

        let all_pages: Vec<ObjectId> = page_numbers.into_values().collect();
        assembled.max_id = assembled.max_id.max(doc.max_id);

        for (object_id, object) in doc.objects {
            let skip = match object.type_name().unwrap_or("") {
                "Catalog" | "Pages" | "Outlines" | "Outline" => true,
                "Page" => !selected.contains(&object_id) && all_pages.contains(&object_id),
                _ => false,
            };
            if !skip {
                assembled.objects.insert(object_id, object);
            }
        }

        for page_id in selected {
            let page = assembled.get_object_mut(page_id)?.as_dict_mut()?;
            page.set("Parent", Object::Reference(pages_id));
            kids.push(Object::Reference(page_id));
        }
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    assembled.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = assembled.add_object(Object::Dictionary(catalog));
    assembled.trailer.set("Root", Object::Reference(catalog_id));

    assembled.prune_objects();
    assembled.renumber_objects();

    Ok(assembled)
}
