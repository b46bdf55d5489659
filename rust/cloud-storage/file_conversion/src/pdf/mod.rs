//! PDF page operations built on [lopdf].
//!
//! Pages are addressed with 1-based page numbers throughout.

mod overlay;
mod tree;

#[cfg(test)]
mod test;

use std::collections::BTreeSet;

use lopdf::{Document, Object};

use crate::{ConversionError, Result};

pub use overlay::{PageNumberOptions, PageNumberPosition, WatermarkOptions};

/// An inclusive, 1-based range of pages
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct PageRange {
    /// First page of the range
    pub start: u32,
    /// Last page of the range, inclusive
    pub end: u32,
}

impl PageRange {
    /// Creates a new range
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// One single-page range for every page of a document with `page_count` pages
    pub fn every_page(page_count: u32) -> Vec<PageRange> {
        (1..=page_count).map(|page| PageRange::new(page, page)).collect()
    }

    fn validate(&self, page_count: u32) -> Result<()> {
        if self.start == 0 || self.end < self.start || self.end > page_count {
            return Err(ConversionError::invalid(format!(
                "page range {}-{} is outside of 1-{}",
                self.start, self.end, page_count
            )));
        }
        Ok(())
    }

    fn pages(&self) -> Vec<u32> {
        (self.start..=self.end).collect()
    }
}

/// The maximum number of documents accepted by [merge]
pub const MAX_MERGE_INPUTS: usize = 50;

/// Returns the number of pages in the document
pub fn page_count(bytes: &[u8]) -> Result<u32> {
    let doc = load(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// Concatenates the pages of every input, in order, into a new document
#[tracing::instrument(skip_all, fields(inputs = inputs.len()))]
pub fn merge(inputs: &[&[u8]]) -> Result<Vec<u8>> {
    if inputs.len() < 2 {
        return Err(ConversionError::invalid("merge requires at least two pdfs"));
    }
    if inputs.len() > MAX_MERGE_INPUTS {
        return Err(ConversionError::invalid(format!(
            "merge accepts at most {MAX_MERGE_INPUTS} pdfs"
        )));
    }

    let sources = inputs
        .iter()
        .map(|bytes| {
            let doc = load(bytes)?;
            let pages = (1..=doc.get_pages().len() as u32).collect();
            Ok((doc, pages))
        })
        .collect::<Result<Vec<_>>>()?;

    let merged = tree::assemble(sources)?;
    tracing::debug!(pages = merged.get_pages().len(), "merged pdfs");
    save(merged)
}

/// Produces one document per requested range
#[tracing::instrument(skip(bytes))]
pub fn split(bytes: &[u8], ranges: &[PageRange]) -> Result<Vec<Vec<u8>>> {
    if ranges.is_empty() {
        return Err(ConversionError::invalid("at least one page range is required"));
    }

    let page_count = page_count(bytes)?;
    for range in ranges {
        range.validate(page_count)?;
    }

    ranges
        .iter()
        .map(|range| {
            let doc = load(bytes)?;
            save(tree::assemble(vec![(doc, range.pages())])?)
        })
        .collect()
}

/// Rotates pages clockwise by `degrees`, which must be a multiple of 90.
/// The rotation is added to any rotation the page already has.
/// When `pages` is `None` every page is rotated.
#[tracing::instrument(skip(bytes))]
pub fn rotate(bytes: &[u8], degrees: i32, pages: Option<&[u32]>) -> Result<Vec<u8>> {
    let delta = normalize_rotation(degrees)?;
    let mut doc = load(bytes)?;
    let targets = select_pages(&doc, pages)?;

    for page_id in targets {
        tree::materialize_inherited(&mut doc, page_id)?;
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        let current = page.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
        page.set("Rotate", Object::Integer((current + delta).rem_euclid(360)));
    }

    save(doc)
}

/// Stamps `options.text` across the centre of every page
#[tracing::instrument(skip(bytes))]
pub fn watermark(bytes: &[u8], options: &WatermarkOptions) -> Result<Vec<u8>> {
    options.validate()?;
    let mut doc = load(bytes)?;
    overlay::apply_watermark(&mut doc, options)?;
    save(doc)
}

/// Writes a page number onto every page
#[tracing::instrument(skip(bytes))]
pub fn add_page_numbers(bytes: &[u8], options: &PageNumberOptions) -> Result<Vec<u8>> {
    options.validate()?;
    let mut doc = load(bytes)?;
    overlay::apply_page_numbers(&mut doc, options)?;
    save(doc)
}

fn normalize_rotation(degrees: i32) -> Result<i64> {
    let degrees = i64::from(degrees);
    if degrees % 90 != 0 || degrees.rem_euclid(360) == 0 {
        return Err(ConversionError::invalid(format!(
            "rotation must be 90, 180 or 270 degrees, got {degrees}"
        )));
    }
    Ok(degrees.rem_euclid(360))
}

fn select_pages(doc: &Document, pages: Option<&[u32]>) -> Result<Vec<lopdf::ObjectId>> {
    let all = doc.get_pages();
    match pages {
        None => Ok(all.into_values().collect()),
        Some([]) => Err(ConversionError::invalid("page selection must not be empty")),
        Some(pages) => pages
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|page| {
                all.get(page).copied().ok_or_else(|| {
                    ConversionError::invalid(format!(
                        "page {page} is outside of 1-{}",
                        all.len()
                    ))
                })
            })
            .collect(),
    }
}

pub(crate) fn load(bytes: &[u8]) -> Result<Document> {
    if bytes.is_empty() {
        return Err(ConversionError::invalid("pdf is empty"));
    }
    let doc = Document::load_mem(bytes)?;
    if doc.trailer.has(b"Encrypt") {
        return Err(ConversionError::invalid("encrypted pdfs are not supported"));
    }
    if doc.get_pages().is_empty() {
        return Err(ConversionError::invalid("pdf has no pages"));
    }
    Ok(doc)
}

pub(crate) fn save(mut doc: Document) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}
