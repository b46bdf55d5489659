use std::collections::HashSet;
use std::io::{Cursor, Write};

use crate::{ConversionError, Result};

/// The maximum number of files in one archive
pub const MAX_ENTRIES: usize = 100;

/// A file to place into an archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Writes every entry into a flat zip archive.
///
/// Names are reduced to their final path component and repeated names get a ` (n)` suffix
/// before the extension.
#[tracing::instrument(skip_all, fields(entries = entries.len()))]
pub fn bundle(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    if entries.is_empty() {
        return Err(ConversionError::invalid("nothing to bundle"));
    }
    if entries.len() > MAX_ENTRIES {
        return Err(ConversionError::invalid(format!(
            "an archive holds at most {MAX_ENTRIES} files"
        )));
    }

    let mut used = HashSet::new();
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

    for entry in entries {
        let name = unique_name(&sanitize_name(&entry.name), &mut used);
        zip.start_file::<_, ()>(name, zip::write::FileOptions::default())?;
        zip.write_all(&entry.bytes)?;
    }

    let writer = zip.finish()?;
    Ok(writer.into_inner())
}

/// Strips directories and control characters from a file name
pub fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    match cleaned {
        "" | "." | ".." => "file".to_string(),
        name => name.to_string(),
    }
}

fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_lowercase()) {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    };

    let mut counter = 1;
    loop {
        let candidate = format!("{stem} ({counter}){extension}");
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    fn names(bytes: Vec<u8>) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|index| archive.by_index(index).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn bundles_entries() {
        let bytes = bundle(&[
            ArchiveEntry::new("report.pdf", b"%PDF".to_vec()),
            ArchiveEntry::new("notes.txt", b"hello".to_vec()),
        ])
        .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut contents = String::new();
        archive
            .by_name("notes.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hello");
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn deduplicates_names() {
        let bytes = bundle(&[
            ArchiveEntry::new("a.pdf", vec![1]),
            ArchiveEntry::new("a.pdf", vec![2]),
            ArchiveEntry::new("A.pdf", vec![3]),
            ArchiveEntry::new("README", vec![4]),
            ArchiveEntry::new("README", vec![5]),
        ])
        .unwrap();

        assert_eq!(
            names(bytes),
            vec!["a.pdf", "a (1).pdf", "A (2).pdf", "README", "README (1)"]
        );
    }

    #[test]
    fn strips_paths() {
        assert_eq!(sanitize_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_name("C:\\Users\\me\\cv.docx"), "cv.docx");
        assert_eq!(sanitize_name("folder/"), "file");
        assert_eq!(sanitize_name("bad\nname.txt"), "badname.txt");
    }

    #[test]
    fn rejects_empty_bundle() {
        assert!(bundle(&[]).unwrap_err().is_client_error());
    }
}
