use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

use super::*;

/// Builds a pdf whose page size and resources are only set on the page tree root
pub(crate) fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Courier".to_vec()));
    let font_id = doc.add_object(Object::Dictionary(font));

    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    let resources_id = doc.add_object(Object::Dictionary(resources));

    let mut kids = Vec::new();
    for index in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(24)]),
                Operation::new("Td", vec![Object::Integer(100), Object::Integer(600)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("Page {}", index + 1).into_bytes(),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id =
            doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
    }

    let mut tree = Dictionary::new();
    tree.set("Type", Object::Name(b"Pages".to_vec()));
    tree.set("Count", Object::Integer(pages as i64));
    tree.set("Kids", Object::Array(kids));
    tree.set("Resources", Object::Reference(resources_id));
    tree.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(595),
            Object::Integer(842),
        ]),
    );
    doc.objects.insert(pages_id, Object::Dictionary(tree));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn page_text(bytes: &[u8], page: u32) -> String {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = doc.get_pages()[&page];
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

fn page_rotation(bytes: &[u8], page: u32) -> i64 {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = doc.get_pages()[&page];
    doc.get_dictionary(page_id)
        .unwrap()
        .get(b"Rotate")
        .and_then(Object::as_i64)
        .unwrap_or(0)
}

#[test]
fn counts_pages() {
    assert_eq!(page_count(&sample_pdf(3)).unwrap(), 3);
}

#[test]
fn rejects_garbage() {
    assert!(page_count(b"").unwrap_err().is_client_error());
    assert!(page_count(b"definitely not a pdf").is_err());
}

#[test]
fn merges_in_order() {
    let first = sample_pdf(2);
    let second = sample_pdf(3);

    let merged = merge(&[&first, &second]).unwrap();

    assert_eq!(page_count(&merged).unwrap(), 5);
    assert!(page_text(&merged, 2).contains("(Page 2)"));
    assert!(page_text(&merged, 3).contains("(Page 1)"));
    assert!(page_text(&merged, 5).contains("(Page 3)"));

    let doc = Document::load_mem(&merged).unwrap();
    for page_id in doc.get_pages().into_values() {
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
    }
}

#[test]
fn merge_requires_two_inputs() {
    let only = sample_pdf(1);
    let err = merge(&[&only]).unwrap_err();
    assert!(err.is_client_error());
}

#[test]
fn splits_into_ranges() {
    let source = sample_pdf(4);

    let parts = split(&source, &[PageRange::new(1, 2), PageRange::new(4, 4)]).unwrap();

    assert_eq!(parts.len(), 2);
    assert_eq!(page_count(&parts[0]).unwrap(), 2);
    assert_eq!(page_count(&parts[1]).unwrap(), 1);
    assert!(page_text(&parts[1], 1).contains("(Page 4)"));
}

#[test]
fn splits_every_page() {
    let source = sample_pdf(3);
    let parts = split(&source, &PageRange::every_page(3)).unwrap();
    assert_eq!(parts.len(), 3);
    assert!(page_text(&parts[2], 1).contains("(Page 3)"));
}

#[test]
fn rejects_out_of_bounds_ranges() {
    let source = sample_pdf(2);
    for range in [
        PageRange::new(0, 1),
        PageRange::new(2, 1),
        PageRange::new(1, 3),
    ] {
        let err = split(&source, &[range]).unwrap_err();
        assert!(err.is_client_error(), "{range:?}");
    }
    assert!(split(&source, &[]).is_err());
}

#[test]
fn rotation_accumulates() {
    let source = sample_pdf(2);

    let once = rotate(&source, 90, None).unwrap();
    assert_eq!(page_rotation(&once, 1), 90);
    assert_eq!(page_rotation(&once, 2), 90);

    let twice = rotate(&once, 270, None).unwrap();
    assert_eq!(page_rotation(&twice, 1), 0);

    let negative = rotate(&source, -90, None).unwrap();
    assert_eq!(page_rotation(&negative, 1), 270);
}

#[test]
fn rotates_selected_pages_only() {
    let source = sample_pdf(3);
    let rotated = rotate(&source, 180, Some(&[2][..])).unwrap();
    assert_eq!(page_rotation(&rotated, 1), 0);
    assert_eq!(page_rotation(&rotated, 2), 180);
    assert_eq!(page_rotation(&rotated, 3), 0);
}

#[test]
fn repeated_page_selection_rotates_once() {
    let source = sample_pdf(2);
    let rotated = rotate(&source, 90, Some(&[1, 1, 1][..])).unwrap();
    assert_eq!(page_rotation(&rotated, 1), 90);
    assert_eq!(page_rotation(&rotated, 2), 0);
}

#[test]
fn rejects_invalid_rotation() {
    let source = sample_pdf(1);
    assert!(rotate(&source, 45, None).is_err());
    assert!(rotate(&source, 360, None).is_err());
    assert!(rotate(&source, 90, Some(&[2][..])).is_err());
}

#[test]
fn watermarks_every_page() {
    let source = sample_pdf(2);
    let options = WatermarkOptions {
        text: "CONFIDENTIAL".to_string(),
        ..Default::default()
    };

    let marked = watermark(&source, &options).unwrap();

    assert_eq!(page_count(&marked).unwrap(), 2);
    for page in 1..=2 {
        let text = page_text(&marked, page);
        assert!(text.contains("(CONFIDENTIAL)"));
        assert!(text.contains(&format!("(Page {page})")));
    }
}

#[test]
fn rejects_empty_watermark() {
    let source = sample_pdf(1);
    let err = watermark(&source, &WatermarkOptions::default()).unwrap_err();
    assert!(err.is_client_error());

    let faint = WatermarkOptions {
        text: "DRAFT".to_string(),
        opacity: 0.0,
        ..Default::default()
    };
    assert!(watermark(&source, &faint).is_err());
}

#[test]
fn numbers_pages_with_template() {
    let source = sample_pdf(3);
    let options = PageNumberOptions {
        template: "Page {n} of {total}".to_string(),
        position: PageNumberPosition::TopRight,
        ..Default::default()
    };

    let numbered = add_page_numbers(&source, &options).unwrap();

    assert!(page_text(&numbered, 1).contains("(Page 1 of 3)"));
    assert!(page_text(&numbered, 3).contains("(Page 3 of 3)"));
}

#[test]
fn numbers_pages_from_offset() {
    let source = sample_pdf(2);
    let options = PageNumberOptions {
        start_at: 5,
        ..Default::default()
    };

    let numbered = add_page_numbers(&source, &options).unwrap();

    assert!(page_text(&numbered, 1).contains("(5)"));
    assert!(page_text(&numbered, 2).contains("(6)"));
}

#[test]
fn page_number_template_needs_placeholder() {
    let source = sample_pdf(1);
    let options = PageNumberOptions {
        template: "no number".to_string(),
        ..Default::default()
    };
    assert!(add_page_numbers(&source, &options).is_err());
}

#[test]
fn rejects_out_of_range_page_number_start() {
    let source = sample_pdf(3);
    for start_at in [0, 1_000_001, u32::MAX] {
        let options = PageNumberOptions {
            start_at,
            ..Default::default()
        };
        let err = add_page_numbers(&source, &options).unwrap_err();
        assert!(err.is_client_error(), "{start_at}");
    }

    let options = PageNumberOptions {
        start_at: 1_000_000,
        template: "{n}/{total}".to_string(),
        ..Default::default()
    };
    let numbered = add_page_numbers(&source, &options).unwrap();
    assert!(page_text(&numbered, 3).contains("(1000002/1000002)"));
}
