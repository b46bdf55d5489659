//! Text drawn on top of existing page content.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::tree::materialize_inherited;
use crate::{ConversionError, Result};

const FONT_RESOURCE: &str = "DvFont";
const GRAPHICS_STATE_RESOURCE: &str = "DvGs";

/// Average Helvetica glyph width as a fraction of the font size
const AVERAGE_GLYPH_WIDTH: f32 = 0.55;

/// Distance between page numbers and the page edge, in points
const PAGE_NUMBER_MARGIN: f32 = 36.0;

/// Largest accepted first page number
const MAX_PAGE_NUMBER_START: u32 = 1_000_000;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct WatermarkOptions {
    pub text: String,
    pub font_size: f32,
    /// 0 is fully transparent, 1 is opaque
    pub opacity: f32,
    /// Counter-clockwise rotation of the text in degrees
    pub angle: f32,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 48.0,
            opacity: 0.3,
            angle: 45.0,
        }
    }
}

impl WatermarkOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        let length = self.text.trim().chars().count();
        if length == 0 || length > 200 {
            return Err(ConversionError::invalid(
                "watermark text must be between 1 and 200 characters",
            ));
        }
        if !(6.0..=200.0).contains(&self.font_size) {
            return Err(ConversionError::invalid(
                "watermark font size must be between 6 and 200",
            ));
        }
        if !(self.opacity > 0.0 && self.opacity <= 1.0) {
            return Err(ConversionError::invalid(
                "watermark opacity must be greater than 0 and at most 1",
            ));
        }
        if !(-360.0..=360.0).contains(&self.angle) {
            return Err(ConversionError::invalid(
                "watermark angle must be between -360 and 360",
            ));
        }
        Ok(())
    }
}

#[derive(
    serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default,
)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PageNumberPosition {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    #[default]
    BottomCenter,
    BottomRight,
}

impl PageNumberPosition {
    fn is_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopCenter | Self::TopRight)
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct PageNumberOptions {
    pub position: PageNumberPosition,
    /// The number printed on the first page
    pub start_at: u32,
    /// `{n}` is replaced with the page number and `{total}` with the last page number
    pub template: String,
    pub font_size: f32,
}

impl Default for PageNumberOptions {
    fn default() -> Self {
        Self {
            position: PageNumberPosition::default(),
            start_at: 1,
            template: "{n}".to_string(),
            font_size: 10.0,
        }
    }
}

impl PageNumberOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(1..=MAX_PAGE_NUMBER_START).contains(&self.start_at) {
            return Err(ConversionError::invalid(format!(
                "page numbers must start between 1 and {MAX_PAGE_NUMBER_START}"
            )));
        }
        if !self.template.contains("{n}") {
            return Err(ConversionError::invalid(
                "page number template must contain {n}",
            ));
        }
        if self.template.chars().count() > 100 {
            return Err(ConversionError::invalid(
                "page number template must be at most 100 characters",
            ));
        }
        if !(6.0..=72.0).contains(&self.font_size) {
            return Err(ConversionError::invalid(
                "page number font size must be between 6 and 72",
            ));
        }
        Ok(())
    }

    fn render(&self, number: u32, total: u32) -> String {
        self.template
            .replace("{n}", &number.to_string())
            .replace("{total}", &total.to_string())
    }
}

pub(crate) fn apply_watermark(doc: &mut Document, options: &WatermarkOptions) -> Result<()> {
    let font_id = doc.add_object(helvetica());
    let state_id = doc.add_object(opacity_state(options.opacity));
    let text = win_ansi(options.text.trim());
    let width = text_width(&text, options.font_size);
    let (sin, cos) = options.angle.to_radians().sin_cos();

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        materialize_inherited(doc, page_id)?;
        let media_box = media_box(doc, page_id)?;
        let (center_x, center_y) = media_box.center();
        let x = center_x - width / 2.0 * cos;
        let y = center_y - width / 2.0 * sin;

        let operations = vec![
            Operation::new(
                "gs",
                vec![Object::Name(GRAPHICS_STATE_RESOURCE.as_bytes().to_vec())],
            ),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                    real(options.font_size),
                ],
            ),
            Operation::new("rg", vec![real(0.5), real(0.5), real(0.5)]),
            Operation::new(
                "Tm",
                vec![real(cos), real(sin), real(-sin), real(cos), real(x), real(y)],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(text.clone(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ];

        draw_over(doc, page_id, operations, font_id, Some(state_id))?;
    }
    Ok(())
}

pub(crate) fn apply_page_numbers(doc: &mut Document, options: &PageNumberOptions) -> Result<()> {
    let font_id = doc.add_object(helvetica());
    let pages = doc.get_pages();
    let total = u32::try_from(pages.len())
        .ok()
        .and_then(|count| options.start_at.checked_add(count - 1))
        .ok_or_else(|| ConversionError::invalid("too many pages to number"))?;

    for (index, page_id) in pages.into_values().enumerate() {
        materialize_inherited(doc, page_id)?;
        let media_box = media_box(doc, page_id)?;
        let text = win_ansi(&options.render(options.start_at + index as u32, total));
        let width = text_width(&text, options.font_size);

        let x = match options.position {
            PageNumberPosition::TopLeft | PageNumberPosition::BottomLeft => {
                media_box.left + PAGE_NUMBER_MARGIN
            }
            PageNumberPosition::TopCenter | PageNumberPosition::BottomCenter => {
                media_box.center().0 - width / 2.0
            }
            PageNumberPosition::TopRight | PageNumberPosition::BottomRight => {
                media_box.right - PAGE_NUMBER_MARGIN - width
            }
        };
        let y = if options.position.is_top() {
            media_box.top - PAGE_NUMBER_MARGIN - options.font_size
        } else {
            media_box.bottom + PAGE_NUMBER_MARGIN
        };

        let operations = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                    real(options.font_size),
                ],
            ),
            Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new("Tj", vec![Object::String(text, StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ];

        draw_over(doc, page_id, operations, font_id, None)?;
    }
    Ok(())
}

/// Wraps the existing page content in a saved graphics state and appends `operations` after it
fn draw_over(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
    font_id: ObjectId,
    state_id: Option<ObjectId>,
) -> Result<()> {
    let (mut resources, existing_contents) = {
        let page = doc.get_dictionary(page_id)?;
        let resources = resolve_dictionary(doc, page.get(b"Resources").ok())?;
        let contents = match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        (resources, contents)
    };

    let mut fonts = resolve_dictionary(doc, resources.get(b"Font").ok())?;
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    if let Some(state_id) = state_id {
        let mut states = resolve_dictionary(doc, resources.get(b"ExtGState").ok())?;
        states.set(GRAPHICS_STATE_RESOURCE, Object::Reference(state_id));
        resources.set("ExtGState", Object::Dictionary(states));
    }

    let mut overlay = Content {
        operations: vec![Operation::new("Q", vec![]), Operation::new("q", vec![])],
    };
    overlay.operations.extend(operations);
    overlay.operations.push(Operation::new("Q", vec![]));

    let prefix_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let suffix_id = doc.add_object(Stream::new(Dictionary::new(), overlay.encode()?));

    let mut contents = Vec::with_capacity(existing_contents.len() + 2);
    contents.push(Object::Reference(prefix_id));
    contents.extend(existing_contents);
    contents.push(Object::Reference(suffix_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

fn resolve_dictionary(doc: &Document, object: Option<&Object>) -> Result<Dictionary> {
    match object {
        Some(Object::Dictionary(dictionary)) => Ok(dictionary.clone()),
        Some(Object::Reference(id)) => Ok(doc.get_dictionary(*id)?.clone()),
        _ => Ok(Dictionary::new()),
    }
}

#[derive(Debug, Clone, Copy)]
struct MediaBox {
    left: f32,
    bottom: f32,
    right: f32,
    top: f32,
}

impl MediaBox {
    fn center(&self) -> (f32, f32) {
        ((self.left + self.right) / 2.0, (self.bottom + self.top) / 2.0)
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> Result<MediaBox> {
    let page = doc.get_dictionary(page_id)?;
    let values = match page.get(b"MediaBox") {
        Ok(Object::Array(values)) => values.clone(),
        Ok(Object::Reference(id)) => doc.get_object(*id)?.as_array()?.clone(),
        _ => return Err(ConversionError::invalid("pdf page has no media box")),
    };

    let numbers: Vec<f32> = values.iter().filter_map(number).collect();
    match numbers.as_slice() {
        [x1, y1, x2, y2] => Ok(MediaBox {
            left: x1.min(*x2),
            bottom: y1.min(*y2),
            right: x1.max(*x2),
            top: y1.max(*y2),
        }),
        _ => Err(ConversionError::invalid("pdf page has a malformed media box")),
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

fn helvetica() -> Object {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    Object::Dictionary(font)
}

fn opacity_state(opacity: f32) -> Object {
    let mut state = Dictionary::new();
    state.set("Type", Object::Name(b"ExtGState".to_vec()));
    state.set("ca", real(opacity));
    state.set("CA", real(opacity));
    Object::Dictionary(state)
}

/// Latin-1 bytes for the standard font encoding; anything outside it becomes `?`
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn text_width(text: &[u8], font_size: f32) -> f32 {
    text.len() as f32 * font_size * AVERAGE_GLYPH_WIDTH
}
