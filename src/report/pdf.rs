//! Minimal page canvas on top of `lopdf`
//!
//! Pages collect content-stream operations; [`write_document`] assembles
//! them into a PDF using the two builtin Helvetica faces. Nothing here reads
//! the clock or generates ids, so output depends only on the inputs.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// A4 portrait in points
pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
pub const MARGIN: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
    pub const GRAY: Rgb = Rgb(0.4, 0.4, 0.4);
    pub const LIGHT_GRAY: Rgb = Rgb(0.94, 0.94, 0.94);
    pub const BLUE: Rgb = Rgb(0.267, 0.447, 0.769);
    pub const GREEN: Rgb = Rgb(0.439, 0.678, 0.278);
    pub const HEADER: Rgb = Rgb(0.173, 0.353, 0.627);
}

/// Operations for one page, in drawing order
#[derive(Debug, Default)]
pub struct Page {
    operations: Vec<Operation>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw `text` with its baseline starting at (x, y)
    pub fn text(&mut self, x: f32, y: f32, size: f32, font: Font, color: Rgb, text: &str) {
        self.set_fill(color);
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.resource_name().into(), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(printable_ascii(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Draw `text` so that it ends at `right`
    pub fn text_right(&mut self, right: f32, y: f32, size: f32, font: Font, color: Rgb, text: &str) {
        let width = text_width(text, size, font);
        self.text(right - width, y, size, font, color, text);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        self.operations.push(Operation::new("q", vec![]));
        self.set_fill(color);
        self.operations.extend([
            Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgb) {
        let Rgb(r, g, b) = color;
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("RG", vec![r.into(), g.into(), b.into()]),
            Operation::new("w", vec![width.into()]),
            Operation::new("m", vec![from.0.into(), from.1.into()]),
            Operation::new("l", vec![to.0.into(), to.1.into()]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn set_fill(&mut self, color: Rgb) {
        let Rgb(r, g, b) = color;
        self.operations
            .push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
    }
}

/// Assemble pages into PDF bytes
pub fn write_document(
    title: &str,
    created_at: DateTime<Utc>,
    pages: Vec<Page>,
) -> Result<Vec<u8>, AppError> {
    if pages.is_empty() {
        return Err(AppError::Render("report has no pages".to_string()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Regular.resource_name() => regular_id,
            Font::Bold.resource_name() => bold_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content {
            operations: page.operations,
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let pdf_date = created_at.format("D:%Y%m%d%H%M%SZ").to_string();
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(printable_ascii(title)),
        "Producer" => Object::string_literal(concat!("smtp2go-usage ", env!("CARGO_PKG_VERSION"))),
        "CreationDate" => Object::string_literal(pdf_date.clone()),
        "ModDate" => Object::string_literal(pdf_date),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Replace anything outside printable ASCII with `?`
pub fn printable_ascii(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

/// Approximate rendered width using Helvetica advance widths (1/1000 em)
pub fn text_width(text: &str, size: f32, font: Font) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            '0'..='9' => 556,
            ',' | '.' | ' ' | '/' | ':' => 278,
            '%' => 889,
            '-' => 333,
            '+' => 584,
            'i' | 'j' | 'l' => 222,
            'f' | 't' | 'I' => 278,
            'm' | 'M' | 'W' => 833,
            'w' => 722,
            c if c.is_ascii_uppercase() => 667,
            _ => 500,
        })
        .sum();
    let bold_factor = if font == Font::Bold { 1.05 } else { 1.0 };
    units as f32 * size / 1000.0 * bold_factor
}
