//! PDF writer for text-only documents.
//!
//! Pages hold positioned text runs in one of the two standard Type1 fonts,
//! so no font program is embedded and every viewer can display the result.
//! Coordinates passed to [`PdfBuilder::text`] are measured from the top-left
//! corner, as in the layouts below; the builder flips them to PDF space.

use crate::error::StrategyError;
use crate::pipeline::text::{normalise_text, split_pages, wrap_line};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// US Letter in points.
pub const LETTER: (f32, f32) = (612.0, 792.0);

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_EM: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Helvetica,
    TimesRoman,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::TimesRoman => "F2",
        }
    }
}

/// Approximate rendered width of `text` at `size` points.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * GLYPH_WIDTH_EM
}

/// How many characters fit in `width` points at `size`.
pub fn chars_per_line(width: f32, size: f32) -> usize {
    ((width / (size * GLYPH_WIDTH_EM)).floor() as usize).max(1)
}

/// Encode text for a WinAnsiEncoding font. Unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|c| !c.is_control())
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => match c {
                '€' => 0x80,
                '‚' => 0x82,
                '„' => 0x84,
                '…' => 0x85,
                '‰' => 0x89,
                '‘' => 0x91,
                '’' => 0x92,
                '“' => 0x93,
                '”' => 0x94,
                '•' => 0x95,
                '–' => 0x96,
                '—' => 0x97,
                '™' => 0x99,
                _ => b'?',
            },
        })
        .collect()
}

/// Accumulates pages of positioned text, then serialises them.
pub struct PdfBuilder {
    width: f32,
    height: f32,
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
}

impl PdfBuilder {
    pub fn new((width, height): (f32, f32)) -> Self {
        Self {
            width,
            height,
            pages: Vec::new(),
            current: Vec::new(),
        }
    }

    pub fn page_height(&self) -> f32 {
        self.height
    }

    /// Place one line of text with its top edge at `top` points from the top.
    pub fn text(&mut self, font: Font, size: f32, x: f32, top: f32, text: &str) {
        let baseline = self.height - top - size;
        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.resource_name().into(), Object::Real(size)]),
            Operation::new("Td", vec![Object::Real(x), Object::Real(baseline)]),
            Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Place `text` horizontally centred between `margin` and the right edge.
    pub fn centered(&mut self, font: Font, size: f32, margin: f32, top: f32, text: &str) {
        let x = ((self.width - text_width(text, size)) / 2.0).max(margin);
        self.text(font, size, x, top, text);
    }

    pub fn new_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
    }

    /// Serialise every page, including the current one even if it is empty.
    pub fn finish(mut self) -> Result<Vec<u8>, StrategyError> {
        self.new_page();

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let helvetica = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let times = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                Font::Helvetica.resource_name() => helvetica,
                Font::TimesRoman.resource_name() => times,
            },
        });
        let media_box: Vec<Object> = vec![
            0.into(),
            0.into(),
            Object::Real(self.width),
            Object::Real(self.height),
        ];

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for operations in self.pages {
            let content = Content { operations }
                .encode()
                .map_err(StrategyError::render)?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => media_box.clone(),
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => media_box,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut out = Vec::new();
        doc.save_to(&mut out).map_err(StrategyError::render)?;
        Ok(out)
    }
}

// ── Layouts ──────────────────────────────────────────────────────────────────

const FLOW_MARGIN: f32 = 72.0;
const FLOW_WIDTH: f32 = 410.0;
const FLOW_FONT_SIZE: f32 = 12.0;
const LINE_HEIGHT_EM: f32 = 1.2;

/// Flow plain text onto Letter pages in Times-Roman 12 pt.
///
/// Lines wrap to a 410 pt column; a form feed starts a new page.
pub fn render_flowed_text(text: &str) -> Result<Vec<u8>, StrategyError> {
    let mut pdf = PdfBuilder::new(LETTER);
    let line_height = FLOW_FONT_SIZE * LINE_HEIGHT_EM;
    let bottom = pdf.page_height() - FLOW_MARGIN;
    let max_chars = chars_per_line(FLOW_WIDTH, FLOW_FONT_SIZE);

    for (i, page) in split_pages(text).iter().enumerate() {
        if i > 0 {
            pdf.new_page();
        }
        let mut top = FLOW_MARGIN;
        for line in normalise_text(page).split('\n') {
            for wrapped in wrap_line(line, max_chars) {
                if top + line_height > bottom {
                    pdf.new_page();
                    top = FLOW_MARGIN;
                }
                if !wrapped.is_empty() {
                    pdf.text(Font::TimesRoman, FLOW_FONT_SIZE, FLOW_MARGIN, top, &wrapped);
                }
                top += line_height;
            }
        }
    }
    pdf.finish()
}

const GRID_MARGIN: f32 = 30.0;
const GRID_ORIGIN_TOP: f32 = 100.0;
const GRID_COLUMN_PITCH: f32 = 150.0;
const GRID_ROW_PITCH: f32 = 20.0;
const GRID_FONT_SIZE: f32 = 10.0;
const GRID_TITLE_SIZE: f32 = 14.0;

/// Draw a sheet as a fixed grid under a centred title.
///
/// Cells sit at a 150 pt column pitch and a 20 pt row pitch and are clipped
/// to the column width minus 10 pt. Rows that reach the bottom margin carry
/// on from the top margin of a new page.
pub fn render_grid(sheet_name: &str, rows: &[Vec<String>]) -> Result<Vec<u8>, StrategyError> {
    let mut pdf = PdfBuilder::new(LETTER);
    let bottom = pdf.page_height() - GRID_MARGIN;
    let max_chars = chars_per_line(GRID_COLUMN_PITCH - 10.0, GRID_FONT_SIZE);

    pdf.centered(
        Font::Helvetica,
        GRID_TITLE_SIZE,
        GRID_MARGIN,
        GRID_MARGIN,
        &format!("Excel to PDF Export - Sheet: {sheet_name}"),
    );

    let mut top = GRID_ORIGIN_TOP;
    for row in rows {
        if top + GRID_ROW_PITCH > bottom {
            pdf.new_page();
            top = GRID_MARGIN;
        }
        for (col, cell) in row.iter().enumerate() {
            let clipped: String = cell.trim().chars().take(max_chars).collect();
            if clipped.is_empty() {
                continue;
            }
            let x = GRID_MARGIN + col as f32 * GRID_COLUMN_PITCH;
            pdf.text(Font::Helvetica, GRID_FONT_SIZE, x, top, &clipped);
        }
        top += GRID_ROW_PITCH;
    }
    pdf.finish()
}

/// Fixed notice page for presentations, naming the source file and time.
pub fn render_placeholder(source_name: &str, converted_on: &str) -> Result<Vec<u8>, StrategyError> {
    let mut pdf = PdfBuilder::new(LETTER);
    let body_chars = chars_per_line(LETTER.0 - 2.0 * FLOW_MARGIN, FLOW_FONT_SIZE);
    let line_height = FLOW_FONT_SIZE * LINE_HEIGHT_EM;

    pdf.centered(Font::Helvetica, 16.0, FLOW_MARGIN, FLOW_MARGIN, "PPT to PDF Conversion");
    let mut top = FLOW_MARGIN + 16.0 * LINE_HEIGHT_EM + line_height;

    let notice = "This is a placeholder conversion. The actual PPT content would be extracted and converted here.";
    for line in wrap_line(notice, body_chars) {
        pdf.text(Font::Helvetica, FLOW_FONT_SIZE, FLOW_MARGIN, top, &line);
        top += line_height;
    }
    top += line_height;

    for line in [
        format!("Original file: {source_name}"),
        format!("Converted on: {converted_on}"),
    ] {
        for wrapped in wrap_line(&line, body_chars) {
            pdf.text(Font::Helvetica, FLOW_FONT_SIZE, FLOW_MARGIN, top, &wrapped);
            top += line_height;
        }
    }
    pdf.finish()
}
