//! Content extraction from source documents.
//!
//! Every function here is synchronous and CPU-bound; strategies call them
//! through `spawn_blocking`. Parse failures come back as
//! [`StrategyError::MalformedInput`], never as panics.

use crate::error::StrategyError;
use crate::format::DocumentFormat;
use crate::pipeline::text::IntermediateDocument;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

// ── PDF ──────────────────────────────────────────────────────────────────────

/// Extract the text of every page, in page order.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<IntermediateDocument, StrategyError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| StrategyError::malformed(DocumentFormat::Pdf, e))?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(StrategyError::malformed(
            DocumentFormat::Pdf,
            "document has no pages",
        ));
    }

    let mut pages = Vec::with_capacity(page_numbers.len());
    for n in page_numbers {
        match doc.extract_text(&[n]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                // A page without a decodable content stream counts as blank.
                warn!("Page {}: text extraction failed: {}", n, e);
                pages.push(String::new());
            }
        }
    }

    let doc = IntermediateDocument::from_pages(pages);
    debug!(
        "Extracted {} pages, {} characters",
        doc.page_count(),
        doc.total_characters()
    );
    Ok(doc)
}

// ── XLSX ─────────────────────────────────────────────────────────────────────

/// First worksheet of a workbook: its name and its cells as display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRows {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Read the first sheet of an XLSX workbook.
pub fn read_first_sheet(bytes: &[u8]) -> Result<SheetRows, StrategyError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| StrategyError::malformed(DocumentFormat::Xlsx, e))?;

    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| StrategyError::malformed(DocumentFormat::Xlsx, "workbook has no sheets"))?;

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| StrategyError::malformed(DocumentFormat::Xlsx, e))?;

    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    Ok(SheetRows { name, rows })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        _ => cell.to_string(),
    }
}

// ── DOCX ─────────────────────────────────────────────────────────────────────

/// Convert the main part of a DOCX package to an HTML body fragment.
///
/// Paragraph styles `Heading1..3`, `Title` and `Subtitle` become headings;
/// every other non-empty paragraph becomes `<p>`. Runs are concatenated,
/// `w:tab` becomes a tab and `w:br` a `<br>`.
pub fn docx_to_html(bytes: &[u8]) -> Result<String, StrategyError> {
    let malformed = |e: &dyn std::fmt::Display| StrategyError::malformed(DocumentFormat::Docx, e);

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| malformed(&e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| malformed(&e))?
        .read_to_string(&mut xml)
        .map_err(|e| malformed(&e))?;

    let mut reader = XmlReader::from_str(&xml);
    let mut html = String::new();
    let mut para = Paragraph::default();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = true;
                    para = Paragraph::default();
                }
                b"t" => in_text = true,
                other => para.handle_marker(other, e),
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"p" => {}
                other => para.handle_marker(other, e),
            },
            Ok(Event::Text(t)) => {
                if in_paragraph && in_text {
                    let text = t.unescape().map_err(|e| malformed(&e))?;
                    para.push_text(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    in_paragraph = false;
                    para.write_html(&mut html);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(&e)),
            _ => {}
        }
    }

    debug!("DOCX body converted to {} bytes of HTML", html.len());
    Ok(html)
}

#[derive(Default)]
struct Paragraph {
    style: Option<String>,
    html: String,
    has_text: bool,
}

impl Paragraph {
    fn handle_marker(&mut self, local: &[u8], e: &BytesStart<'_>) {
        match local {
            b"pStyle" => self.style = attr_value(e, b"val"),
            b"tab" => self.html.push('\t'),
            b"br" => self.html.push_str("<br>"),
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if !text.trim().is_empty() {
            self.has_text = true;
        }
        self.html.push_str(&html_escape::encode_text(text));
    }

    fn write_html(&self, out: &mut String) {
        if !self.has_text {
            return;
        }
        let tag = heading_tag(self.style.as_deref()).unwrap_or("p");
        out.push_str(&format!("<{tag}>{}</{tag}>\n", self.html));
    }
}

fn heading_tag(style: Option<&str>) -> Option<&'static str> {
    let style: String = style?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match style.as_str() {
        "heading1" | "title" => Some("h1"),
        "heading2" | "subtitle" => Some("h2"),
        "heading3" => Some("h3"),
        _ => None,
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ooxml::{build_docx, build_xlsx};
    use crate::pipeline::pdf::render_flowed_text;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn pdf_text_from_generated_pdf() {
        let pdf = render_flowed_text("alpha\nbeta").unwrap();
        let doc = extract_pdf_text(&pdf).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.lines(), vec!["alpha", "beta"]);
    }

    #[test]
    fn pdf_garbage_is_malformed() {
        let err = extract_pdf_text(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, StrategyError::MalformedInput { .. }));
    }

    #[test]
    fn xlsx_first_sheet_rows() {
        let bytes = build_xlsx(&[
            vec!["Name".into(), "Qty".into()],
            vec!["Pen".into(), "3".into()],
        ])
        .unwrap();
        let sheet = read_first_sheet(&bytes).unwrap();
        assert_eq!(sheet.name, "Sheet1");
        assert_eq!(sheet.rows, vec![vec!["Name", "Qty"], vec!["Pen", "3"]]);
    }

    #[test]
    fn xlsx_garbage_is_malformed() {
        assert!(read_first_sheet(b"PK\x03\x04 nope").is_err());
    }

    #[test]
    fn docx_headings_and_escaping() {
        let bytes = docx_with_body(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Intro</w:t></w:r></w:p>
               <w:p><w:r><w:t>a &lt; b</w:t></w:r><w:r><w:br/><w:t xml:space="preserve"> c</w:t></w:r></w:p>
               <w:p><w:r><w:t>   </w:t></w:r></w:p>"#,
        );
        let html = docx_to_html(&bytes).unwrap();
        assert_eq!(html, "<h1>Intro</h1>\n<p>a &lt; b<br> c</p>\n");
    }

    #[test]
    fn docx_generated_package_reads_back() {
        let bytes = build_docx(&["first", "second"]).unwrap();
        let html = docx_to_html(&bytes).unwrap();
        assert!(html.contains("<p>first</p>"));
        assert!(html.contains("<p>second</p>"));
    }

    #[test]
    fn doc_binary_is_malformed() {
        let ole = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0];
        assert!(matches!(
            docx_to_html(&ole),
            Err(StrategyError::MalformedInput { .. })
        ));
    }

    #[test]
    fn heading_tag_mapping() {
        assert_eq!(heading_tag(Some("Title")), Some("h1"));
        assert_eq!(heading_tag(Some("Heading 2")), Some("h2"));
        assert_eq!(heading_tag(Some("Normal")), None);
        assert_eq!(heading_tag(None), None);
    }
}
