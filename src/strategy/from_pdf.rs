//! Strategies that start from a PDF's extracted text.

use super::{blocking, read_source, write_staged, ConversionStrategy, StrategyOutput};
use crate::error::StrategyError;
use crate::pipeline::extract::extract_pdf_text;
use crate::pipeline::html::{render_error_page, render_text_page};
use crate::pipeline::ooxml::{build_docx, build_pptx, build_xlsx};
use crate::pipeline::text::{chunk_slides, IntermediateDocument, TabularDocument};
use crate::request::ConversionRequest;
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

async fn extract(request: &ConversionRequest) -> Result<IntermediateDocument, StrategyError> {
    let bytes = read_source(request).await?;
    let doc = blocking(move || extract_pdf_text(&bytes)).await?;
    info!(
        "Extracted {} pages with {} characters",
        doc.page_count(),
        doc.total_characters()
    );
    Ok(doc)
}

/// One DOCX paragraph per non-blank line of the PDF.
pub struct PdfToDocx;

#[async_trait]
impl ConversionStrategy for PdfToDocx {
    fn name(&self) -> &'static str {
        "pdf-text-docx"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        let doc = extract(request).await?;
        let (pages, chars) = (doc.page_count(), doc.total_characters());
        let docx = blocking(move || build_docx(&doc.lines())).await?;
        write_staged(staging, &docx).await?;
        Ok(StrategyOutput::new("PDF text extracted and saved as .docx").with_extraction(pages, chars))
    }
}

/// One spreadsheet row per non-blank line, split into cells on wide gaps.
pub struct PdfToXlsx;

#[async_trait]
impl ConversionStrategy for PdfToXlsx {
    fn name(&self) -> &'static str {
        "pdf-table-xlsx"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        let doc = extract(request).await?;
        let (pages, chars) = (doc.page_count(), doc.total_characters());
        let table = TabularDocument::from_document(&doc);
        let rows = table.row_count();
        let xlsx = blocking(move || build_xlsx(&table.rows)).await?;
        write_staged(staging, &xlsx).await?;
        Ok(StrategyOutput::new(format!("PDF text extracted into {rows} spreadsheet rows"))
            .with_extraction(pages, chars)
            .with_rows(rows))
    }
}

/// Slides of up to ten lines each, never spanning a PDF page.
pub struct PdfToPptx;

#[async_trait]
impl ConversionStrategy for PdfToPptx {
    fn name(&self) -> &'static str {
        "pdf-text-pptx"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        let doc = extract(request).await?;
        let (pages, chars) = (doc.page_count(), doc.total_characters());
        let slides = chunk_slides(&doc);
        let count = slides.len();
        let pptx = blocking(move || build_pptx(&slides)).await?;
        write_staged(staging, &pptx).await?;
        Ok(StrategyOutput::new(format!("PDF text laid out on {count} slides"))
            .with_extraction(pages, chars)
            .with_slides(count))
    }
}

/// The extracted text as-is, pages separated by form feeds.
pub struct PdfToTxt;

#[async_trait]
impl ConversionStrategy for PdfToTxt {
    fn name(&self) -> &'static str {
        "pdf-text-txt"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        let doc = extract(request).await?;
        write_staged(staging, doc.text().as_bytes()).await?;
        Ok(StrategyOutput::new("PDF text extracted and saved as .txt")
            .with_extraction(doc.page_count(), doc.total_characters()))
    }
}

/// Extracted text as an HTML page.
///
/// An unparseable PDF, or one that crashes the parser, still yields a page
/// carrying a notice block with the parse error and zero extraction counts.
/// Failing to read the input at all is still an error.
pub struct PdfToHtml;

#[async_trait]
impl ConversionStrategy for PdfToHtml {
    fn name(&self) -> &'static str {
        "pdf-text-html"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        let bytes = read_source(request).await?;
        let extracted = blocking(move || extract_pdf_text(&bytes)).await;
        write_html_page(extracted, &request.source_name(), staging).await
    }
}

/// Write the text page, or the notice page when the PDF could not be read.
///
/// A parser that panicked surfaces as [`StrategyError::Internal`] and is
/// treated like unparseable input.
async fn write_html_page(
    extracted: Result<IntermediateDocument, StrategyError>,
    source_name: &str,
    staging: &Path,
) -> Result<StrategyOutput, StrategyError> {
    match extracted {
        Ok(doc) => {
            let html = render_text_page(&doc, source_name);
            write_staged(staging, html.as_bytes()).await?;
            Ok(StrategyOutput::new("PDF text extracted and converted to HTML")
                .with_extraction(doc.page_count(), doc.total_characters()))
        }
        Err(e @ (StrategyError::MalformedInput { .. } | StrategyError::Internal(_))) => {
            warn!("PDF parsing failed for {}, writing notice page: {}", source_name, e);
            let html = render_error_page(source_name, &e.to_string());
            write_staged(staging, html.as_bytes()).await?;
            Ok(StrategyOutput::new("PDF to HTML conversion completed with fallback content")
                .with_extraction(0, 0))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn html_page_degrades_when_the_parser_panics() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("page.html");
        let extracted =
            blocking(|| -> Result<IntermediateDocument, StrategyError> { panic!("parser bug") })
                .await;
        assert!(matches!(extracted, Err(StrategyError::Internal(_))));

        let output = write_html_page(extracted, "broken.pdf", &staging).await.unwrap();
        assert_eq!(output.extracted_pages, Some(0));
        let html = std::fs::read_to_string(&staging).unwrap();
        assert!(html.contains("Conversion Notice"));
        assert!(html.contains("broken.pdf"));
    }

    #[tokio::test]
    async fn html_page_passes_io_errors_through() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("page.html");
        let extracted = Err(StrategyError::Io {
            path: tmp.path().join("gone.pdf"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });

        let err = write_html_page(extracted, "gone.pdf", &staging).await.unwrap_err();
        assert!(matches!(err, StrategyError::Io { .. }));
        assert!(!staging.exists());
    }
}
