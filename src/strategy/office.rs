//! Strategies backed by external engines.

use super::{blocking, read_source, write_staged, ConversionStrategy, StrategyOutput};
use crate::error::StrategyError;
use crate::pipeline::engine::{HtmlRenderer, OfficeRenderer, PageLayout};
use crate::pipeline::extract::docx_to_html;
use crate::pipeline::html::wrap_fragment_for_print;
use crate::request::ConversionRequest;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Word document to PDF through the office engine.
pub struct OfficeEnginePdf {
    renderer: Arc<dyn OfficeRenderer>,
}

impl OfficeEnginePdf {
    pub fn new(renderer: Arc<dyn OfficeRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl ConversionStrategy for OfficeEnginePdf {
    fn name(&self) -> &'static str {
        "office-engine"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        let pdf = self.renderer.convert_to_pdf(&request.source_path).await?;
        write_staged(staging, &pdf).await?;
        Ok(StrategyOutput::new(format!(
            "Document converted successfully using {}",
            self.renderer.name()
        )))
    }
}

/// Word document to PDF by way of HTML, for when the office engine fails.
///
/// Only the OOXML (`.docx`) container can be read; a legacy `.doc` fails
/// here as malformed input.
pub struct DocxHtmlFallback {
    renderer: Arc<dyn HtmlRenderer>,
}

impl DocxHtmlFallback {
    pub fn new(renderer: Arc<dyn HtmlRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl ConversionStrategy for DocxHtmlFallback {
    fn name(&self) -> &'static str {
        "docx-html-fallback"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        let bytes = read_source(request).await?;
        let fragment = blocking(move || docx_to_html(&bytes)).await?;
        debug!("DOCX body: {} bytes of HTML", fragment.len());

        let html = wrap_fragment_for_print(&fragment, &request.source_name());
        let pdf = self.renderer.render_pdf(&html, &PageLayout::A4_PRINT).await?;
        write_staged(staging, &pdf).await?;
        Ok(StrategyOutput::new(format!(
            "Document converted using the fallback path (DOCX to HTML, printed by {})",
            self.renderer.name()
        )))
    }
}

/// HTML page to PDF through the HTML engine.
pub struct HtmlEnginePdf {
    renderer: Arc<dyn HtmlRenderer>,
}

impl HtmlEnginePdf {
    pub fn new(renderer: Arc<dyn HtmlRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl ConversionStrategy for HtmlEnginePdf {
    fn name(&self) -> &'static str {
        "html-engine-pdf"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        let bytes = read_source(request).await?;
        let html = String::from_utf8_lossy(&bytes);
        let pdf = self.renderer.render_pdf(&html, &PageLayout::A4_PRINT).await?;
        write_staged(staging, &pdf).await?;
        Ok(StrategyOutput::new(format!(
            "HTML converted to PDF using {}",
            self.renderer.name()
        )))
    }
}
