//! Strategies that write PDF directly, without an external engine.

use super::{blocking, read_source, write_staged, ConversionStrategy, StrategyOutput};
use crate::error::StrategyError;
use crate::pipeline::extract::read_first_sheet;
use crate::pipeline::pdf::{render_flowed_text, render_grid, render_placeholder};
use crate::request::ConversionRequest;
use async_trait::async_trait;
use std::path::Path;

/// First worksheet drawn as a fixed grid.
pub struct XlsxGridPdf;

#[async_trait]
impl ConversionStrategy for XlsxGridPdf {
    fn name(&self) -> &'static str {
        "xlsx-grid-pdf"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        let bytes = read_source(request).await?;
        let (sheet_name, rows, pdf) = blocking(move || {
            let sheet = read_first_sheet(&bytes)?;
            let pdf = render_grid(&sheet.name, &sheet.rows)?;
            Ok((sheet.name, sheet.rows.len(), pdf))
        })
        .await?;
        write_staged(staging, &pdf).await?;
        Ok(StrategyOutput::new(format!("Excel sheet '{sheet_name}' exported to PDF")).with_rows(rows))
    }
}

/// Plain text flowed onto Letter pages.
pub struct TxtFlowPdf;

#[async_trait]
impl ConversionStrategy for TxtFlowPdf {
    fn name(&self) -> &'static str {
        "txt-flow-pdf"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        let bytes = read_source(request).await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let chars = text.chars().count();
        let pdf = blocking(move || render_flowed_text(&text)).await?;
        write_staged(staging, &pdf).await?;
        Ok(StrategyOutput::new("TXT content written to .pdf").with_characters(chars))
    }
}

/// Fixed notice page; the presentation itself is not decoded.
pub struct PptxPlaceholderPdf;

#[async_trait]
impl ConversionStrategy for PptxPlaceholderPdf {
    fn name(&self) -> &'static str {
        "pptx-placeholder-pdf"
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError> {
        // Reading proves the input is there and readable.
        read_source(request).await?;
        let source_name = request.source_name();
        let converted_on = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let pdf = blocking(move || render_placeholder(&source_name, &converted_on)).await?;
        write_staged(staging, &pdf).await?;
        Ok(StrategyOutput::new("PPT converted to PDF (placeholder implementation)"))
    }
}
