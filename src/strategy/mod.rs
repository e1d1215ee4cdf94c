//! Conversion strategies: one way of producing one target format.
//!
//! A strategy reads the request's source file and writes its artifact to the
//! staging path the dispatcher hands it, never to the final output path. A
//! failed strategy therefore cannot leave a partial file where the caller
//! looks for results.
//!
//! | Strategy               | Pair             | Module      |
//! |------------------------|------------------|-------------|
//! | `office-engine`        | DOC/DOCX → PDF   | [`office`]  |
//! | `docx-html-fallback`   | DOC/DOCX → PDF   | [`office`]  |
//! | `html-engine-pdf`      | HTML → PDF       | [`office`]  |
//! | `pdf-text-docx`        | PDF → DOCX       | [`from_pdf`]|
//! | `pdf-table-xlsx`       | PDF → XLSX       | [`from_pdf`]|
//! | `pdf-text-pptx`        | PDF → PPTX       | [`from_pdf`]|
//! | `pdf-text-txt`         | PDF → TXT        | [`from_pdf`]|
//! | `pdf-text-html`        | PDF → HTML       | [`from_pdf`]|
//! | `xlsx-grid-pdf`        | XLSX → PDF       | [`to_pdf`]  |
//! | `txt-flow-pdf`         | TXT → PDF        | [`to_pdf`]  |
//! | `pptx-placeholder-pdf` | PPTX → PDF       | [`to_pdf`]  |

pub mod from_pdf;
pub mod office;
pub mod to_pdf;

use crate::error::StrategyError;
use crate::request::ConversionRequest;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub use from_pdf::{PdfToDocx, PdfToHtml, PdfToPptx, PdfToTxt, PdfToXlsx};
pub use office::{DocxHtmlFallback, HtmlEnginePdf, OfficeEnginePdf};
pub use to_pdf::{PptxPlaceholderPdf, TxtFlowPdf, XlsxGridPdf};

/// One named procedure for producing a target artifact from a source file.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    /// Stable identifier, recorded in results and failure reports.
    fn name(&self) -> &'static str;

    /// Convert `request.source_path`, writing the artifact to `staging`.
    async fn execute(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<StrategyOutput, StrategyError>;
}

/// What a successful strategy reports back; the dispatcher adds the file
/// name, size and strategy name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyOutput {
    pub message: String,
    pub extracted_pages: Option<usize>,
    pub extracted_characters: Option<usize>,
    pub rows: Option<usize>,
    pub slides: Option<usize>,
}

impl StrategyOutput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_extraction(mut self, pages: usize, characters: usize) -> Self {
        self.extracted_pages = Some(pages);
        self.extracted_characters = Some(characters);
        self
    }

    pub fn with_characters(mut self, characters: usize) -> Self {
        self.extracted_characters = Some(characters);
        self
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_slides(mut self, slides: usize) -> Self {
        self.slides = Some(slides);
        self
    }
}

/// Ordered strategies for one conversion pair; the first success wins.
#[derive(Clone, Default)]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn ConversionStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn ConversionStrategy>>) -> Self {
        Self { strategies }
    }

    /// A chain with no fallback.
    pub fn single(strategy: Arc<dyn ConversionStrategy>) -> Self {
        Self::new(vec![strategy])
    }

    /// Append a strategy, to run after the existing ones fail.
    pub fn then(mut self, strategy: Arc<dyn ConversionStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ConversionStrategy>> {
        self.strategies.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ── Helpers shared by the strategies ─────────────────────────────────────────

pub(crate) async fn read_source(request: &ConversionRequest) -> Result<Vec<u8>, StrategyError> {
    tokio::fs::read(&request.source_path)
        .await
        .map_err(|e| StrategyError::Io {
            path: request.source_path.clone(),
            source: e,
        })
}

pub(crate) async fn write_staged(staging: &Path, bytes: &[u8]) -> Result<(), StrategyError> {
    tokio::fs::write(staging, bytes)
        .await
        .map_err(|e| StrategyError::Io {
            path: staging.to_path_buf(),
            source: e,
        })
}

/// Run CPU-bound parsing or rendering off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, StrategyError>
where
    F: FnOnce() -> Result<T, StrategyError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StrategyError::Internal(format!("blocking task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl ConversionStrategy for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn execute(
            &self,
            _request: &ConversionRequest,
            _staging: &Path,
        ) -> Result<StrategyOutput, StrategyError> {
            Ok(StrategyOutput::new(self.0))
        }
    }

    #[test]
    fn chain_keeps_order() {
        let chain = StrategyChain::new(vec![Arc::new(Named("first"))]).then(Arc::new(Named("second")));
        assert_eq!(chain.names(), vec!["first", "second"]);
        assert_eq!(chain.len(), 2);
        assert_eq!(format!("{chain:?}"), r#"["first", "second"]"#);
    }

    #[test]
    fn output_builders() {
        let out = StrategyOutput::new("done").with_extraction(2, 40).with_rows(5);
        assert_eq!(out.extracted_pages, Some(2));
        assert_eq!(out.extracted_characters, Some(40));
        assert_eq!(out.rows, Some(5));
        assert_eq!(out.slides, None);
    }

    #[test]
    fn blocking_propagates_result() {
        let ok = tokio_test::block_on(blocking(|| Ok::<_, StrategyError>(7)));
        assert_eq!(ok.unwrap(), 7);
        let err = tokio_test::block_on(blocking(|| Err::<(), _>(StrategyError::render("boom"))));
        assert!(matches!(err, Err(StrategyError::Render(_))));
    }
}
