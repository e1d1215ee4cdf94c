//! The dispatcher: routes a request to its strategy chain and walks it.
//!
//! ## Attempt protocol
//!
//! ```text
//! pair ──▶ chain? ──no──▶ UnsupportedConversion   (no strategy runs)
//!            │
//!            ▼
//!   for each strategy, in order:
//!     execute(request, .out.N.part) ──ok──▶ rename onto output_path ──▶ result
//!            │
//!            err: remove .part, record (name, error), next strategy
//!            │
//!            ▼
//!   ConversionFailed { every recorded attempt }
//! ```
//!
//! Strategies only ever write to their private staging path, so the final
//! output path holds either a complete artifact or nothing.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::format::{ConversionPair, DocumentFormat};
use crate::output::{ConversionFailure, ConversionResult, StrategyAttempt};
use crate::pipeline::engine::{ChromiumRenderer, HtmlRenderer, LibreOfficeRenderer, OfficeRenderer};
use crate::progress::ProgressCallback;
use crate::request::ConversionRequest;
use crate::strategy::{
    DocxHtmlFallback, HtmlEnginePdf, OfficeEnginePdf, PdfToDocx, PdfToHtml, PdfToPptx, PdfToTxt,
    PdfToXlsx, PptxPlaceholderPdf, StrategyChain, StrategyOutput, TxtFlowPdf, XlsxGridPdf,
};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling of `output` for one attempt: `.name.ext.<seq>.part`.
pub fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    output.with_file_name(format!(".{name}.{seq}.part"))
}

/// Maps each supported pair to its ordered strategy chain.
#[derive(Default)]
pub struct Dispatcher {
    chains: HashMap<ConversionPair, StrategyChain>,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs: Vec<_> = self.chains.iter().collect();
        pairs.sort_by_key(|(p, _)| (p.from, p.to));
        f.debug_map()
            .entries(pairs.into_iter().map(|(p, c)| (p.to_string(), c)))
            .finish()
    }
}

impl Dispatcher {
    /// An empty dispatcher; every pair is unsupported until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in chains for the eleven supported pairs.
    ///
    /// Engines come from the config when injected, otherwise Chromium and
    /// LibreOffice are invoked from the configured paths.
    pub fn with_default_chains(config: &ConversionConfig) -> Self {
        let html: Arc<dyn HtmlRenderer> = match &config.html_renderer {
            Some(r) => Arc::clone(r),
            None => Arc::new(ChromiumRenderer::new(
                &config.chromium_path,
                config.engine_timeout(),
            )),
        };
        let office: Arc<dyn OfficeRenderer> = match &config.office_renderer {
            Some(r) => Arc::clone(r),
            None => Arc::new(LibreOfficeRenderer::new(
                &config.soffice_path,
                config.engine_timeout(),
            )),
        };

        use DocumentFormat::*;
        let word_to_pdf = StrategyChain::new(vec![
            Arc::new(OfficeEnginePdf::new(office)),
            Arc::new(DocxHtmlFallback::new(Arc::clone(&html))),
        ]);
        let single = StrategyChain::single;

        let mut d = Self::new().with_progress(config.progress_callback.clone());
        d.register(ConversionPair::new(Doc, Pdf), word_to_pdf.clone());
        d.register(ConversionPair::new(Docx, Pdf), word_to_pdf);
        d.register(ConversionPair::new(Pdf, Docx), single(Arc::new(PdfToDocx)));
        d.register(ConversionPair::new(Pdf, Xlsx), single(Arc::new(PdfToXlsx)));
        d.register(ConversionPair::new(Xlsx, Pdf), single(Arc::new(XlsxGridPdf)));
        d.register(ConversionPair::new(Pdf, Pptx), single(Arc::new(PdfToPptx)));
        d.register(ConversionPair::new(Pptx, Pdf), single(Arc::new(PptxPlaceholderPdf)));
        d.register(ConversionPair::new(Pdf, Txt), single(Arc::new(PdfToTxt)));
        d.register(ConversionPair::new(Txt, Pdf), single(Arc::new(TxtFlowPdf)));
        d.register(ConversionPair::new(Pdf, Html), single(Arc::new(PdfToHtml)));
        d.register(ConversionPair::new(Html, Pdf), single(Arc::new(HtmlEnginePdf::new(html))));
        d
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Install or replace the chain for `pair`, returning the previous one.
    pub fn register(&mut self, pair: ConversionPair, chain: StrategyChain) -> Option<StrategyChain> {
        self.chains.insert(pair, chain)
    }

    pub fn chain(&self, pair: ConversionPair) -> Option<&StrategyChain> {
        self.chains.get(&pair)
    }

    /// Registered pairs, sorted.
    pub fn pairs(&self) -> Vec<ConversionPair> {
        let mut pairs: Vec<_> = self.chains.keys().copied().collect();
        pairs.sort_by_key(|p| (p.from, p.to));
        pairs
    }

    /// Run the chain for `request` until a strategy succeeds.
    ///
    /// Does not touch the input file; removing it is the caller's job.
    pub async fn dispatch(&self, request: &ConversionRequest) -> Result<ConversionResult, ConvertError> {
        let pair = request.pair();
        let chain = self
            .chains
            .get(&pair)
            .filter(|c| !c.is_empty())
            .ok_or(ConvertError::UnsupportedConversion {
                from: pair.from,
                to: pair.to,
            })?;

        if !tokio::fs::try_exists(&request.source_path).await.unwrap_or(false) {
            return Err(ConvertError::InputNotFound {
                path: request.source_path.clone(),
            });
        }
        if let Some(parent) = request.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConvertError::OutputWriteFailed {
                    path: request.output_path.clone(),
                    source: e,
                })?;
        }

        info!("Dispatching {} ({} strategies)", pair, chain.len());
        if let Some(ref cb) = self.progress {
            cb.on_conversion_start(pair.from, pair.to, chain.len());
        }

        let total = chain.len();
        let mut failure = ConversionFailure::default();
        for (idx, strategy) in chain.iter().enumerate() {
            let name = strategy.name();
            if let Some(ref cb) = self.progress {
                cb.on_attempt_start(name, idx + 1, total);
            }

            let staging = staging_path(&request.output_path);
            debug!("Attempt {}/{}: {} → {}", idx + 1, total, name, staging.display());

            match strategy.execute(request, &staging).await {
                Ok(output) => {
                    let result = self.finalize(request, name, &staging, output).await;
                    if let Some(ref cb) = self.progress {
                        cb.on_conversion_complete(result.is_ok());
                    }
                    return result;
                }
                Err(e) => {
                    warn!("Strategy {} failed for {}: {}", name, pair, e);
                    remove_staging(&staging).await;
                    if let Some(ref cb) = self.progress {
                        cb.on_attempt_failed(name, &e.to_string());
                    }
                    failure.attempted_strategies.push(StrategyAttempt {
                        strategy: name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        warn!("All {} strategies failed for {}", total, pair);
        if let Some(ref cb) = self.progress {
            cb.on_conversion_complete(false);
        }
        Err(ConvertError::ConversionFailed(failure))
    }

    /// Move the staged artifact onto the output path and describe it.
    async fn finalize(
        &self,
        request: &ConversionRequest,
        strategy: &str,
        staging: &Path,
        output: StrategyOutput,
    ) -> Result<ConversionResult, ConvertError> {
        let write_failed = |e: std::io::Error| ConvertError::OutputWriteFailed {
            path: request.output_path.clone(),
            source: e,
        };

        if let Err(e) = tokio::fs::rename(staging, &request.output_path).await {
            remove_staging(staging).await;
            return Err(write_failed(e));
        }
        let file_size = tokio::fs::metadata(&request.output_path)
            .await
            .map_err(write_failed)?
            .len();

        info!(
            "{} → {} via {} ({} bytes)",
            request.source_name(),
            request.output_name(),
            strategy,
            file_size
        );
        Ok(ConversionResult {
            success: true,
            output_file: request.output_name(),
            file_size,
            extracted_pages: output.extracted_pages,
            extracted_characters: output.extracted_characters,
            rows: output.rows,
            slides: output.slides,
            message: output.message,
            strategy: strategy.to_string(),
        })
    }
}

async fn remove_staging(staging: &Path) {
    match tokio::fs::remove_file(staging).await {
        Ok(()) => debug!("Removed staging file {}", staging.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove staging file {}: {}", staging.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyError;
    use crate::strategy::ConversionStrategy;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    /// Writes a partial file, then fails or succeeds.
    struct Scripted {
        name: &'static str,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ConversionStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn execute(
            &self,
            _request: &ConversionRequest,
            staging: &Path,
        ) -> Result<StrategyOutput, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(staging, b"partial").await.unwrap();
            if self.succeed {
                Ok(StrategyOutput::new(format!("{} ok", self.name)))
            } else {
                Err(StrategyError::EngineFailed {
                    engine: self.name.into(),
                    detail: "scripted failure".into(),
                })
            }
        }
    }

    fn scripted(name: &'static str, succeed: bool, calls: &Arc<AtomicUsize>) -> Arc<dyn ConversionStrategy> {
        Arc::new(Scripted {
            name,
            succeed,
            calls: Arc::clone(calls),
        })
    }

    fn setup(tmp: &TempDir) -> ConversionRequest {
        let input = tmp.path().join("in.txt");
        std::fs::write(&input, "hello").unwrap();
        ConversionRequest::new(
            input,
            DocumentFormat::Txt,
            DocumentFormat::Pdf,
            tmp.path().join("out").join("in.pdf"),
        )
    }

    fn leftover_parts(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .map(|it| {
                it.flatten()
                    .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn fallback_runs_after_failure() {
        let tmp = TempDir::new().unwrap();
        let req = setup(&tmp);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut d = Dispatcher::new();
        d.register(
            req.pair(),
            StrategyChain::new(vec![scripted("primary", false, &calls), scripted("backup", true, &calls)]),
        );

        let result = d.dispatch(&req).await.unwrap();
        assert_eq!(result.strategy, "backup");
        assert_eq!(result.message, "backup ok");
        assert_eq!(result.output_file, "in.pdf");
        assert_eq!(result.file_size, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(leftover_parts(&tmp.path().join("out")), 0);
    }

    #[tokio::test]
    async fn first_success_stops_the_chain() {
        let tmp = TempDir::new().unwrap();
        let req = setup(&tmp);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut d = Dispatcher::new();
        d.register(
            req.pair(),
            StrategyChain::new(vec![scripted("primary", true, &calls), scripted("backup", true, &calls)]),
        );
        assert_eq!(d.dispatch(&req).await.unwrap().strategy, "primary");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_every_attempt() {
        let tmp = TempDir::new().unwrap();
        let req = setup(&tmp);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut d = Dispatcher::new();
        d.register(
            req.pair(),
            StrategyChain::new(vec![scripted("a", false, &calls), scripted("b", false, &calls)]),
        );

        let err = d.dispatch(&req).await.unwrap_err();
        let failure = err.failure().unwrap();
        let names: Vec<_> = failure.attempted_strategies.iter().map(|a| a.strategy.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(failure.attempted_strategies[0].error.contains("scripted failure"));
        assert!(!req.output_path.exists());
        assert_eq!(leftover_parts(&tmp.path().join("out")), 0);
    }

    #[tokio::test]
    async fn unsupported_pair_runs_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut req = setup(&tmp);
        req.target_format = DocumentFormat::Xlsx;
        let calls = Arc::new(AtomicUsize::new(0));
        let mut d = Dispatcher::new();
        d.register(
            ConversionPair::new(DocumentFormat::Txt, DocumentFormat::Pdf),
            StrategyChain::new(vec![scripted("a", true, &calls)]),
        );

        let err = d.dispatch(&req).await.unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedConversion { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let tmp = TempDir::new().unwrap();
        let req = setup(&tmp);
        std::fs::remove_file(&req.source_path).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut d = Dispatcher::new();
        d.register(req.pair(), StrategyChain::new(vec![scripted("a", true, &calls)]));

        let err = d.dispatch(&req).await.unwrap_err();
        assert!(matches!(err, ConvertError::InputNotFound { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn default_chains_cover_eleven_pairs() {
        let d = Dispatcher::with_default_chains(&ConversionConfig::default());
        assert_eq!(d.pairs(), {
            let mut expected = crate::format::supported_pairs();
            expected.sort_by_key(|p| (p.from, p.to));
            expected
        });
        let word = d
            .chain(ConversionPair::new(DocumentFormat::Docx, DocumentFormat::Pdf))
            .unwrap();
        assert_eq!(word.names(), vec!["office-engine", "docx-html-fallback"]);
    }

    #[test]
    fn staging_paths_are_hidden_and_unique() {
        let out = Path::new("/scratch/outputs/doc.pdf");
        let a = staging_path(out);
        let b = staging_path(out);
        assert_ne!(a, b);
        assert_eq!(a.parent(), out.parent());
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".doc.pdf."));
        assert!(name.ends_with(".part"));
    }
}
