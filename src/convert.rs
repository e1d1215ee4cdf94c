//! The lifecycle manager around the dispatcher.
//!
//! [`Converter::convert`] owns the request's input file: once called, the
//! input is gone when it returns, whatever the outcome. A failed conversion
//! also leaves nothing at the output path.

use crate::config::ConversionConfig;
use crate::dispatch::Dispatcher;
use crate::error::ConvertError;
use crate::format::DocumentFormat;
use crate::output::ConversionResult;
use crate::request::ConversionRequest;
use crate::storage::ScratchStorage;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Removes the input if the conversion future is dropped before it finishes.
struct InputGuard {
    path: Option<PathBuf>,
}

impl InputGuard {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn disarm(mut self) -> Option<PathBuf> {
        self.path.take()
    }
}

impl Drop for InputGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed input on unwind: {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove input {}: {}", path.display(), e),
            }
        }
    }
}

/// Dispatches requests and cleans up after them.
///
/// Cheap to share: wrap it in an [`Arc`] and call [`convert`](Self::convert)
/// from as many tasks as you like.
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConversionConfig,
    storage: ScratchStorage,
    dispatcher: Arc<Dispatcher>,
}

impl Converter {
    /// A converter with the built-in strategy chains.
    pub fn new(config: ConversionConfig) -> Self {
        let dispatcher = Dispatcher::with_default_chains(&config);
        Self::with_dispatcher(config, dispatcher)
    }

    /// A converter around a caller-assembled dispatcher.
    pub fn with_dispatcher(config: ConversionConfig, dispatcher: Dispatcher) -> Self {
        let storage = ScratchStorage::new(&config.scratch_dir);
        Self {
            config,
            storage,
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn storage(&self) -> &ScratchStorage {
        &self.storage
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Convert one request.
    ///
    /// The input file is removed on every path, including unsupported pairs
    /// and missing engines. On error, any file at `request.output_path` is
    /// removed too. Cleanup problems are logged and never change the result.
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConversionResult, ConvertError> {
        let start = Instant::now();
        let guard = InputGuard::new(&request.source_path);
        info!(
            "Starting conversion: {} ({})",
            request.source_name(),
            request.pair()
        );

        let outcome = self.dispatcher.dispatch(&request).await;

        if let Some(input) = guard.disarm() {
            remove_quietly(&input, "input").await;
        }
        match &outcome {
            Ok(result) => info!(
                "Conversion complete: {} ({} bytes) in {}ms",
                result.output_file,
                result.file_size,
                start.elapsed().as_millis()
            ),
            Err(e) => {
                remove_quietly(&request.output_path, "output").await;
                warn!("Conversion failed for {}: {}", request.source_name(), e);
            }
        }
        outcome
    }

    /// Stage `bytes` as a fresh upload, then convert it into scratch outputs.
    pub async fn convert_bytes(
        &self,
        bytes: &[u8],
        source_format: DocumentFormat,
        target_format: DocumentFormat,
    ) -> Result<ConversionResult, ConvertError> {
        let source_path = self.storage.stage_upload(source_format, bytes).await?;
        let output_path = self.storage.output_path_for(&source_path, target_format);
        self.convert(ConversionRequest::new(
            source_path,
            source_format,
            target_format,
            output_path,
        ))
        .await
    }

    /// Convert many requests, at most `concurrency` at a time.
    ///
    /// Results come back in the order of `requests`.
    pub async fn convert_batch(
        &self,
        requests: Vec<ConversionRequest>,
        concurrency: usize,
    ) -> Vec<Result<ConversionResult, ConvertError>> {
        let mut results: Vec<(usize, Result<ConversionResult, ConvertError>)> =
            stream::iter(
                requests
                    .into_iter()
                    .enumerate()
                    .map(|(idx, request)| async move { (idx, self.convert(request).await) }),
            )
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Remove uploads and outputs older than the configured maximum age.
    pub async fn cleanup_stale(&self) -> usize {
        let removed = self
            .storage
            .cleanup_stale(self.config.stale_output_max_age())
            .await;
        if removed > 0 {
            info!("Removed {} stale scratch files", removed);
        }
        removed
    }

    /// Synchronous wrapper around [`convert`](Self::convert).
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn convert_sync(&self, request: ConversionRequest) -> Result<ConversionResult, ConvertError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.convert(request))
    }
}

async fn remove_quietly(path: &Path, what: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {} {}", what, path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {} {}: {}", what, path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyError;
    use crate::format::ConversionPair;
    use crate::strategy::{ConversionStrategy, StrategyChain, StrategyOutput};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct WritesThenFails;

    #[async_trait]
    impl ConversionStrategy for WritesThenFails {
        fn name(&self) -> &'static str {
            "writes-then-fails"
        }

        async fn execute(
            &self,
            request: &ConversionRequest,
            _staging: &Path,
        ) -> Result<StrategyOutput, StrategyError> {
            // Misbehaves by writing to the final path directly.
            tokio::fs::write(&request.output_path, b"junk").await.unwrap();
            Err(StrategyError::render("nope"))
        }
    }

    struct Copies;

    #[async_trait]
    impl ConversionStrategy for Copies {
        fn name(&self) -> &'static str {
            "copies"
        }

        async fn execute(
            &self,
            request: &ConversionRequest,
            staging: &Path,
        ) -> Result<StrategyOutput, StrategyError> {
            tokio::fs::copy(&request.source_path, staging).await.unwrap();
            Ok(StrategyOutput::new("copied"))
        }
    }

    struct Sleeps;

    #[async_trait]
    impl ConversionStrategy for Sleeps {
        fn name(&self) -> &'static str {
            "sleeps"
        }

        async fn execute(
            &self,
            _request: &ConversionRequest,
            _staging: &Path,
        ) -> Result<StrategyOutput, StrategyError> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(StrategyOutput::new("late"))
        }
    }

    fn converter(tmp: &TempDir, strategy: Arc<dyn ConversionStrategy>) -> Converter {
        let config = ConversionConfig::builder()
            .scratch_dir(tmp.path())
            .build()
            .unwrap();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(
            ConversionPair::new(DocumentFormat::Txt, DocumentFormat::Pdf),
            StrategyChain::single(strategy),
        );
        Converter::with_dispatcher(config, dispatcher)
    }

    async fn staged(conv: &Converter) -> ConversionRequest {
        let path = conv
            .storage()
            .stage_upload(DocumentFormat::Txt, b"hello")
            .await
            .unwrap();
        conv.storage().request_for(&path, DocumentFormat::Pdf).unwrap()
    }

    #[tokio::test]
    async fn success_removes_input_and_keeps_output() {
        let tmp = TempDir::new().unwrap();
        let conv = converter(&tmp, Arc::new(Copies));
        let req = staged(&conv).await;
        let (input, output) = (req.source_path.clone(), req.output_path.clone());

        let result = conv.convert(req).await.unwrap();
        assert_eq!(result.file_size, 5);
        assert!(!input.exists());
        assert!(output.exists());
    }

    #[tokio::test]
    async fn failure_removes_input_and_output() {
        let tmp = TempDir::new().unwrap();
        let conv = converter(&tmp, Arc::new(WritesThenFails));
        let req = staged(&conv).await;
        let (input, output) = (req.source_path.clone(), req.output_path.clone());

        let err = conv.convert(req).await.unwrap_err();
        assert!(matches!(err, ConvertError::ConversionFailed(_)));
        assert!(!input.exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn unsupported_pair_still_removes_input() {
        let tmp = TempDir::new().unwrap();
        let conv = converter(&tmp, Arc::new(Copies));
        let mut req = staged(&conv).await;
        req.target_format = DocumentFormat::Xlsx;
        let input = req.source_path.clone();

        let err = conv.convert(req).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(!input.exists());
    }

    #[tokio::test]
    async fn cancelled_conversion_removes_input() {
        let tmp = TempDir::new().unwrap();
        let conv = converter(&tmp, Arc::new(Sleeps));
        let req = staged(&conv).await;
        let input = req.source_path.clone();

        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(50), conv.convert(req)).await;
        assert!(timed_out.is_err());
        assert!(!input.exists());
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let conv = converter(&tmp, Arc::new(Copies));
        let ok = staged(&conv).await;
        let mut bad = staged(&conv).await;
        bad.target_format = DocumentFormat::Html;

        let results = conv.convert_batch(vec![ok, bad], 2).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ConvertError::UnsupportedConversion { .. })
        ));
    }

    #[tokio::test]
    async fn convert_bytes_stages_then_converts() {
        let tmp = TempDir::new().unwrap();
        let conv = converter(&tmp, Arc::new(Copies));
        let result = conv
            .convert_bytes(b"abc", DocumentFormat::Txt, DocumentFormat::Pdf)
            .await
            .unwrap();
        assert!(result.output_file.ends_with(".pdf"));
        assert!(conv.storage().outputs_dir().join(&result.output_file).exists());
        let uploads = std::fs::read_dir(conv.storage().uploads_dir()).unwrap().count();
        assert_eq!(uploads, 0);
    }

    #[test]
    fn convert_sync_runs_outside_a_runtime() {
        let tmp = TempDir::new().unwrap();
        let conv = converter(&tmp, Arc::new(Copies));
        let input = tmp.path().join("note.txt");
        std::fs::write(&input, "hi").unwrap();
        let req = conv.storage().request_for(&input, DocumentFormat::Pdf).unwrap();
        let result = conv.convert_sync(req).unwrap();
        assert_eq!(result.output_file, "note.pdf");
        assert!(!input.exists());
    }
}
