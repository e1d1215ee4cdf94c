//! Error types for the edgequake-docconv library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] is **fatal**: the request cannot produce an output at
//!   all (unsupported pair, missing input, every strategy in the chain
//!   failed). Returned as `Err(ConvertError)` from [`crate::Converter::convert`].
//!
//! * [`StrategyError`] is **non-fatal**: a single conversion strategy failed
//!   (engine missing, malformed input, I/O glitch). The dispatcher records it
//!   and moves on to the next strategy of the chain; it only reaches the
//!   caller inside [`ConversionFailure`] once the chain is exhausted.

use crate::format::DocumentFormat;
use crate::output::ConversionFailure;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docconv library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Request errors ────────────────────────────────────────────────────
    /// No strategy chain is registered for this (source, target) pair.
    #[error("Unsupported conversion: {from} to {to}")]
    UnsupportedConversion {
        from: DocumentFormat,
        to: DocumentFormat,
    },

    /// The input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Uploaded file extension is not one of the accepted formats.
    #[error(
        "Invalid file type '{extension}'. Only .doc, .docx, .pdf, .xlsx, .pptx, .txt, and .html files are allowed."
    )]
    UnsupportedFileType { extension: String },

    /// Uploaded file exceeds the configured size limit.
    #[error("File is {size} bytes, larger than the {limit}-byte upload limit")]
    FileTooLarge { size: u64, limit: u64 },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// Every strategy in the chain failed.
    #[error("Conversion failed: {0}")]
    ConversionFailed(ConversionFailure),

    /// Could not move the finished artifact onto the output path.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// True when the request itself was invalid, as opposed to a conversion
    /// that was attempted and failed. Boundary layers map this to a 4xx.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConvertError::UnsupportedConversion { .. }
                | ConvertError::UnsupportedFileType { .. }
                | ConvertError::FileTooLarge { .. }
        )
    }

    /// The aggregated attempt history, when the whole chain failed.
    pub fn failure(&self) -> Option<&ConversionFailure> {
        match self {
            ConvertError::ConversionFailed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// A non-fatal error raised by one conversion strategy.
///
/// Recorded by the dispatcher as `(strategy name, error text)`; the next
/// strategy in the chain runs, if there is one.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// An external engine binary could not be started.
    #[error("{engine} is not available: {detail}")]
    EngineUnavailable { engine: String, detail: String },

    /// An external engine ran but did not produce a document.
    #[error("{engine} failed: {detail}")]
    EngineFailed { engine: String, detail: String },

    /// An external engine call exceeded the configured timeout.
    #[error("{engine} timed out after {secs}s")]
    EngineTimeout { engine: String, secs: u64 },

    /// The input bytes could not be parsed as the declared format.
    #[error("Malformed {format} input: {detail}")]
    MalformedInput {
        format: DocumentFormat,
        detail: String,
    },

    /// Building the target document failed.
    #[error("Rendering failed: {0}")]
    Render(String),

    /// Reading the input or writing the staged output failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A blocking task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StrategyError {
    pub(crate) fn malformed(format: DocumentFormat, detail: impl ToString) -> Self {
        StrategyError::MalformedInput {
            format,
            detail: detail.to_string(),
        }
    }

    pub(crate) fn render(detail: impl ToString) -> Self {
        StrategyError::Render(detail.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::StrategyAttempt;

    #[test]
    fn unsupported_display_names_both_formats() {
        let e = ConvertError::UnsupportedConversion {
            from: DocumentFormat::Xlsx,
            to: DocumentFormat::Txt,
        };
        let msg = e.to_string();
        assert!(msg.contains("XLSX"), "got: {msg}");
        assert!(msg.contains("TXT"), "got: {msg}");
        assert!(e.is_client_error());
    }

    #[test]
    fn conversion_failed_lists_attempts() {
        let e = ConvertError::ConversionFailed(ConversionFailure {
            attempted_strategies: vec![
                StrategyAttempt {
                    strategy: "office-engine".into(),
                    error: "soffice missing".into(),
                },
                StrategyAttempt {
                    strategy: "docx-html-fallback".into(),
                    error: "not a zip".into(),
                },
            ],
        });
        let msg = e.to_string();
        assert!(msg.contains("office-engine: soffice missing"), "got: {msg}");
        assert!(msg.contains("docx-html-fallback: not a zip"), "got: {msg}");
        assert!(!e.is_client_error());
        assert_eq!(e.failure().map(|f| f.attempted_strategies.len()), Some(2));
    }

    #[test]
    fn file_too_large_display() {
        let e = ConvertError::FileTooLarge {
            size: 60,
            limit: 50,
        };
        assert!(e.to_string().contains("50-byte"));
        assert!(e.is_client_error());
    }

    #[test]
    fn engine_timeout_display() {
        let e = StrategyError::EngineTimeout {
            engine: "chromium".into(),
            secs: 120,
        };
        assert_eq!(e.to_string(), "chromium timed out after 120s");
    }

    #[test]
    fn malformed_display() {
        let e = StrategyError::malformed(DocumentFormat::Pdf, "bad xref");
        assert_eq!(e.to_string(), "Malformed PDF input: bad xref");
    }
}
