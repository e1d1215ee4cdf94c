//! # edgequake-docconv
//!
//! Convert office documents, PDFs, plain text and HTML between each other,
//! with ordered fallbacks and guaranteed cleanup of scratch files.
//!
//! ## Pipeline Overview
//!
//! ```text
//! request (input path, source format, target format, output path)
//!  │
//!  ├─ 1. Dispatch  (source, target) → ordered strategy chain
//!  ├─ 2. Attempt   strategy writes to a private staging file
//!  │                 └─ failure: discard staging, record, next strategy
//!  ├─ 3. Finalize  rename staging onto the output path, describe it
//!  └─ 4. Cleanup   remove the input always, the output on failure
//! ```
//!
//! ## Supported conversions
//!
//! | From      | To   | Strategies                                   |
//! |-----------|------|----------------------------------------------|
//! | DOC, DOCX | PDF  | office engine, then DOCX → HTML → PDF        |
//! | PDF       | DOCX | extracted lines as paragraphs                |
//! | PDF       | XLSX | lines split into columns on wide gaps        |
//! | XLSX      | PDF  | first sheet drawn as a grid                  |
//! | PDF       | PPTX | ten lines per slide                          |
//! | PPTX      | PDF  | notice page                                  |
//! | PDF       | TXT  | extracted text                               |
//! | TXT       | PDF  | text flowed onto Letter pages                |
//! | PDF       | HTML | extracted text, or a notice if unparseable   |
//! | HTML      | PDF  | headless browser print                       |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docconv::{ConversionConfig, Converter, DocumentFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(ConversionConfig::default());
//!     let bytes = std::fs::read("notes.txt")?;
//!     let result = converter
//!         .convert_bytes(&bytes, DocumentFormat::Txt, DocumentFormat::Pdf)
//!         .await?;
//!     println!("{} ({} bytes)", result.download_url(), result.file_size);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docconv` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docconv = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod request;
pub mod storage;
pub mod strategy;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::Converter;
pub use dispatch::Dispatcher;
pub use error::{ConvertError, StrategyError};
pub use format::{
    formats_manifest, supported_pairs, validate_upload, ConversionPair, DocumentFormat,
    MAX_UPLOAD_BYTES,
};
pub use output::{ConversionFailure, ConversionResult, StrategyAttempt};
pub use pipeline::engine::{HtmlRenderer, OfficeRenderer, PageLayout};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::ConversionRequest;
pub use storage::ScratchStorage;
pub use strategy::{ConversionStrategy, StrategyChain, StrategyOutput};
