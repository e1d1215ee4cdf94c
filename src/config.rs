//! Configuration types for document conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The scratch root and the external
//! engines are injected here, so two converters in one process (or two tests)
//! never share state.

use crate::error::ConvertError;
use crate::format::MAX_UPLOAD_BYTES;
use crate::pipeline::engine::{HtmlRenderer, OfficeRenderer};
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`crate::Converter`].
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docconv::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .scratch_dir("/tmp/docconv")
///     .engine_timeout_secs(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.engine_timeout_secs, 60);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Root of the `uploads/` and `outputs/` directories.
    /// Default: `<system temp>/edgequake-docconv`.
    pub scratch_dir: PathBuf,

    /// Upper bound on a single external engine call, in seconds. Default: 120.
    ///
    /// A wedged Chromium or LibreOffice process is killed when this elapses
    /// and the attempt fails with [`crate::StrategyError::EngineTimeout`].
    pub engine_timeout_secs: u64,

    /// Headless Chromium executable used for HTML→PDF. Default: `chromium`.
    pub chromium_path: PathBuf,

    /// LibreOffice executable used for DOC/DOCX→PDF. Default: `soffice`.
    pub soffice_path: PathBuf,

    /// Largest accepted upload in bytes. Default: 50 MB.
    pub max_upload_bytes: u64,

    /// Age after which leftover scratch files are swept. Default: 24.
    pub stale_output_max_age_hours: u64,

    /// Pre-constructed HTML renderer. Takes precedence over `chromium_path`.
    pub html_renderer: Option<Arc<dyn HtmlRenderer>>,

    /// Pre-constructed office renderer. Takes precedence over `soffice_path`.
    pub office_renderer: Option<Arc<dyn OfficeRenderer>>,

    /// Receives dispatch events (attempt start, attempt failure, completion).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("edgequake-docconv"),
            engine_timeout_secs: 120,
            chromium_path: PathBuf::from("chromium"),
            soffice_path: PathBuf::from("soffice"),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            stale_output_max_age_hours: 24,
            html_renderer: None,
            office_renderer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("scratch_dir", &self.scratch_dir)
            .field("engine_timeout_secs", &self.engine_timeout_secs)
            .field("chromium_path", &self.chromium_path)
            .field("soffice_path", &self.soffice_path)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("stale_output_max_age_hours", &self.stale_output_max_age_hours)
            .field(
                "html_renderer",
                &self.html_renderer.as_ref().map(|r| r.name().to_string()),
            )
            .field(
                "office_renderer",
                &self.office_renderer.as_ref().map(|r| r.name().to_string()),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    pub fn stale_output_max_age(&self) -> Duration {
        Duration::from_secs(self.stale_output_max_age_hours * 3600)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chromium_path = path.into();
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = path.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn stale_output_max_age_hours(mut self, hours: u64) -> Self {
        self.config.stale_output_max_age_hours = hours;
        self
    }

    pub fn html_renderer(mut self, renderer: Arc<dyn HtmlRenderer>) -> Self {
        self.config.html_renderer = Some(renderer);
        self
    }

    pub fn office_renderer(mut self, renderer: Arc<dyn OfficeRenderer>) -> Self {
        self.config.office_renderer = Some(renderer);
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.engine_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Engine timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.scratch_dir.as_os_str().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "Scratch directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.engine_timeout_secs, 120);
        assert_eq!(c.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(c.stale_output_max_age(), Duration::from_secs(24 * 3600));
        assert!(c.html_renderer.is_none());
    }

    #[test]
    fn build_rejects_zero_timeout() {
        let err = ConversionConfig::builder()
            .engine_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_empty_scratch_dir() {
        assert!(ConversionConfig::builder().scratch_dir("").build().is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let c = ConversionConfig::builder()
            .progress_callback(Arc::new(NoopProgressCallback))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn ConversionProgressCallback>"));
        assert!(dbg.contains("engine_timeout_secs: 120"));
    }
}
