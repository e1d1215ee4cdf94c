//! Progress-callback trait for dispatch events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to observe
//! which strategies a conversion tries, and in what order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docconv::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for FailureCounter {
//!     fn on_attempt_failed(&self, strategy: &str, error: &str) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{strategy} failed: {error}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(FailureCounter { failed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::format::DocumentFormat;
use std::sync::Arc;

/// Called by the dispatcher as it walks a strategy chain.
///
/// Implementations must be `Send + Sync`: a shared [`crate::Converter`] may
/// run many conversions at once, and events from different requests can
/// interleave. All methods have default no-op implementations.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the chain for the pair has been resolved.
    ///
    /// # Arguments
    /// * `from`, `to`: the requested pair
    /// * `strategies`: number of strategies in the chain
    fn on_conversion_start(&self, from: DocumentFormat, to: DocumentFormat, strategies: usize) {
        let _ = (from, to, strategies);
    }

    /// Called before each strategy runs.
    ///
    /// # Arguments
    /// * `strategy`: strategy name
    /// * `attempt`: 1-indexed position in the chain
    /// * `total`: chain length
    fn on_attempt_start(&self, strategy: &str, attempt: usize, total: usize) {
        let _ = (strategy, attempt, total);
    }

    /// Called when a strategy fails and the dispatcher moves on.
    fn on_attempt_failed(&self, strategy: &str, error: &str) {
        let _ = (strategy, error);
    }

    /// Called once per dispatched request.
    fn on_conversion_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
