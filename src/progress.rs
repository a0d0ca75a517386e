//! Progress-callback trait for per-page rasterisation events.
//!
//! Inject an [`Arc<dyn RasterProgressCallback>`] via
//! [`crate::config::RasterConfigBuilder::progress_callback`] to receive
//! events as each page is rendered and written.
//!
//! Callbacks are invoked from the blocking render thread, so implementations
//! must be `Send + Sync` and should return quickly.
//!
//! # Example
//!
//! ```rust
//! use pdf2png::{RasterConfig, RasterProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl RasterProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, bytes: u64) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} written ({} bytes)", page_num, total_pages, bytes);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//!
//! let config = RasterConfig::builder()
//!     .progress_callback(counter as Arc<dyn RasterProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait RasterProgressCallback: Send + Sync {
    /// Called once the document is open and the selection is known.
    fn on_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is rendered.
    ///
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: number of selected pages
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page image has been written (or kept, when skipped).
    ///
    /// * `bytes`: size of the encoded file on disk
    fn on_page_complete(&self, page_num: usize, total_pages: usize, bytes: u64) {
        let _ = (page_num, total_pages, bytes);
    }

    /// Called when a page fails to render or save.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all selected pages have been attempted.
    fn on_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RasterProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RasterConfig`].
pub type ProgressCallback = Arc<dyn RasterProgressCallback>;
