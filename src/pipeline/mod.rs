//! Pipeline stages for PDF-to-image rasterisation.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ engine ──▶ render ──▶ encode ──▶ save
//! (path/URL) (pdfium)  (bitmap)   (png/jpg)  (atomic write)
//! ```
//!
//! 1. [`input`]: canonicalise the path, URL or byte buffer to a local PDF
//!    and reject anything without the `%PDF` magic
//! 2. [`engine`]: bind the pdfium shared library
//! 3. [`render`]: rasterise selected pages and resize them; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 4. [`encode`]: PNG or JPEG bytes from a `DynamicImage`
//! 5. [`save`]: output naming, overwrite policy and atomic writes

pub mod encode;
pub mod engine;
pub mod input;
pub mod render;
pub mod save;
