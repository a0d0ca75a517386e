//! pdfium binding.
//!
//! A fresh [`Pdfium`] is bound for every blocking render task and dropped
//! with it, so no pdfium state outlives a call. Lookup order:
//!
//! 1. `PDFIUM_LIB_PATH`, either the library file or a directory holding it
//! 2. the platform library in `./` and `./lib/`
//! 3. the system library search path

use crate::error::Pdf2PngError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at a pdfium library or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to the first pdfium library that loads.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2PngError> {
    let env_value = std::env::var(PDFIUM_LIB_PATH_ENV).ok();
    let mut failures = Vec::new();

    for candidate in library_candidates(env_value.as_deref()) {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => failures.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound system pdfium library");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            failures.push(format!("system library: {:?}", e));
            Err(Pdf2PngError::PdfiumBindingFailed(failures.join("; ")))
        }
    }
}

/// Library paths to try, most specific first.
fn library_candidates(env_value: Option<&str>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(value) = env_value.map(str::trim).filter(|v| !v.is_empty()) {
        let path = Path::new(value);
        if path.is_dir() {
            candidates.push(Pdfium::pdfium_platform_library_name_at_path(path));
        } else {
            candidates.push(path.to_path_buf());
        }
    }

    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./lib/"));
    candidates
}
