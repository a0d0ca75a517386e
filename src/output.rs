//! Result types returned by the rasterisation entry points.

use crate::error::{PageError, Pdf2PngError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything produced by one call to [`crate::prepare_images`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterOutput {
    /// Per-page results, sorted by `page_num`.
    pub pages: Vec<PageResult>,
    pub metadata: DocumentMetadata,
    pub stats: RasterStats,
}

impl RasterOutput {
    /// Paths of the images present on disk after the run, in page order.
    ///
    /// Includes pages kept under [`crate::OverwritePolicy::Skip`].
    pub fn paths(&self) -> Vec<&Path> {
        self.pages
            .iter()
            .filter(|p| p.error.is_none())
            .map(|p| p.path.as_path())
            .collect()
    }

    /// Page-level errors, in page order.
    pub fn errors(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }

    /// Treat any page failure as fatal.
    pub fn into_result(self) -> Result<Self, Pdf2PngError> {
        let failed = self.stats.failed_pages;
        if failed > 0 {
            let total = self.pages.len();
            return Err(Pdf2PngError::PartialFailure {
                success: total - failed,
                failed,
                total,
            });
        }
        Ok(self)
    }
}

/// Outcome for a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Where the image was (or would have been) written.
    pub path: PathBuf,
    /// Final image width in pixels (0 on failure or skip).
    pub width: u32,
    /// Final image height in pixels (0 on failure or skip).
    pub height: u32,
    /// Size of the file on disk.
    pub bytes_written: u64,
    /// The file already existed and was left untouched.
    pub skipped: bool,
    /// Render + encode + write time.
    pub duration_ms: u64,
    pub error: Option<PageError>,
}

impl PageResult {
    pub(crate) fn failed(page_num: usize, path: PathBuf, duration_ms: u64, error: PageError) -> Self {
        Self {
            page_num,
            path,
            width: 0,
            height: 0,
            bytes_written: 0,
            skipped: false,
            duration_ms,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RasterStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages selected for rasterisation.
    pub selected_pages: usize,
    /// Pages freshly written.
    pub written_pages: usize,
    /// Pages kept because the output already existed.
    pub skipped_pages: usize,
    pub failed_pages: usize,
    pub total_bytes: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
}

impl RasterStats {
    pub(crate) fn from_pages(
        pages: &[PageResult],
        total_pages: usize,
        total_duration_ms: u64,
        render_duration_ms: u64,
    ) -> Self {
        Self {
            total_pages,
            selected_pages: pages.len(),
            written_pages: pages.iter().filter(|p| p.is_ok() && !p.skipped).count(),
            skipped_pages: pages.iter().filter(|p| p.skipped).count(),
            failed_pages: pages.iter().filter(|p| !p.is_ok()).count(),
            total_bytes: pages.iter().map(|p| p.bytes_written).sum(),
            total_duration_ms,
            render_duration_ms,
        }
    }
}

/// Document information read from the PDF without rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_page(n: usize, skipped: bool) -> PageResult {
        PageResult {
            page_num: n,
            path: PathBuf::from(format!("image/{n}.png")),
            width: 600,
            height: 776,
            bytes_written: 1000,
            skipped,
            duration_ms: 5,
            error: None,
        }
    }

    fn output(pages: Vec<PageResult>) -> RasterOutput {
        let stats = RasterStats::from_pages(&pages, 3, 20, 15);
        RasterOutput {
            pages,
            metadata: DocumentMetadata::default(),
            stats,
        }
    }

    #[test]
    fn stats_count_each_outcome() {
        let pages = vec![
            ok_page(1, false),
            ok_page(2, true),
            PageResult::failed(
                3,
                PathBuf::from("image/3.png"),
                1,
                PageError::RenderFailed {
                    page: 3,
                    detail: "x".into(),
                },
            ),
        ];
        let stats = RasterStats::from_pages(&pages, 3, 20, 15);
        assert_eq!(stats.selected_pages, 3);
        assert_eq!(stats.written_pages, 1);
        assert_eq!(stats.skipped_pages, 1);
        assert_eq!(stats.failed_pages, 1);
        assert_eq!(stats.total_bytes, 2000);
    }

    #[test]
    fn paths_exclude_failed_pages() {
        let out = output(vec![
            ok_page(1, false),
            PageResult::failed(
                2,
                PathBuf::from("image/2.png"),
                1,
                PageError::EncodeFailed {
                    page: 2,
                    detail: "x".into(),
                },
            ),
            ok_page(3, false),
        ]);
        let paths: Vec<_> = out.paths().iter().map(|p| p.to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("image/1.png"), PathBuf::from("image/3.png")]
        );
        assert_eq!(out.errors().count(), 1);
    }

    #[test]
    fn into_result_flags_partial_failure() {
        let out = output(vec![
            ok_page(1, false),
            PageResult::failed(
                2,
                PathBuf::from("image/2.png"),
                1,
                PageError::RenderFailed {
                    page: 2,
                    detail: "x".into(),
                },
            ),
        ]);
        match out.into_result() {
            Err(Pdf2PngError::PartialFailure { success, failed, total }) => {
                assert_eq!((success, failed, total), (1, 1, 2));
            }
            other => panic!("expected PartialFailure, got {other:?}"),
        }

        assert!(output(vec![ok_page(1, false)]).into_result().is_ok());
    }
}
