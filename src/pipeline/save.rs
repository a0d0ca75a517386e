//! Output naming and atomic writes.
//!
//! Each page goes to `<dir>/<prefix><n>.<ext>` with a 1-indexed `n`. Bytes
//! are written to a hidden `.<name>.<ext>.*.tmp` sibling and moved into
//! place, so a reader never observes a half-written image and a failed page
//! leaves nothing at its final path.

use crate::config::{OutputFormat, OverwritePolicy};
use crate::error::{PageError, Pdf2PngError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What happened to a page's output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new file of `bytes` bytes was written.
    Written { bytes: u64 },
    /// An existing file of `bytes` bytes was kept.
    Skipped { bytes: u64 },
}

impl SaveOutcome {
    pub fn bytes(&self) -> u64 {
        match self {
            SaveOutcome::Written { bytes } | SaveOutcome::Skipped { bytes } => *bytes,
        }
    }
}

/// Output file for a 1-indexed page.
pub fn output_path(dir: &Path, prefix: &str, page_num: usize, format: OutputFormat) -> PathBuf {
    dir.join(format!("{}{}.{}", prefix, page_num, format.extension()))
}

/// Create the output directory (and parents) when missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), Pdf2PngError> {
    std::fs::create_dir_all(dir).map_err(|e| Pdf2PngError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Whether the policy lets `path` be produced at all, checked before the
/// page is rendered so skipped pages cost nothing.
pub fn precheck(path: &Path, policy: OverwritePolicy, page_num: usize) -> Result<Option<SaveOutcome>, PageError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => match policy {
            OverwritePolicy::Overwrite => Ok(None),
            OverwritePolicy::Skip => {
                debug!("Keeping existing {}", path.display());
                Ok(Some(SaveOutcome::Skipped { bytes: meta.len() }))
            }
            OverwritePolicy::Fail => Err(PageError::OutputExists {
                page: page_num,
                path: path.to_path_buf(),
            }),
        },
        Ok(_) => Err(PageError::WriteFailed {
            page: page_num,
            path: path.to_path_buf(),
            detail: "a non-file entry is in the way".into(),
        }),
        Err(_) => Ok(None),
    }
}

/// Write `bytes` to `path` through a temp sibling, then move it into place.
///
/// `Overwrite` replaces whatever is at `path`. `Skip` and `Fail` never
/// replace an existing file, even one that appeared after [`precheck`].
pub fn write_atomic(
    path: &Path,
    bytes: &[u8],
    page_num: usize,
    policy: OverwritePolicy,
) -> Result<SaveOutcome, PageError> {
    let write_failed = |detail: String| PageError::WriteFailed {
        page: page_num,
        path: path.to_path_buf(),
        detail,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| write_failed(e.to_string()))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| write_failed(e.to_string()))?;

    let persisted = match policy {
        OverwritePolicy::Overwrite => tmp.persist(path),
        OverwritePolicy::Skip | OverwritePolicy::Fail => tmp.persist_noclobber(path),
    };

    // A failed persist drops the temp file with the error.
    if let Err(e) = persisted {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            return match policy {
                OverwritePolicy::Skip => {
                    debug!("{} appeared during render; keeping it", path.display());
                    let bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                    Ok(SaveOutcome::Skipped { bytes })
                }
                _ => Err(PageError::OutputExists {
                    page: page_num,
                    path: path.to_path_buf(),
                }),
            };
        }
        return Err(write_failed(e.error.to_string()));
    }

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(SaveOutcome::Written {
        bytes: bytes.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_dir_prefix_number_ext() {
        let p = output_path(Path::new("image"), "", 1, OutputFormat::Png);
        assert_eq!(p, PathBuf::from("image/1.png"));

        let p = output_path(
            Path::new("out"),
            "page-",
            12,
            OutputFormat::Jpeg { quality: 90 },
        );
        assert_eq!(p, PathBuf::from("out/page-12.jpg"));
    }

    #[test]
    fn ensure_output_dir_creates_nested() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a/b/image");
        ensure_output_dir(&dir).unwrap();
        assert!(dir.is_dir());
        ensure_output_dir(&dir).unwrap();
    }

    #[test]
    fn write_atomic_leaves_no_temp_file() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("1.png");
        let outcome = write_atomic(&path, b"abc", 1, OverwritePolicy::Overwrite).unwrap();
        assert_eq!(outcome, SaveOutcome::Written { bytes: 3 });
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");

        let leftovers: Vec<_> = std::fs::read_dir(root.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_atomic_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("1.png");
        std::fs::write(&path, b"old").unwrap();
        write_atomic(&path, b"new!", 1, OverwritePolicy::Overwrite).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new!");
    }

    #[test]
    fn write_into_missing_dir_fails_cleanly() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("missing/1.png");
        let err = write_atomic(&path, b"abc", 1, OverwritePolicy::Overwrite).unwrap_err();
        assert!(matches!(err, PageError::WriteFailed { page: 1, .. }));
        assert!(!path.exists());
    }

    #[test]
    fn fail_policy_never_replaces_a_late_file() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("4.png");
        assert_eq!(precheck(&path, OverwritePolicy::Fail, 4), Ok(None));

        // Another writer gets there between the check and the write.
        std::fs::write(&path, b"theirs").unwrap();

        let err = write_atomic(&path, b"ours", 4, OverwritePolicy::Fail).unwrap_err();
        assert!(matches!(err, PageError::OutputExists { page: 4, .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"theirs");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn skip_policy_keeps_a_late_file() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("5.png");
        std::fs::write(&path, b"theirs").unwrap();

        let outcome = write_atomic(&path, b"ours", 5, OverwritePolicy::Skip).unwrap();
        assert_eq!(outcome, SaveOutcome::Skipped { bytes: 6 });
        assert_eq!(std::fs::read(&path).unwrap(), b"theirs");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn fail_policy_writes_when_path_is_free() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("6.png");
        let outcome = write_atomic(&path, b"ours", 6, OverwritePolicy::Fail).unwrap();
        assert_eq!(outcome, SaveOutcome::Written { bytes: 4 });
        assert_eq!(std::fs::read(&path).unwrap(), b"ours");
    }

    #[test]
    fn precheck_honours_policy() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("2.png");

        assert_eq!(precheck(&path, OverwritePolicy::Fail, 2), Ok(None));

        std::fs::write(&path, b"12345").unwrap();
        assert_eq!(precheck(&path, OverwritePolicy::Overwrite, 2), Ok(None));
        assert_eq!(
            precheck(&path, OverwritePolicy::Skip, 2),
            Ok(Some(SaveOutcome::Skipped { bytes: 5 }))
        );
        assert!(matches!(
            precheck(&path, OverwritePolicy::Fail, 2),
            Err(PageError::OutputExists { page: 2, .. })
        ));
    }

    #[test]
    fn precheck_rejects_directory_in_the_way() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("3.png");
        std::fs::create_dir(&path).unwrap();
        assert!(matches!(
            precheck(&path, OverwritePolicy::Overwrite, 3),
            Err(PageError::WriteFailed { .. })
        ));
    }
}
