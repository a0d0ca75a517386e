//! Input resolution: turn a path, URL or byte buffer into a local PDF file.
//!
//! pdfium opens documents by path, so every input form ends up as a file on
//! disk. Downloads and in-memory buffers are staged in a `tempfile` location
//! owned by [`ResolvedInput`]; dropping it removes the staged copy. The `%PDF`
//! magic is checked here so a stray HTML error page or text file is reported
//! as [`Pdf2PngError::NotAPdf`] rather than a pdfium parse failure.

use crate::error::Pdf2PngError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF file ready for pdfium, plus whatever keeps it alive.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the body lives in a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
    /// Input was an in-memory buffer staged to a temp file.
    Staged(NamedTempFile),
}

impl ResolvedInput {
    /// Path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
            ResolvedInput::Staged(tmp) => tmp.path(),
        }
    }

    /// Human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            ResolvedInput::Local(p) => p.display().to_string(),
            ResolvedInput::Downloaded { path, .. } => format!("download → {}", path.display()),
            ResolvedInput::Staged(_) => "<in-memory buffer>".to_string(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2PngError> {
    if input.trim().is_empty() {
        return Err(Pdf2PngError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

/// Stage an in-memory PDF to a temp file.
pub fn stage_bytes(bytes: &[u8]) -> Result<ResolvedInput, Pdf2PngError> {
    use std::io::Write;

    let mut tmp = tempfile::Builder::new()
        .prefix("pdf2png-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| Pdf2PngError::Internal(format!("tempfile: {e}")))?;

    check_magic(bytes, tmp.path())?;

    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| Pdf2PngError::Internal(format!("tempfile write: {e}")))?;

    debug!("Staged {} bytes at {}", bytes.len(), tmp.path().display());
    Ok(ResolvedInput::Staged(tmp))
}

/// Validate existence, readability and magic bytes of a local file.
fn resolve_local(path: &Path) -> Result<ResolvedInput, Pdf2PngError> {
    let path = path.to_path_buf();

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2PngError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2PngError::FileNotFound { path }),
    };

    if !file.metadata().map(|m| m.is_file()).unwrap_or(false) {
        return Err(Pdf2PngError::InvalidInput {
            input: path.display().to_string(),
        });
    }

    let mut head = Vec::with_capacity(4);
    (&mut file)
        .take(4)
        .read_to_end(&mut head)
        .map_err(|e| Pdf2PngError::Internal(format!("read {}: {e}", path.display())))?;
    check_magic(&head, &path)?;

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Reject buffers that do not start with `%PDF`.
///
/// Buffers shorter than four bytes are rejected too, padded with zeros in the
/// reported magic.
pub(crate) fn check_magic(bytes: &[u8], path: &Path) -> Result<(), Pdf2PngError> {
    if bytes.len() >= 4 && &bytes[..4] == PDF_MAGIC {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(Pdf2PngError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

/// Download a URL into a temporary directory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2PngError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| Pdf2PngError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2PngError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| Pdf2PngError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2PngError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    check_magic(&bytes, &file_path)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Pdf2PngError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment when it looks like a file name, else `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
