//! Streaming API: emit each page as soon as its image is on disk.
//!
//! Unlike [`crate::prepare::prepare_images`], which returns only after the
//! last page, [`prepare_stream`] yields [`PageResult`]s through a `Stream`
//! in page order. Dropping the stream stops the renderer after the page it is
//! currently working on.

use crate::config::RasterConfig;
use crate::error::{PageError, Pdf2PngError};
use crate::output::PageResult;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::render::{self, RenderJob};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageResult, PageError>> + Send>>;

/// Buffered pages between the render thread and the consumer.
const CHANNEL_CAPACITY: usize = 4;

/// Rasterise a PDF, streaming pages as they are written.
///
/// Input resolution, opening the document and validating the page selection
/// all happen before this returns, so those failures come back as
/// `Err(Pdf2PngError)` rather than inside the stream.
pub async fn prepare_stream(
    input_str: impl AsRef<str>,
    config: &RasterConfig,
) -> Result<PageStream, Pdf2PngError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming rasterisation: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    spawn_stream(resolved, config).await
}

async fn spawn_stream(
    resolved: ResolvedInput,
    config: &RasterConfig,
) -> Result<PageStream, Pdf2PngError> {
    let job = RenderJob::new(resolved.path(), config);
    let (page_tx, page_rx) = mpsc::channel::<PageResult>(CHANNEL_CAPACITY);
    let (ready_tx, ready_rx) = oneshot::channel::<Result<(), Pdf2PngError>>();

    tokio::task::spawn_blocking(move || {
        // Keeps a staged or downloaded file alive until rendering is done.
        let _resolved = resolved;
        let mut ready_tx = Some(ready_tx);

        let outcome = render::run_blocking(&job, |page| {
            if let Some(tx) = ready_tx.take() {
                let _ = tx.send(Ok(()));
            }
            page_tx.blocking_send(page).is_ok()
        });

        match (outcome, ready_tx.take()) {
            (Err(e), Some(tx)) => {
                let _ = tx.send(Err(e));
            }
            (Err(e), None) => warn!("Render stopped: {}", e),
            (Ok(_), Some(tx)) => {
                let _ = tx.send(Ok(()));
            }
            (Ok(_), None) => {}
        }
    });

    ready_rx
        .await
        .map_err(|_| Pdf2PngError::Internal("Render task ended without reporting".into()))??;

    let stream = ReceiverStream::new(page_rx).map(|page| match page.error.clone() {
        None => Ok(page),
        Some(e) => Err(e),
    });
    Ok(Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fatal_errors_surface_before_streaming() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("gone.pdf");
        let result = prepare_stream(missing.to_str().unwrap(), &RasterConfig::default()).await;
        assert!(matches!(result, Err(Pdf2PngError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn non_pdf_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let txt = root.path().join("a.txt");
        std::fs::write(&txt, "hello").unwrap();
        let result = prepare_stream(txt.to_str().unwrap(), &RasterConfig::default()).await;
        assert!(matches!(result, Err(Pdf2PngError::NotAPdf { .. })));
    }
}
