//! End-to-end integration tests for pdf2png.
//!
//! Tests that need a real pdfium library are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly requested.
//! Most of them build a small PDF in memory; the `test_cases/` ones also need
//! the file to be present.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture

use futures::StreamExt;
use pdf2png::{
    inspect, prepare_images, prepare_images_from_bytes, prepare_stream, OutputFormat,
    OverwritePolicy, PageSelection, Pdf2PngError, RasterConfig, RasterProgressCallback,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set, or (with a path) the file is missing.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
    ($path:expr) => {{
        e2e_skip_unless_ready!();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// A blank PDF with `pages` US Letter pages (612 × 792 pt).
fn blank_pdf(pages: usize) -> Vec<u8> {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages)
                .map(|i| format!("{} 0 R", i + 3))
                .collect::<Vec<_>>()
                .join(" "),
            pages
        ),
    ];
    for _ in 0..pages {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string());
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}

fn write_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, blank_pdf(pages)).unwrap();
    path
}

fn image_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|d| {
            d.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

// ── Failure paths (no pdfium needed) ─────────────────────────────────────────

#[tokio::test]
async fn test_missing_file_reports_path() {
    let root = tempfile::tempdir().unwrap();
    let out = root.path().join("image");
    let config = RasterConfig::builder().output_dir(&out).build().unwrap();

    let err = prepare_images(root.path().join("nope.pdf").to_str().unwrap(), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Pdf2PngError::FileNotFound { .. }));
    assert!(err.to_string().contains("nope.pdf"));
    assert!(!out.exists(), "no output directory on failure");
}

#[tokio::test]
async fn test_non_pdf_bytes_rejected() {
    let root = tempfile::tempdir().unwrap();
    let out = root.path().join("image");
    let config = RasterConfig::builder().output_dir(&out).build().unwrap();

    let err = prepare_images_from_bytes(b"\x89PNG\r\n\x1a\n", &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Pdf2PngError::NotAPdf { .. }));
    assert!(image_files(&out).is_empty());
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    let err = inspect("/definitely/not/here.pdf").await.unwrap_err();
    assert!(matches!(err, Pdf2PngError::FileNotFound { .. }));
}

#[test]
fn test_page_selection_out_of_range_is_empty() {
    let sel: PageSelection = "20-30".parse().unwrap();
    assert!(sel.to_indices(5).is_empty());
}

// ── Rendering (live pdfium) ──────────────────────────────────────────────────

#[tokio::test]
async fn test_default_run_writes_numbered_pngs() {
    e2e_skip_unless_ready!();
    let root = tempfile::tempdir().unwrap();
    let pdf = write_pdf(root.path(), "letter.pdf", 3);
    let out = root.path().join("image");
    let config = RasterConfig::builder().output_dir(&out).build().unwrap();

    let output = prepare_images(pdf.to_str().unwrap(), &config).await.unwrap();

    assert_eq!(output.metadata.page_count, 3);
    assert_eq!(output.stats.written_pages, 3);
    assert_eq!(image_files(&out), vec!["1.png", "2.png", "3.png"]);
    let expected: Vec<PathBuf> = (1..=3).map(|n| out.join(format!("{n}.png"))).collect();
    let paths: Vec<PathBuf> = output.paths().iter().map(|p| p.to_path_buf()).collect();
    assert_eq!(paths, expected);

    let img = image::open(out.join("1.png")).unwrap();
    assert_eq!(img.width(), 600);
    // ~2550 × 3300 at 300 DPI, scaled to 600 wide; pdfium may round the
    // bitmap by a pixel.
    assert!((775..=777).contains(&img.height()), "height {}", img.height());
    for page in &output.pages {
        assert_eq!((page.width, page.height), (img.width(), img.height()));
    }
}

#[tokio::test]
async fn test_page_selection_and_prefix() {
    e2e_skip_unless_ready!();
    let root = tempfile::tempdir().unwrap();
    let pdf = write_pdf(root.path(), "doc.pdf", 4);
    let out = root.path().join("pages");
    let config = RasterConfig::builder()
        .output_dir(&out)
        .file_prefix("page-")
        .pages(PageSelection::Set(vec![4, 2]))
        .width(Some(200))
        .dpi(72)
        .build()
        .unwrap();

    let output = prepare_images(pdf.to_str().unwrap(), &config).await.unwrap();

    assert_eq!(output.stats.selected_pages, 2);
    assert_eq!(image_files(&out), vec!["page-2.png", "page-4.png"]);
    let nums: Vec<_> = output.pages.iter().map(|p| p.page_num).collect();
    assert_eq!(nums, vec![2, 4]);
}

#[tokio::test]
async fn test_no_resize_keeps_dpi_size() {
    e2e_skip_unless_ready!();
    let root = tempfile::tempdir().unwrap();
    let pdf = write_pdf(root.path(), "doc.pdf", 1);
    let out = root.path().join("image");
    let config = RasterConfig::builder()
        .output_dir(&out)
        .dpi(72)
        .width(None)
        .build()
        .unwrap();

    let output = prepare_images(pdf.to_str().unwrap(), &config).await.unwrap();
    assert_eq!((output.pages[0].width, output.pages[0].height), (612, 792));
}

#[tokio::test]
async fn test_selection_past_end_is_fatal() {
    e2e_skip_unless_ready!();
    let root = tempfile::tempdir().unwrap();
    let pdf = write_pdf(root.path(), "doc.pdf", 2);
    let out = root.path().join("image");
    let config = RasterConfig::builder()
        .output_dir(&out)
        .pages(PageSelection::Single(5))
        .build()
        .unwrap();

    let err = prepare_images(pdf.to_str().unwrap(), &config)
        .await
        .unwrap_err();

    match err {
        Pdf2PngError::PageOutOfRange { page, total } => assert_eq!((page, total), (5, 2)),
        other => panic!("expected PageOutOfRange, got {other:?}"),
    }
    assert!(!out.exists());
}

#[tokio::test]
async fn test_skip_existing_keeps_files() {
    e2e_skip_unless_ready!();
    let root = tempfile::tempdir().unwrap();
    let pdf = write_pdf(root.path(), "doc.pdf", 2);
    let out = root.path().join("image");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("1.png"), b"keep me").unwrap();

    let config = RasterConfig::builder()
        .output_dir(&out)
        .overwrite(OverwritePolicy::Skip)
        .build()
        .unwrap();
    let output = prepare_images(pdf.to_str().unwrap(), &config).await.unwrap();

    assert_eq!(output.stats.skipped_pages, 1);
    assert_eq!(output.stats.written_pages, 1);
    assert_eq!(std::fs::read(out.join("1.png")).unwrap(), b"keep me");
    assert_eq!(image_files(&out), vec!["1.png", "2.png"]);
}

#[tokio::test]
async fn test_jpeg_output() {
    e2e_skip_unless_ready!();
    let root = tempfile::tempdir().unwrap();
    let out = root.path().join("image");
    let config = RasterConfig::builder()
        .output_dir(&out)
        .format(OutputFormat::Jpeg { quality: 80 })
        .build()
        .unwrap();

    let output = prepare_images_from_bytes(&blank_pdf(1), &config)
        .await
        .unwrap();

    assert_eq!(image_files(&out), vec!["1.jpg"]);
    assert!(output.pages[0].bytes_written > 0);
    let bytes = std::fs::read(out.join("1.jpg")).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_stream_yields_pages_in_order() {
    e2e_skip_unless_ready!();
    let root = tempfile::tempdir().unwrap();
    let pdf = write_pdf(root.path(), "doc.pdf", 3);
    let config = RasterConfig::builder()
        .output_dir(root.path().join("image"))
        .dpi(72)
        .build()
        .unwrap();

    let mut stream = prepare_stream(pdf.to_str().unwrap(), &config).await.unwrap();
    let mut seen = Vec::new();
    while let Some(item) = stream.next().await {
        let page = item.unwrap();
        assert!(page.path.exists(), "page is on disk when yielded");
        seen.push(page.page_num);
    }
    assert_eq!(seen, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_progress_callback_counts() {
    e2e_skip_unless_ready!();

    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
        completed: AtomicUsize,
    }
    impl RasterProgressCallback for Counter {
        fn on_start(&self, total_pages: usize) {
            self.started.store(total_pages, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _page: usize, _total: usize, _bytes: u64) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    let root = tempfile::tempdir().unwrap();
    let counter = Arc::new(Counter::default());
    let config = RasterConfig::builder()
        .output_dir(root.path().join("image"))
        .dpi(72)
        .progress_callback(counter.clone() as Arc<dyn RasterProgressCallback>)
        .build()
        .unwrap();

    prepare_images_from_bytes(&blank_pdf(2), &config)
        .await
        .unwrap();

    assert_eq!(counter.started.load(Ordering::SeqCst), 2);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_inspect_counts_pages() {
    e2e_skip_unless_ready!();
    let root = tempfile::tempdir().unwrap();
    let pdf = write_pdf(root.path(), "doc.pdf", 5);

    let meta = inspect(pdf.to_str().unwrap()).await.unwrap();
    assert_eq!(meta.page_count, 5);
    assert!(!meta.pdf_version.is_empty());
}

// ── Real-world documents (test_cases/) ───────────────────────────────────────

#[tokio::test]
async fn test_sample_document() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let root = tempfile::tempdir().unwrap();
    let out = root.path().join("image");
    let config = RasterConfig::builder().output_dir(&out).build().unwrap();

    let output = prepare_images(path.to_str().unwrap(), &config)
        .await
        .expect("sample.pdf should rasterise");

    assert_eq!(output.stats.failed_pages, 0);
    assert_eq!(output.paths().len(), output.metadata.page_count);
    for p in output.paths() {
        let img = image::open(p).unwrap();
        assert_eq!(img.width(), 600);
    }
    assert!(
        !image_files(&out).iter().any(|n| n.ends_with(".tmp")),
        "no temporary files left behind"
    );
    println!("{}", serde_json::to_string_pretty(&output.stats).unwrap());
}
