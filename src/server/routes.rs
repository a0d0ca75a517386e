//! Request handlers.
//!
//! - `GET  /`                   upload form
//! - `GET  /health`             liveness
//! - `POST /convert`            multipart PDF upload → page images
//! - `GET  /images/:id/:file`   serve a generated image

use super::ServerState;
use crate::config::{OutputFormat, PageSelection, RasterConfig};
use crate::error::Pdf2PngError;
use crate::pipeline::encode;
use crate::prepare::prepare_images_from_bytes;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single safe path component: no separators, no leading dot.
static SAFE_COMPONENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("valid regex"));

const INDEX_HTML: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>pdf2png</title></head>
  <body>
    <h1>PDF → PNG</h1>
    <form action="/convert?inline=false" method="post" enctype="multipart/form-data">
      <input type="file" name="file" accept="application/pdf" required>
      <button type="submit">Convert</button>
    </form>
  </body>
</html>
"#;

/// Error body shared by every handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Query parameters accepted by `POST /convert`.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertQuery {
    pub dpi: Option<u32>,
    pub width: Option<u32>,
    /// Keep the native size at `dpi` instead of resizing.
    #[serde(default)]
    pub keep_size: bool,
    /// `all`, `5`, `3-15` or `1,3,5`.
    pub pages: Option<String>,
    /// `png` (default) or `jpeg`.
    pub format: Option<String>,
    pub quality: Option<u8>,
    /// Embed base64 image data in the response.
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertedPage {
    pub page: usize,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PageFailure {
    pub page: usize,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub id: String,
    pub page_count: usize,
    pub pages: Vec<ConvertedPage>,
    pub errors: Vec<PageFailure>,
}

/// Build the router with state applied.
pub fn router(state: ServerState) -> Router {
    let limit = state.config().body_limit;
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/convert", post(convert))
        .route("/images/:id/:file", get(image))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn convert(
    State(state): State<ServerState>,
    Query(query): Query<ConvertQuery>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let data = read_pdf_field(&mut multipart).await?;
    tracing::debug!("Received {} byte upload", data.len());

    let id = uuid::Uuid::new_v4().simple().to_string();
    let job_dir = state.config().output_root.join(&id);
    let config = build_config(&state, &query, job_dir.clone()).map_err(error_response)?;
    let format = config.format;

    let output = match prepare_images_from_bytes(&data, &config).await {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Conversion {} failed: {}", id, e);
            let _ = tokio::fs::remove_dir_all(&job_dir).await;
            return Err(error_response(e));
        }
    };

    let mut pages = Vec::with_capacity(output.pages.len());
    let mut errors = Vec::new();
    for page in &output.pages {
        if let Some(ref e) = page.error {
            errors.push(PageFailure {
                page: page.page_num,
                error: e.to_string(),
            });
            continue;
        }
        let file_name = page
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let data = if query.inline {
            let bytes = tokio::fs::read(&page.path).await.map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::with_details("Failed to read page image", e.to_string())),
                )
            })?;
            Some(encode::to_base64(&bytes))
        } else {
            None
        };
        pages.push(ConvertedPage {
            page: page.page_num,
            url: format!("/images/{}/{}", id, file_name),
            width: page.width,
            height: page.height,
            content_type: format.mime_type().to_string(),
            data,
        });
    }

    tracing::info!(
        "Conversion {}: {} pages written, {} failed",
        id,
        pages.len(),
        errors.len()
    );

    Ok(Json(ConvertResponse {
        id,
        page_count: output.metadata.page_count,
        pages,
        errors,
    }))
}

async fn image(
    State(state): State<ServerState>,
    Path((id, file)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    if !is_safe_component(&id) || !is_safe_component(&file) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid image path")),
        ));
    }

    let content_type = match file.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        _ => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Not an image")),
            ))
        }
    };

    let path = state.config().output_root.join(&id).join(&file);
    let bytes = tokio::fs::read(&path).await.map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Image '{}/{}' not found", id, file))),
        )
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        bytes,
    )
        .into_response())
}

/// Pull the bytes of the `file` (or `pdf`) multipart field.
async fn read_pdf_field(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details("Failed to read upload", e.to_string())),
        )
    })? {
        let name = field.name().unwrap_or("").to_string();
        if name != "file" && name != "pdf" {
            tracing::debug!("Ignoring multipart field '{}'", name);
            continue;
        }
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_details("Failed to read file data", e.to_string())),
            )
        })?;
        return Ok(data.to_vec());
    }

    Err((
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(
            "Missing upload: send the PDF in a multipart field named 'file'",
        )),
    ))
}

fn build_config(
    state: &ServerState,
    query: &ConvertQuery,
    output_dir: std::path::PathBuf,
) -> Result<RasterConfig, Pdf2PngError> {
    let defaults = state.config();
    let width = if query.keep_size {
        None
    } else {
        query.width.or(defaults.default_width)
    };
    let pages: PageSelection = query.pages.as_deref().unwrap_or("all").parse()?;
    let format = OutputFormat::parse(
        query.format.as_deref().unwrap_or("png"),
        query.quality.unwrap_or(90),
    )?;

    RasterConfig::builder()
        .dpi(query.dpi.unwrap_or(defaults.default_dpi))
        .width(width)
        .pages(pages)
        .format(format)
        .output_dir(output_dir)
        .build()
}

fn is_safe_component(s: &str) -> bool {
    SAFE_COMPONENT.is_match(s) && !s.contains("..")
}

fn error_status(e: &Pdf2PngError) -> StatusCode {
    match e {
        Pdf2PngError::FileNotFound { .. }
        | Pdf2PngError::PermissionDenied { .. }
        | Pdf2PngError::InvalidInput { .. }
        | Pdf2PngError::DownloadFailed { .. }
        | Pdf2PngError::DownloadTimeout { .. }
        | Pdf2PngError::NotAPdf { .. }
        | Pdf2PngError::CorruptPdf { .. }
        | Pdf2PngError::PasswordRequired { .. }
        | Pdf2PngError::WrongPassword { .. }
        | Pdf2PngError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        Pdf2PngError::PageOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Pdf2PngError::AllPagesFailed { .. }
        | Pdf2PngError::PartialFailure { .. }
        | Pdf2PngError::OutputWriteFailed { .. }
        | Pdf2PngError::PdfiumBindingFailed(_)
        | Pdf2PngError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: Pdf2PngError) -> ApiError {
    let status = error_status(&e);
    let summary = match status {
        StatusCode::BAD_REQUEST => "Invalid request",
        StatusCode::UNPROCESSABLE_ENTITY => "No pages selected",
        _ => "Conversion failed",
    };
    (status, Json(ErrorResponse::with_details(summary, e.to_string())))
}
