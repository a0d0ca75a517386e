//! Image encoding: `DynamicImage` → file bytes in the configured format.
//!
//! JPEG has no alpha channel, so pages are flattened to RGB first; pdfium
//! renders onto an opaque white background anyway.

use crate::config::OutputFormat;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page into an in-memory file.
pub fn encode_page(img: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        OutputFormat::Jpeg { quality } => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
        }
    }
    debug!(
        "Encoded {}x{} → {} bytes {}",
        img.width(),
        img.height(),
        buf.len(),
        format.extension()
    );
    Ok(buf)
}

/// Base64 form used for inline HTTP responses.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
