//! Page image → base64 PNG attachment for vision requests.
//!
//! PNG keeps glyph edges intact; JPEG artefacts around small digits are
//! enough to turn an `8` into a `6` on a grade table. `detail: "high"` asks
//! the provider to tile the image instead of downsampling it to one overview
//! tile.

use crate::error::ReportError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode page `page` (1-based, for error reporting) as a PNG attachment.
pub fn encode_page(page: usize, img: &DynamicImage) -> Result<ImageData, ReportError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ReportError::Rasterisation {
            page,
            detail: format!("PNG encoding failed: {}", e),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!("Page {}: {} bytes PNG → {} bytes base64", page, buf.len(), b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
