//! Page rasterisation: turn a [`SourceDocument`] into one image per page.
//!
//! PDFs go through pdfium; raster uploads are decoded with `image` and
//! count as a single page. Both are CPU-bound and run inside
//! `tokio::task::spawn_blocking` so recognition of other documents keeps
//! moving while a large scan is decoded.
//!
//! `max_rendered_pixels` caps the longest edge regardless of DPI, which keeps
//! memory bounded for oversized pages and phone photos alike.

use crate::error::ReportError;
use crate::pipeline::input::{FileKind, SourceDocument};
use image::imageops::FilterType;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Environment variable pointing at an existing libpdfium (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Rasterisation settings taken from the pipeline config.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub password: Option<String>,
}

/// Rasterise every page of `doc`, in page order.
pub async fn render_document(
    doc: &SourceDocument,
    options: &RenderOptions,
) -> Result<Vec<DynamicImage>, ReportError> {
    let bytes = doc.bytes.clone();
    let kind = doc.kind();
    let options = options.clone();

    tokio::task::spawn_blocking(move || match kind {
        FileKind::Pdf => render_pdf_blocking(&bytes, &options),
        FileKind::Image => decode_image_blocking(&bytes, options.max_rendered_pixels).map(|i| vec![i]),
    })
    .await
    .map_err(|e| ReportError::Internal(format!("Render task panicked: {}", e)))?
}

fn bind_pdfium() -> Result<Pdfium, ReportError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ReportError::PdfiumBinding(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn render_pdf_blocking(bytes: &[u8], options: &RenderOptions) -> Result<Vec<DynamicImage>, ReportError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, options.password.as_deref())
        .map_err(|e| ReportError::Rasterisation {
            page: 1,
            detail: format!("cannot open PDF: {:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let max = options.max_rendered_pixels as i32;
    let mut images = Vec::with_capacity(total_pages);

    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ReportError::Rasterisation {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let target_width = (page.width().value / 72.0 * options.dpi as f32).round() as i32;
        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width.clamp(1, max))
            .set_maximum_width(max)
            .set_maximum_height(max);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ReportError::Rasterisation {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}

fn decode_image_blocking(bytes: &[u8], max_pixels: u32) -> Result<DynamicImage, ReportError> {
    let image = image::load_from_memory(bytes).map_err(|e| ReportError::Rasterisation {
        page: 1,
        detail: e.to_string(),
    })?;
    Ok(cap_dimensions(image, max_pixels))
}

/// Downscale so neither edge exceeds `max_pixels`, keeping the aspect ratio.
fn cap_dimensions(image: DynamicImage, max_pixels: u32) -> DynamicImage {
    if image.width() <= max_pixels && image.height() <= max_pixels {
        return image;
    }
    debug!(
        "Downscaling {}x{} image to fit {} px",
        image.width(),
        image.height(),
        max_pixels
    );
    image.resize(max_pixels, max_pixels, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn options() -> RenderOptions {
        RenderOptions {
            dpi: 300,
            max_rendered_pixels: 100,
            password: None,
        }
    }

    #[tokio::test]
    async fn image_upload_is_one_page() {
        let doc = SourceDocument::new("card.png", png_bytes(20, 10)).unwrap();
        let pages = render_document(&doc, &options()).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!((pages[0].width(), pages[0].height()), (20, 10));
    }

    #[tokio::test]
    async fn oversized_image_is_capped() {
        let doc = SourceDocument::new("card.png", png_bytes(400, 200)).unwrap();
        let pages = render_document(&doc, &options()).await.unwrap();
        assert_eq!((pages[0].width(), pages[0].height()), (100, 50));
    }

    #[tokio::test]
    async fn undecodable_image_is_a_recognition_failure() {
        let doc = SourceDocument::new("card.jpg", b"not an image".to_vec()).unwrap();
        let err = render_document(&doc, &options()).await.unwrap_err();
        assert!(matches!(err, ReportError::Rasterisation { page: 1, .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Recognition);
    }
}
