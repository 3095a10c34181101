//! Input resolution: turn a user-supplied path or URL into a [`SourceDocument`].
//!
//! A document is identified by its filename and byte content. The file
//! extension decides how pages reach the recogniser: PDFs are rasterised page
//! by page, raster images are decoded as a single page. Anything else is
//! rejected before any bytes are read.

use crate::error::ReportError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Upload kinds the pipeline can route to recognition.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".pdf", ".png", ".jpg", ".jpeg", ".tiff", ".bmp"];

/// How a document's pages are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Multi-page, rasterised via pdfium.
    Pdf,
    /// Single raster image.
    Image,
}

impl FileKind {
    /// Classify a lower-case extension including the dot (`".png"`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".pdf" => Some(FileKind::Pdf),
            ".png" | ".jpg" | ".jpeg" | ".tiff" | ".bmp" => Some(FileKind::Image),
            _ => None,
        }
    }
}

/// A document received for extraction.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    kind: FileKind,
    file_type: String,
}

impl SourceDocument {
    /// Wrap in-memory content, rejecting unsupported extensions.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ReportError> {
        let filename = filename.into();
        let (kind, file_type) = classify(&filename)?;
        Ok(Self {
            filename,
            bytes,
            kind,
            file_type,
        })
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Lower-case extension with the leading dot, e.g. `".pdf"`.
    pub fn file_type(&self) -> &str {
        &self.file_type
    }
}

fn classify(filename: &str) -> Result<(FileKind, String), ReportError> {
    let extension = extension_of(filename);
    match FileKind::from_extension(&extension) {
        Some(kind) => Ok((kind, extension)),
        None => Err(ReportError::UnsupportedFileType {
            filename: filename.to_string(),
            extension,
        }),
    }
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or URL into a [`SourceDocument`].
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<SourceDocument, ReportError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<SourceDocument, ReportError> {
    let path = PathBuf::from(path_str);
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path_str)
        .to_string();

    // Reject by extension before touching the file.
    classify(&filename)?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ReportError::FileNotFound { path: path.clone() }
        } else {
            ReportError::Input(format!("Cannot read '{}': {}", path.display(), e))
        }
    })?;

    debug!("Read {} ({} bytes)", path.display(), bytes.len());
    SourceDocument::new(filename, bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, ReportError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        let reason = if e.is_timeout() {
            format!("timed out after {timeout_secs}s")
        } else {
            e.to_string()
        };
        ReportError::DownloadFailed {
            url: url.to_string(),
            reason,
        }
    })?;

    if !response.status().is_success() {
        return Err(ReportError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = filename_for(url, content_type.as_deref());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} ({} bytes)", filename, bytes.len());
    SourceDocument::new(filename, bytes.to_vec())
}

/// Pick a filename from the URL path, or from the content type when the
/// path has no extension.
fn filename_for(url: &str, content_type: Option<&str>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    let mime = content_type
        .and_then(|c| c.split(';').next())
        .map(|c| c.trim().to_ascii_lowercase());
    let ext = match mime.as_deref() {
        Some("application/pdf") => "pdf",
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        Some("image/tiff") => "tiff",
        Some("image/bmp") => "bmp",
        _ => "bin",
    };
    format!("downloaded.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/card.pdf"));
        assert!(is_url("http://example.com/card.png"));
        assert!(!is_url("/tmp/card.pdf"));
        assert!(!is_url("card.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn kinds_by_extension() {
        let pdf = SourceDocument::new("Card.PDF", vec![]).unwrap();
        assert_eq!(pdf.kind(), FileKind::Pdf);
        assert_eq!(pdf.file_type(), ".pdf");

        for name in ["a.png", "a.jpg", "a.jpeg", "a.tiff", "a.bmp"] {
            assert_eq!(SourceDocument::new(name, vec![]).unwrap().kind(), FileKind::Image);
        }
        assert_eq!(SUPPORTED_EXTENSIONS.len(), 6);
    }

    #[test]
    fn unsupported_extension_is_bad_input() {
        let err = SourceDocument::new("notes.docx", vec![]).unwrap_err();
        match &err {
            ReportError::UnsupportedFileType { extension, .. } => assert_eq!(extension, ".docx"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            err.kind().failure_class(),
            crate::error::FailureClass::BadInput
        );
        assert!(SourceDocument::new("no_extension", vec![]).is_err());
    }

    #[test]
    fn filename_from_url_or_content_type() {
        assert_eq!(filename_for("https://x.org/a/card.png?x=1", None), "card.png");
        assert_eq!(
            filename_for("https://x.org/download", Some("application/pdf; charset=binary")),
            "downloaded.pdf"
        );
        assert_eq!(filename_for("https://x.org/", None), "downloaded.bin");
    }

    #[tokio::test]
    async fn local_file_is_read() {
        let mut f = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        f.write_all(b"fake image").unwrap();
        let doc = load_document(f.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.bytes, b"fake image");
        assert_eq!(doc.file_type(), ".png");
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = load_document("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, ReportError::FileNotFound { .. }));
    }
}
