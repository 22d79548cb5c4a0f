//! Input resolution: turn a user-supplied path, URL or data URL into a
//! [`SelectedFile`], the raw file a user picked before any validation.
//!
//! A `SelectedFile` mirrors what a browser hands over on drop or file-pick:
//! a name, the bytes, and a declared MIME type. MIME detection prefers what
//! the source declares (data URL header, HTTP `Content-Type`), then magic
//! bytes, then the file extension. Whether the type is acceptable is decided
//! later by [`crate::pipeline::upload`].

use crate::error::Math2WordError;
use crate::pipeline::encode::parse_data_url;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// MIME type used when nothing better can be determined.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// A user-selected file, before validation.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    /// Display name including extension, e.g. `notes.pdf`.
    pub name: String,
    /// Declared or detected MIME type.
    pub mime_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    /// Build a selection from in-memory bytes, detecting the MIME type.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = detect_mime(&name, &bytes);
        Self {
            name,
            mime_type,
            bytes,
        }
    }

    /// Build a selection with an explicit MIME type.
    pub fn with_mime(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Check if the input string is a `data:` URL.
pub fn is_data_url(input: &str) -> bool {
    input.starts_with("data:")
}

/// Resolve the input string to a [`SelectedFile`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SelectedFile, Math2WordError> {
    if is_data_url(input) {
        let (mime, bytes) = parse_data_url(input)?;
        let name = "document".to_string();
        let mime_type = mime.unwrap_or_else(|| detect_mime(&name, &bytes));
        debug!("Resolved data URL: {} bytes, {}", bytes.len(), mime_type);
        Ok(SelectedFile::with_mime(name, mime_type, bytes))
    } else if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input)).await
    }
}

/// Read a local file, mapping I/O failures onto typed errors.
async fn resolve_local(path: &Path) -> Result<SelectedFile, Math2WordError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Math2WordError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => Math2WordError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Math2WordError::InvalidInput {
            input: path.display().to_string(),
            reason: e.to_string(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    debug!("Resolved local file: {} ({} bytes)", path.display(), bytes.len());
    Ok(SelectedFile::from_bytes(name, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SelectedFile, Math2WordError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Math2WordError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Math2WordError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Math2WordError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Math2WordError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(normalise_content_type);
    let name = extract_filename(url);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Math2WordError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    info!("Downloaded {} bytes from {}", bytes.len(), url);

    Ok(match declared {
        Some(mime) => SelectedFile::with_mime(name, mime, bytes),
        None => SelectedFile::from_bytes(name, bytes),
    })
}

/// Lower-case a `Content-Type` header and drop its parameters.
///
/// Generic binary types carry no information and yield `None`.
fn normalise_content_type(value: &str) -> Option<String> {
    let mime = value.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "" | UNKNOWN_MIME | "binary/octet-stream" => None,
        _ => Some(mime),
    }
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "document".to_string()
}

/// Detect a MIME type from magic bytes, falling back to the file extension.
pub fn detect_mime(name: &str, bytes: &[u8]) -> String {
    if bytes.starts_with(b"%PDF") {
        return "application/pdf".to_string();
    }
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    mime_from_extension(name).to_string()
}

fn mime_from_extension(name: &str) -> &'static str {
    let ext = PathBuf::from(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => UNKNOWN_MIME,
    }
}
