//! Uploader: validate a [`SelectedFile`] and turn it into an [`UploadedFile`].
//!
//! Only `image/*` and `application/pdf` are accepted. A rejected selection
//! produces a validation error and nothing else: no preview is allocated and
//! the caller's selection callback is never invoked. There is no retry; the
//! user has to pick another file.

use crate::error::Math2WordError;
use crate::pipeline::input::SelectedFile;
use crate::preview::{PreviewAllocator, PreviewUrl};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// What kind of document was uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Image,
    Pdf,
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadKind::Image => f.write_str("image"),
            UploadKind::Pdf => f.write_str("pdf"),
        }
    }
}

/// Map a MIME type onto the accepted kinds. `None` means "reject".
pub fn classify_mime(mime_type: &str) -> Option<UploadKind> {
    let mime = mime_type.trim().to_ascii_lowercase();
    if mime == "application/pdf" {
        Some(UploadKind::Pdf)
    } else if mime.starts_with("image/") {
        Some(UploadKind::Image)
    } else {
        None
    }
}

/// A validated upload, owning its preview handle.
///
/// Dropping the value releases the preview.
#[derive(Debug)]
pub struct UploadedFile {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
    kind: UploadKind,
    preview: PreviewUrl,
}

impl UploadedFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn kind(&self) -> UploadKind {
        self.kind
    }

    pub fn preview_url(&self) -> &str {
        self.preview.as_str()
    }
}

/// Validates selections and allocates their preview handles.
pub struct Uploader {
    allocator: Arc<dyn PreviewAllocator>,
    max_bytes: Option<u64>,
}

impl Uploader {
    pub fn new(allocator: Arc<dyn PreviewAllocator>) -> Self {
        Self {
            allocator,
            max_bytes: None,
        }
    }

    /// Reject files larger than `limit` bytes.
    pub fn with_max_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_bytes = limit;
        self
    }

    /// Check a selection without allocating anything.
    pub fn validate(&self, file: &SelectedFile) -> Result<UploadKind, Math2WordError> {
        let kind = classify_mime(&file.mime_type).ok_or_else(|| Math2WordError::UnsupportedFileType {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
        })?;

        if let Some(limit) = self.max_bytes {
            if file.size() > limit {
                return Err(Math2WordError::FileTooLarge {
                    name: file.name.clone(),
                    size: file.size(),
                    limit,
                });
            }
        }
        Ok(kind)
    }

    /// Validate a selection and build the [`UploadedFile`].
    pub fn accept(&self, file: SelectedFile) -> Result<UploadedFile, Math2WordError> {
        let kind = match self.validate(&file) {
            Ok(kind) => kind,
            Err(e) => {
                warn!("Rejected '{}': {}", file.name, e);
                return Err(e);
            }
        };

        let preview = PreviewUrl::allocate(&self.allocator, &file.name, &file.mime_type);
        info!("Accepted '{}' as {} ({} bytes)", file.name, kind, file.size());
        Ok(UploadedFile {
            name: file.name,
            mime_type: file.mime_type,
            bytes: file.bytes,
            kind,
            preview,
        })
    }

    /// Validate a selection and hand the upload to `on_select`.
    ///
    /// On rejection the callback is not invoked and the error is returned.
    pub fn select<F>(&self, file: SelectedFile, on_select: F) -> Result<(), Math2WordError>
    where
        F: FnOnce(UploadedFile),
    {
        let uploaded = self.accept(file)?;
        on_select(uploaded);
        Ok(())
    }
}
