//! Error types for the edgequake-math2word library.
//!
//! Every failure the library can report is a [`Math2WordError`]. Each variant
//! belongs to exactly one [`ErrorKind`], the fixed taxonomy the session state
//! machine works with:
//!
//! * [`ErrorKind::Validation`] — the selected file was rejected (wrong type,
//!   too large). Reported synchronously; the session does not change state.
//! * [`ErrorKind::Configuration`] — something the caller must fix before a
//!   request can be made, such as a missing API key. Raised before any network
//!   traffic.
//! * [`ErrorKind::Service`] — the remote model or the network failed. The
//!   provider's own message is passed through unchanged.
//! * [`ErrorKind::EmptyResult`] — the model answered but produced no usable text.
//!
//! Input resolution and artifact delivery add [`ErrorKind::Io`]; anything else
//! is [`ErrorKind::Internal`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-math2word library.
#[derive(Debug, Error)]
pub enum Math2WordError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The file's MIME type is neither `image/*` nor `application/pdf`.
    #[error("Unsupported file type '{mime_type}' for '{name}'\nOnly images and PDF documents are supported.")]
    UnsupportedFileType { name: String, mime_type: String },

    /// The file exceeds the configured upload ceiling.
    #[error("File '{name}' is {size} bytes, above the {limit}-byte limit")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// A file was selected while the session is not accepting uploads.
    #[error("Cannot select a file while the session is {state}\nClear the session first.")]
    SelectionUnavailable { state: String },

    // ── Configuration errors ──────────────────────────────────────────────
    /// The API key environment variable is unset or empty.
    #[error("API key is missing.\nSet {env_var} before converting.")]
    MissingCredential { env_var: String },

    /// The configured provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Service errors ────────────────────────────────────────────────────
    /// The remote model call failed; `message` is the provider's own text.
    #[error("{message}")]
    Service { message: String },

    /// The remote model call did not answer in time.
    #[error("Model call timed out after {secs}s")]
    ServiceTimeout { secs: u64 },

    // ── Empty result ──────────────────────────────────────────────────────
    /// The model returned no textual content.
    #[error("No content generated.")]
    EmptyResult,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a file path, a URL, or a data URL.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Could not create or write the exported document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An operation needed a conversion output and the session has none.
    #[error("Nothing to export: the session has no conversion output")]
    NothingToExport,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The fixed error taxonomy seen by the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Configuration,
    Service,
    EmptyResult,
    Io,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Service => "service",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl Math2WordError {
    /// Classify this error into the session-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFileType { .. }
            | Self::FileTooLarge { .. }
            | Self::SelectionUnavailable { .. } => ErrorKind::Validation,
            Self::MissingCredential { .. }
            | Self::ProviderNotConfigured { .. }
            | Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::Service { .. } | Self::ServiceTimeout { .. } => ErrorKind::Service,
            Self::EmptyResult => ErrorKind::EmptyResult,
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::InvalidInput { .. }
            | Self::DownloadFailed { .. }
            | Self::DownloadTimeout { .. }
            | Self::OutputWriteFailed { .. }
            | Self::NothingToExport => ErrorKind::Io,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message suitable for the session's error slot.
    ///
    /// Never empty: a provider that fails with a blank message still yields a
    /// readable fallback.
    pub fn display_message(&self) -> String {
        let msg = self.to_string();
        if msg.trim().is_empty() {
            "Conversion failed. Please try again.".to_string()
        } else {
            msg
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_passes_message_through() {
        let e = Math2WordError::Service {
            message: "quota exceeded".into(),
        };
        assert_eq!(e.to_string(), "quota exceeded");
        assert_eq!(e.kind(), ErrorKind::Service);
    }

    #[test]
    fn blank_service_message_gets_fallback() {
        let e = Math2WordError::Service {
            message: "   ".into(),
        };
        assert_eq!(e.display_message(), "Conversion failed. Please try again.");
    }

    #[test]
    fn missing_credential_names_variable() {
        let e = Math2WordError::MissingCredential {
            env_var: "GEMINI_API_KEY".into(),
        };
        assert!(e.to_string().contains("GEMINI_API_KEY"));
        assert_eq!(e.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn unsupported_type_is_validation() {
        let e = Math2WordError::UnsupportedFileType {
            name: "notes.txt".into(),
            mime_type: "text/plain".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert!(e.to_string().contains("text/plain"));
    }

    #[test]
    fn empty_result_kind() {
        assert_eq!(Math2WordError::EmptyResult.kind(), ErrorKind::EmptyResult);
        assert_eq!(ErrorKind::EmptyResult.to_string(), "empty_result");
    }
}
