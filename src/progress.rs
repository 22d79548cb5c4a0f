//! Progress-callback trait for conversion session events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to observe a
//! session as it moves through its states. The CLI uses it to drive a spinner;
//! a host UI can forward the events to whatever it renders.
//!
//! Every method has an empty default body, so implementors only override the
//! events they care about. The trait is `Send + Sync` because several sessions
//! may share one callback when the CLI converts inputs concurrently.
//!
//! # Example
//!
//! ```rust
//! use edgequake_math2word::{ConversionProgressCallback, SessionState};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_state_change(&self, file_name: Option<&str>, from: SessionState, to: SessionState) {
//!         eprintln!("{:?}: {from} -> {to}", file_name);
//!     }
//! }
//!
//! let cb: Arc<dyn ConversionProgressCallback> = Arc::new(Printer);
//! cb.on_state_change(Some("notes.pdf"), SessionState::Idle, SessionState::Processing);
//! ```

use crate::session::SessionState;
use std::sync::Arc;

/// Observer for session lifecycle events.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called after every effective state transition.
    fn on_state_change(&self, file_name: Option<&str>, from: SessionState, to: SessionState) {
        let _ = (file_name, from, to);
    }

    /// Called right before the model request is issued.
    ///
    /// # Arguments
    /// * `file_name`  — name of the uploaded file
    /// * `size_bytes` — raw size of the payload before base64 encoding
    fn on_conversion_start(&self, file_name: &str, size_bytes: u64) {
        let _ = (file_name, size_bytes);
    }

    /// Called when the model returned usable HTML.
    fn on_conversion_complete(&self, file_name: &str, html_len: usize) {
        let _ = (file_name, html_len);
    }

    /// Called when the conversion failed.
    fn on_conversion_error(&self, file_name: &str, error: &str) {
        let _ = (file_name, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
