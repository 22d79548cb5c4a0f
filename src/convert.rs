//! One-shot conversion entry points.
//!
//! Each function runs a fresh [`SessionController`] through
//! Idle → Processing → Success/Error for a single input and reports the
//! outcome. Use [`SessionController`] directly when the session has to
//! outlive a single conversion (preview, clear, retry).

use crate::config::ConversionConfig;
use crate::error::Math2WordError;
use crate::output::ConversionOutput;
use crate::pipeline::export::DirectorySink;
use crate::pipeline::input::{self, SelectedFile};
use crate::preview::ObjectUrlRegistry;
use crate::session::{SessionController, SessionState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Convert a local file, URL or `data:` URL to an HTML fragment.
///
/// # Example
/// ```rust,no_run
/// use edgequake_math2word::{convert, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Reads GEMINI_API_KEY at call time.
/// let output = convert("notes.pdf", &ConversionConfig::default()).await?;
/// println!("{}", output.html());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// Input resolution errors, validation errors for unsupported files, and
/// every conversion failure (configuration, service, empty result).
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Math2WordError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let selected = input::resolve_input(input_str, config.download_timeout_secs).await?;
    convert_selected(selected, config).await
}

/// Convert in-memory bytes. The MIME type is detected from the bytes and name.
pub async fn convert_from_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Math2WordError> {
    convert_selected(SelectedFile::from_bytes(name, bytes), config).await
}

/// Convert an already-resolved selection.
pub async fn convert_selected(
    selected: SelectedFile,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Math2WordError> {
    let start = Instant::now();
    let mut controller = SessionController::new(config.clone(), Arc::new(ObjectUrlRegistry::new()));
    let state = controller.submit(selected).await?;
    info!(
        "Conversion finished: {} in {}ms",
        state,
        start.elapsed().as_millis()
    );
    controller.into_result()
}

/// Convert an input and write `<base-name>.doc` into `out_dir`.
///
/// Returns the path of the written document.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    out_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<PathBuf, Math2WordError> {
    let selected = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let mut controller = SessionController::new(config.clone(), Arc::new(ObjectUrlRegistry::new()));

    if controller.submit(selected).await? != SessionState::Success {
        return Err(controller.into_result().err().unwrap_or(Math2WordError::NothingToExport));
    }
    controller
        .download(&DirectorySink::new(out_dir.as_ref()))
        .await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Math2WordError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Math2WordError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}
