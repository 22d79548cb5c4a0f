//! # edgequake-math2word
//!
//! Convert PDFs and images to Word documents with editable equations using a
//! Vision Language Model (VLM).
//!
//! ## Why this crate?
//!
//! Math-heavy documents lose their equations in every plain OCR tool: formulae
//! come out as garbled text or as pictures. Here the VLM reads the document and
//! writes semantic HTML with Presentation MathML for every formula. Word imports
//! MathML from an HTML document tagged `application/msword`, turning each formula
//! into a native, editable equation.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input    local file, URL, or data: URL
//!  ├─ 2. Upload   MIME allow-list (image/*, application/pdf) + preview handle
//!  ├─ 3. Encode   raw bytes → base64
//!  ├─ 4. VLM      one request, temperature 0.1, strict HTML+MathML rules
//!  ├─ 5. Polish   strip stray code fences
//!  └─ 6. Export   Word envelope → <name>.doc
//! ```
//!
//! A [`SessionController`] sequences the steps through a four-state machine
//! (idle → processing → success/error).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_math2word::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // GEMINI_API_KEY must be set.
//!     let config = ConversionConfig::default();
//!     let path = convert_to_file("notes.pdf", ".", &config).await?;
//!     eprintln!("wrote {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `math2word` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod preview;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::ConversionClient;
pub use config::{ConversionConfig, ConversionConfigBuilder, HtmlPolicy, DOCUMENTED_MAX_UPLOAD_BYTES};
pub use convert::{convert, convert_from_bytes, convert_selected, convert_sync, convert_to_file};
pub use error::{ErrorKind, Math2WordError};
pub use output::{ConversionOutput, ConversionStats, WordDocument};
pub use pipeline::export::{DirectorySink, DownloadSink};
pub use pipeline::input::SelectedFile;
pub use pipeline::llm::{ApiKey, LlmBackend, VisionBackend, VisionRequest, VisionResponse};
pub use pipeline::upload::{UploadKind, UploadedFile, Uploader};
pub use preview::{ObjectUrlRegistry, PreviewAllocator, PreviewUrl};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{Session, SessionController, SessionEvent, SessionSnapshot, SessionState, Ticket};
