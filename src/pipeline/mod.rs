//! Pipeline stages for document-to-Word conversion.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ upload ──▶ encode ──▶ llm ──▶ postprocess ──▶ export
//! (path/URL) (MIME)    (base64)   (VLM)   (fences)        (.doc)
//! ```
//!
//! 1. [`input`]  — read a local file, download a URL, or decode a `data:` URL
//! 2. [`upload`] — accept only `image/*` and `application/pdf`; allocate a preview
//! 3. [`encode`] — base64 the raw bytes for the multimodal request body
//! 4. [`llm`]    — the single VLM call; the only stage with network I/O
//! 5. [`postprocess`] — strip code fences, optionally strip active content
//! 6. [`export`] — wrap the fragment in the Word envelope and write it out

pub mod encode;
pub mod export;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod upload;
