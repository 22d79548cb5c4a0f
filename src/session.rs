//! Session controller: the four-state machine that sequences upload,
//! conversion and export.
//!
//! ```text
//!            file selected            resolves
//!   Idle ─────────────────▶ Processing ─────────▶ Success
//!    ▲                          │                    │
//!    │                    fails │                    │ clear
//!    │                          ▼                    │
//!    └──────── clear/retry ── Error ◀────────────────┘
//! ```
//!
//! All state lives in one [`Session`] value and changes only through the pure
//! [`Session::transition`] function, driven from a single owner
//! ([`SessionController`]). Each accepted file gets a fresh [`Ticket`]; a
//! conversion result carrying an older ticket is dropped, so a response that
//! arrives after the user cleared the session can never resurrect it.
//!
//! "Retry" only returns to Idle. It does not resubmit the previous file; the
//! user selects a file again.

use crate::client::ConversionClient;
use crate::config::ConversionConfig;
use crate::error::{ErrorKind, Math2WordError};
use crate::output::{ConversionOutput, WordDocument};
use crate::pipeline::export::{build_word_document, preview_page, DownloadSink};
use crate::pipeline::input::SelectedFile;
use crate::pipeline::upload::{UploadKind, UploadedFile, Uploader};
use crate::preview::PreviewAllocator;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The four session states. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Processing => "processing",
            SessionState::Success => "success",
            SessionState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Identifies one conversion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// Inputs to the state machine.
#[derive(Debug)]
pub enum SessionEvent {
    /// A validated upload was selected.
    FileSelected(UploadedFile),
    /// The conversion for `ticket` produced output.
    ConversionResolved {
        ticket: Ticket,
        output: ConversionOutput,
    },
    /// The conversion for `ticket` failed.
    ConversionFailed {
        ticket: Ticket,
        kind: ErrorKind,
        message: String,
    },
    /// Drop file, output and error; back to Idle.
    Clear,
    /// Leave the Error state; back to Idle without resubmitting.
    Retry,
}

impl SessionEvent {
    fn label(&self) -> &'static str {
        match self {
            SessionEvent::FileSelected(_) => "file_selected",
            SessionEvent::ConversionResolved { .. } => "conversion_resolved",
            SessionEvent::ConversionFailed { .. } => "conversion_failed",
            SessionEvent::Clear => "clear",
            SessionEvent::Retry => "retry",
        }
    }
}

/// Complete session state.
///
/// Invariants (checked by [`Session::is_consistent`]):
/// - Processing, Success and Error hold a file; Idle holds none.
/// - Success holds an output.
/// - Error holds a non-empty message.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    file: Option<UploadedFile>,
    output: Option<ConversionOutput>,
    error: Option<String>,
    error_kind: Option<ErrorKind>,
    generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    pub fn output(&self) -> Option<&ConversionOutput> {
        self.output.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    /// Ticket of the conversion currently in flight, if any.
    pub fn pending_ticket(&self) -> Option<Ticket> {
        (self.state == SessionState::Processing).then_some(Ticket(self.generation))
    }

    /// Download is offered only while there is output to export.
    pub fn can_download(&self) -> bool {
        self.output.is_some()
    }

    pub fn is_consistent(&self) -> bool {
        let file_ok = match self.state {
            SessionState::Idle => self.file.is_none(),
            _ => self.file.is_some(),
        };
        let output_ok = self.state != SessionState::Success || self.output.is_some();
        let error_ok = self.state != SessionState::Error
            || self.error.as_deref().is_some_and(|m| !m.trim().is_empty());
        file_ok && output_ok && error_ok
    }

    /// Apply `event`, returning the next session.
    ///
    /// Events that do not apply to the current state are ignored and the
    /// session is returned unchanged (apart from dropping whatever the event
    /// carried).
    pub fn transition(mut self, event: SessionEvent) -> Session {
        let label = event.label();
        match (self.state, event) {
            (SessionState::Idle, SessionEvent::FileSelected(file)) => {
                self.generation += 1;
                self.file = Some(file);
                self.output = None;
                self.error = None;
                self.error_kind = None;
                self.state = SessionState::Processing;
            }
            (SessionState::Processing, SessionEvent::ConversionResolved { ticket, output })
                if ticket == Ticket(self.generation) =>
            {
                self.output = Some(output);
                self.state = SessionState::Success;
            }
            (SessionState::Processing, SessionEvent::ConversionFailed { ticket, kind, message })
                if ticket == Ticket(self.generation) =>
            {
                self.error = Some(if message.trim().is_empty() {
                    "Conversion failed. Please try again.".to_string()
                } else {
                    message
                });
                self.error_kind = Some(kind);
                self.state = SessionState::Error;
            }
            (
                SessionState::Processing | SessionState::Success | SessionState::Error,
                SessionEvent::Clear,
            )
            | (SessionState::Error, SessionEvent::Retry) => {
                self.generation += 1;
                self.reset();
            }
            (state, SessionEvent::ConversionResolved { ticket, .. })
            | (state, SessionEvent::ConversionFailed { ticket, .. }) => {
                debug!(
                    "Ignoring stale {} for {:?} (state {}, current generation {})",
                    label, ticket, state, self.generation
                );
            }
            (state, _) => {
                debug!("Ignoring {} in state {}", label, state);
            }
        }
        debug_assert!(self.is_consistent(), "session invariants violated: {self:?}");
        self
    }

    fn reset(&mut self) {
        // Dropping the file releases its preview handle.
        self.file = None;
        self.output = None;
        self.error = None;
        self.error_kind = None;
        self.state = SessionState::Idle;
    }
}

/// Serializable view of a session, for JSON output and host UIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub kind: Option<UploadKind>,
    pub preview_url: Option<String>,
    pub output: Option<ConversionOutput>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl From<&Session> for SessionSnapshot {
    fn from(s: &Session) -> Self {
        Self {
            state: s.state,
            file_name: s.file.as_ref().map(|f| f.name().to_string()),
            mime_type: s.file.as_ref().map(|f| f.mime_type().to_string()),
            kind: s.file.as_ref().map(|f| f.kind()),
            preview_url: s.file.as_ref().map(|f| f.preview_url().to_string()),
            output: s.output.clone(),
            error: s.error.clone(),
            error_kind: s.error_kind,
        }
    }
}

/// Owns a [`Session`] and drives it with the uploader, client and exporter.
pub struct SessionController {
    session: Session,
    uploader: Uploader,
    client: ConversionClient,
    progress: Option<ProgressCallback>,
    last_error: Option<Math2WordError>,
}

impl SessionController {
    pub fn new(config: ConversionConfig, previews: Arc<dyn PreviewAllocator>) -> Self {
        let uploader = Uploader::new(previews).with_max_bytes(config.max_upload_bytes);
        let progress = config.progress_callback.clone();
        Self {
            session: Session::new(),
            uploader,
            client: ConversionClient::new(config),
            progress,
            last_error: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&self.session)
    }

    pub fn client(&self) -> &ConversionClient {
        &self.client
    }

    /// Feed one event through the state machine and notify observers.
    pub fn dispatch(&mut self, event: SessionEvent) -> SessionState {
        let from = self.session.state();
        self.session = std::mem::take(&mut self.session).transition(event);
        let to = self.session.state();

        if from != to {
            info!("Session: {} → {}", from, to);
            if let Some(ref cb) = self.progress {
                cb.on_state_change(self.session.file().map(|f| f.name()), from, to);
            }
        }
        to
    }

    /// Validate a selection and, if accepted, move to Processing.
    ///
    /// A rejected file leaves the session untouched and returns the
    /// validation error. Selections outside Idle are refused the same way the
    /// uploader is unavailable while a document is being processed.
    pub fn select_file(&mut self, selected: SelectedFile) -> Result<Ticket, Math2WordError> {
        if self.session.state() != SessionState::Idle {
            return Err(Math2WordError::SelectionUnavailable {
                state: self.session.state().to_string(),
            });
        }
        let uploaded = self.uploader.accept(selected)?;
        self.last_error = None;
        self.dispatch(SessionEvent::FileSelected(uploaded));
        self.session
            .pending_ticket()
            .ok_or_else(|| Math2WordError::Internal("no pending conversion after selection".into()))
    }

    /// Run the pending conversion, if any, and apply its result.
    pub async fn run_conversion(&mut self) -> SessionState {
        let Some(ticket) = self.session.pending_ticket() else {
            warn!("run_conversion called with no pending conversion");
            return self.session.state();
        };
        let Some(file) = self.session.file() else {
            return self.session.state();
        };

        let name = file.name().to_string();
        if let Some(ref cb) = self.progress {
            cb.on_conversion_start(&name, file.size());
        }
        let result = self.client.convert(file).await;
        self.complete(ticket, result)
    }

    /// Apply the result of the conversion identified by `ticket`.
    ///
    /// Hosts that run [`ConversionClient::convert`] themselves report back
    /// through here; results for a superseded ticket are ignored.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<ConversionOutput, Math2WordError>,
    ) -> SessionState {
        let name = self
            .session
            .file()
            .map(|f| f.name().to_string())
            .unwrap_or_default();
        let current = self.session.pending_ticket() == Some(ticket);

        let event = match result {
            Ok(output) => {
                if current {
                    if let Some(ref cb) = self.progress {
                        cb.on_conversion_complete(&name, output.html().len());
                    }
                }
                SessionEvent::ConversionResolved { ticket, output }
            }
            Err(e) => {
                let message = e.display_message();
                let kind = e.kind();
                if current {
                    warn!("Conversion of '{}' failed: {}", name, message);
                    if let Some(ref cb) = self.progress {
                        cb.on_conversion_error(&name, &message);
                    }
                    self.last_error = Some(e);
                }
                SessionEvent::ConversionFailed {
                    ticket,
                    kind,
                    message,
                }
            }
        };
        self.dispatch(event)
    }

    /// Select a file and convert it in one step.
    pub async fn submit(&mut self, selected: SelectedFile) -> Result<SessionState, Math2WordError> {
        self.select_file(selected)?;
        Ok(self.run_conversion().await)
    }

    /// Typed error behind the current Error state, if any.
    pub fn last_error(&self) -> Option<&Math2WordError> {
        self.last_error.as_ref()
    }

    /// Consume the controller, yielding the output of a Success or the error
    /// of an Error state.
    pub fn into_result(mut self) -> Result<ConversionOutput, Math2WordError> {
        match self.session.state() {
            SessionState::Success => self
                .session
                .output()
                .cloned()
                .ok_or_else(|| Math2WordError::Internal("success without output".into())),
            SessionState::Error => Err(self.last_error.take().unwrap_or_else(|| {
                Math2WordError::Service {
                    message: self.session.error().unwrap_or_default().to_string(),
                }
            })),
            state => Err(Math2WordError::Internal(format!(
                "conversion not finished (session is {state})"
            ))),
        }
    }

    pub fn clear(&mut self) -> SessionState {
        self.last_error = None;
        self.dispatch(SessionEvent::Clear)
    }

    pub fn retry(&mut self) -> SessionState {
        if self.session.state() == SessionState::Error {
            self.last_error = None;
        }
        self.dispatch(SessionEvent::Retry)
    }

    /// Build the Word artifact for the current output, if there is one.
    pub fn export(&self) -> Option<WordDocument> {
        let output = self.session.output()?;
        let name = self.session.file().map(|f| f.name()).unwrap_or_default();
        Some(build_word_document(output.html(), name))
    }

    /// Export and hand the artifact to `sink`. No state change.
    pub async fn download(&self, sink: &dyn DownloadSink) -> Result<PathBuf, Math2WordError> {
        let doc = self.export().ok_or(Math2WordError::NothingToExport)?;
        sink.deliver(&doc).await
    }

    /// Standalone HTML page showing the current output.
    pub fn preview_html(&self) -> Option<String> {
        let output = self.session.output()?;
        let name = self.session.file().map(|f| f.name()).unwrap_or_default();
        Some(preview_page(output.html(), name))
    }
}
