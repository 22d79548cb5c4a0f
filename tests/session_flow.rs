//! Session-level integration tests with a recording mock backend.
//!
//! No network: every conversion goes through `MockBackend`, which returns a
//! canned answer and counts how often it was called.

use async_trait::async_trait;
use edgequake_math2word::{
    convert_from_bytes, ConversionConfig, ConversionProgressCallback, DirectorySink, ErrorKind,
    HtmlPolicy, Math2WordError, ObjectUrlRegistry, PreviewAllocator, SelectedFile,
    SessionController, SessionState, VisionBackend, VisionRequest, VisionResponse,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Each test sets its own variable so parallel tests never race on it.
fn with_key(var: &str) -> String {
    std::env::set_var(var, "test-key");
    var.to_string()
}

enum Answer {
    Text(&'static str),
    Fail(&'static str),
    Nothing,
}

struct MockBackend {
    answer: Answer,
    calls: AtomicUsize,
    last_request: Mutex<Option<VisionRequest>>,
}

impl MockBackend {
    fn new(answer: Answer) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> VisionRequest {
        self.last_request.lock().unwrap().clone().expect("no request recorded")
    }
}

#[async_trait]
impl VisionBackend for MockBackend {
    fn name(&self) -> String {
        "mock/vision".into()
    }

    async fn generate(&self, request: &VisionRequest) -> Result<VisionResponse, Math2WordError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match self.answer {
            Answer::Text(t) => Ok(VisionResponse {
                text: Some(t.to_string()),
                input_tokens: 120,
                output_tokens: 40,
            }),
            Answer::Fail(msg) => Err(Math2WordError::Service {
                message: msg.to_string(),
            }),
            Answer::Nothing => Ok(VisionResponse::default()),
        }
    }
}

/// Counts allocations and releases per handle.
#[derive(Default)]
struct CountingPreviews {
    allocated: AtomicUsize,
    released: Mutex<Vec<String>>,
}

impl PreviewAllocator for CountingPreviews {
    fn allocate(&self, name: &str, _mime_type: &str) -> String {
        let n = self.allocated.fetch_add(1, Ordering::SeqCst);
        format!("preview://{n}/{name}")
    }

    fn release(&self, url: &str) {
        self.released.lock().unwrap().push(url.to_string());
    }
}

fn config(backend: Arc<MockBackend>, key_var: &str) -> ConversionConfig {
    ConversionConfig::builder()
        .backend(backend)
        .api_key_env(key_var)
        .build()
        .unwrap()
}

fn pdf(name: &str) -> SelectedFile {
    SelectedFile::with_mime(name, "application/pdf", b"%PDF-1.7 test".to_vec())
}

fn png(name: &str) -> SelectedFile {
    SelectedFile::with_mime(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_converts_and_downloads_as_doc() {
    let key = with_key("MATH2WORD_TEST_KEY_PDF");
    let backend = MockBackend::new(Answer::Text("<p>Hello</p>"));
    let mut controller = SessionController::new(
        config(backend.clone(), &key),
        Arc::new(ObjectUrlRegistry::new()),
    );

    let state = controller.submit(pdf("notes.pdf")).await.unwrap();
    assert_eq!(state, SessionState::Success);
    assert_eq!(backend.calls(), 1);

    let output = controller.session().output().unwrap();
    assert_eq!(output.html(), "<p>Hello</p>");
    assert_eq!(output.stats().backend, "mock/vision");
    assert_eq!(output.stats().input_tokens, 120);

    let dir = tempfile::tempdir().unwrap();
    let path = controller
        .download(&DirectorySink::new(dir.path()))
        .await
        .unwrap();
    assert_eq!(path.file_name().unwrap(), "notes.doc");
    let body = std::fs::read_to_string(&path).unwrap();
    assert!(body.contains("xmlns:m='http://schemas.microsoft.com/office/2004/12/omml'"));
    assert!(body.contains("<p>Hello</p>"));

    // Download does not change state.
    assert_eq!(controller.state(), SessionState::Success);
}

#[tokio::test]
async fn request_carries_document_and_instructions() {
    let key = with_key("MATH2WORD_TEST_KEY_REQUEST");
    let backend = MockBackend::new(Answer::Text("<p>x</p>"));
    let mut controller = SessionController::new(
        config(backend.clone(), &key),
        Arc::new(ObjectUrlRegistry::new()),
    );
    controller.submit(pdf("notes.pdf")).await.unwrap();

    let req = backend.last_request();
    assert_eq!(req.mime_type, "application/pdf");
    assert_eq!(req.data_base64, "JVBERi0xLjcgdGVzdA==");
    assert!(!req.data_base64.starts_with("data:"));
    assert_eq!(req.prompt, "Convert this document into HTML with MathML for equations.");
    assert!(req.system_instruction.contains("MathML"));
    assert!((req.temperature - 0.1).abs() < f32::EPSILON);
}

#[tokio::test]
async fn key_from_custom_variable_reaches_backend() {
    std::env::set_var("MATH2WORD_TEST_CUSTOM_KEY_VAR", "custom-secret");
    let backend = MockBackend::new(Answer::Text("<p>x</p>"));
    let mut controller = SessionController::new(
        config(backend.clone(), "MATH2WORD_TEST_CUSTOM_KEY_VAR"),
        Arc::new(ObjectUrlRegistry::new()),
    );

    controller.submit(pdf("notes.pdf")).await.unwrap();
    let req = backend.last_request();
    assert_eq!(req.api_key.expose(), "custom-secret");
    assert!(!format!("{req:?}").contains("custom-secret"));
}

#[tokio::test]
async fn fenced_answer_is_unwrapped() {
    let key = with_key("MATH2WORD_TEST_KEY_FENCE");
    let backend = MockBackend::new(Answer::Text("```html\n<p>x</p>\n```"));
    let mut controller =
        SessionController::new(config(backend, &key), Arc::new(ObjectUrlRegistry::new()));

    controller.submit(pdf("fenced.pdf")).await.unwrap();
    let output = controller.session().output().unwrap();
    assert_eq!(output.html(), "<p>x</p>");
    assert_eq!(output.raw_text(), "```html\n<p>x</p>\n```");
}

#[tokio::test]
async fn strip_active_policy_removes_scripts() {
    let key = with_key("MATH2WORD_TEST_KEY_SANITIZE");
    let backend = MockBackend::new(Answer::Text("<p onclick=\"x()\">a</p><script>x()</script>"));
    let cfg = ConversionConfig::builder()
        .backend(backend)
        .api_key_env(&key)
        .html_policy(HtmlPolicy::StripActive)
        .build()
        .unwrap();
    let mut controller = SessionController::new(cfg, Arc::new(ObjectUrlRegistry::new()));

    controller.submit(png("scan.png")).await.unwrap();
    let html = controller.session().output().unwrap().html();
    assert!(!html.contains("<script"));
    assert!(!html.contains("onclick"));
    assert!(html.contains(">a</p>"));
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn service_failure_shows_provider_message() {
    let key = with_key("MATH2WORD_TEST_KEY_QUOTA");
    let backend = MockBackend::new(Answer::Fail("quota exceeded"));
    let mut controller = SessionController::new(
        config(backend.clone(), &key),
        Arc::new(ObjectUrlRegistry::new()),
    );

    let state = controller.submit(png("scan.png")).await.unwrap();
    assert_eq!(state, SessionState::Error);
    assert_eq!(controller.session().error(), Some("quota exceeded"));
    assert_eq!(controller.session().error_kind(), Some(ErrorKind::Service));
    assert!(controller.export().is_none());
    assert!(matches!(
        controller.download(&DirectorySink::new(".")).await,
        Err(Math2WordError::NothingToExport)
    ));
}

#[tokio::test]
async fn missing_credential_never_calls_backend() {
    let var = "MATH2WORD_TEST_KEY_DEFINITELY_UNSET";
    std::env::remove_var(var);
    let backend = MockBackend::new(Answer::Text("<p>x</p>"));
    let mut controller = SessionController::new(
        config(backend.clone(), var),
        Arc::new(ObjectUrlRegistry::new()),
    );

    let state = controller.submit(pdf("notes.pdf")).await.unwrap();
    assert_eq!(state, SessionState::Error);
    assert_eq!(backend.calls(), 0);
    assert_eq!(
        controller.session().error_kind(),
        Some(ErrorKind::Configuration)
    );
    assert!(controller.session().error().unwrap().contains(var));
    assert!(matches!(
        controller.last_error(),
        Some(Math2WordError::MissingCredential { .. })
    ));
}

#[tokio::test]
async fn empty_answer_is_an_error() {
    let key = with_key("MATH2WORD_TEST_KEY_EMPTY");
    let backend = MockBackend::new(Answer::Nothing);
    let mut controller =
        SessionController::new(config(backend, &key), Arc::new(ObjectUrlRegistry::new()));

    assert_eq!(
        controller.submit(pdf("blank.pdf")).await.unwrap(),
        SessionState::Error
    );
    assert_eq!(controller.session().error(), Some("No content generated."));
    assert_eq!(
        controller.session().error_kind(),
        Some(ErrorKind::EmptyResult)
    );
}

#[tokio::test]
async fn fence_only_answer_is_an_error() {
    let key = with_key("MATH2WORD_TEST_KEY_FENCE_ONLY");
    let backend = MockBackend::new(Answer::Text("```html\n```"));
    let mut controller =
        SessionController::new(config(backend, &key), Arc::new(ObjectUrlRegistry::new()));

    controller.submit(pdf("fence.pdf")).await.unwrap();
    assert_eq!(
        controller.session().error_kind(),
        Some(ErrorKind::EmptyResult)
    );
}

#[tokio::test]
async fn unsupported_file_leaves_session_idle() {
    let key = with_key("MATH2WORD_TEST_KEY_REJECT");
    let backend = MockBackend::new(Answer::Text("<p>x</p>"));
    let previews = Arc::new(CountingPreviews::default());
    let mut controller = SessionController::new(config(backend.clone(), &key), previews.clone());

    let err = controller
        .submit(SelectedFile::with_mime("notes.txt", "text/plain", b"hi".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(backend.calls(), 0);
    assert_eq!(previews.allocated.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversize_upload_is_rejected_when_limit_set() {
    let key = with_key("MATH2WORD_TEST_KEY_SIZE");
    let backend = MockBackend::new(Answer::Text("<p>x</p>"));
    let cfg = ConversionConfig::builder()
        .backend(backend.clone())
        .api_key_env(&key)
        .max_upload_bytes(4)
        .build()
        .unwrap();
    let mut controller = SessionController::new(cfg, Arc::new(ObjectUrlRegistry::new()));

    let err = controller.submit(pdf("big.pdf")).await.unwrap_err();
    assert!(matches!(err, Math2WordError::FileTooLarge { limit: 4, .. }));
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(backend.calls(), 0);
}

// ── Clear / retry / previews ─────────────────────────────────────────────────

#[tokio::test]
async fn clear_releases_preview_exactly_once() {
    let key = with_key("MATH2WORD_TEST_KEY_CLEAR");
    let backend = MockBackend::new(Answer::Text("<p>x</p>"));
    let previews = Arc::new(CountingPreviews::default());
    let mut controller = SessionController::new(config(backend, &key), previews.clone());

    controller.submit(png("board.png")).await.unwrap();
    let url = controller.snapshot().preview_url.unwrap();
    assert!(previews.released.lock().unwrap().is_empty());

    assert_eq!(controller.clear(), SessionState::Idle);
    assert_eq!(*previews.released.lock().unwrap(), vec![url.clone()]);

    // A second clear has nothing left to release.
    controller.clear();
    drop(controller);
    assert_eq!(*previews.released.lock().unwrap(), vec![url]);
}

#[tokio::test]
async fn retry_returns_to_idle_without_resubmitting() {
    let key = with_key("MATH2WORD_TEST_KEY_RETRY");
    let backend = MockBackend::new(Answer::Fail("boom"));
    let mut controller = SessionController::new(
        config(backend.clone(), &key),
        Arc::new(ObjectUrlRegistry::new()),
    );

    controller.submit(pdf("notes.pdf")).await.unwrap();
    assert_eq!(controller.retry(), SessionState::Idle);
    assert!(controller.session().file().is_none());
    assert!(controller.session().error().is_none());
    assert_eq!(backend.calls(), 1);

    // The uploader is available again.
    assert_eq!(
        controller.submit(pdf("again.pdf")).await.unwrap(),
        SessionState::Error
    );
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn clear_from_error_releases_preview_exactly_once() {
    let key = with_key("MATH2WORD_TEST_KEY_CLEAR_ERROR");
    let backend = MockBackend::new(Answer::Fail("quota exceeded"));
    let previews = Arc::new(CountingPreviews::default());
    let mut controller = SessionController::new(config(backend, &key), previews.clone());

    assert_eq!(
        controller.submit(png("board.png")).await.unwrap(),
        SessionState::Error
    );
    let url = controller.snapshot().preview_url.unwrap();
    assert!(previews.released.lock().unwrap().is_empty());

    assert_eq!(controller.clear(), SessionState::Idle);
    assert_eq!(*previews.released.lock().unwrap(), vec![url.clone()]);

    controller.clear();
    drop(controller);
    assert_eq!(*previews.released.lock().unwrap(), vec![url]);
}

#[tokio::test]
async fn retry_from_error_releases_preview_exactly_once() {
    let key = with_key("MATH2WORD_TEST_KEY_RETRY_RELEASE");
    let backend = MockBackend::new(Answer::Nothing);
    let previews = Arc::new(CountingPreviews::default());
    let mut controller = SessionController::new(config(backend, &key), previews.clone());

    controller.submit(pdf("blank.pdf")).await.unwrap();
    let url = controller.snapshot().preview_url.unwrap();

    assert_eq!(controller.retry(), SessionState::Idle);
    assert_eq!(*previews.released.lock().unwrap(), vec![url.clone()]);

    // Retry outside Error is ignored and releases nothing more.
    controller.retry();
    drop(controller);
    assert_eq!(*previews.released.lock().unwrap(), vec![url]);
    assert_eq!(previews.allocated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn same_named_inputs_export_to_distinct_files() {
    let key = with_key("MATH2WORD_TEST_KEY_SAME_STEM");
    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path());

    let mut from_pdf = SessionController::new(
        config(MockBackend::new(Answer::Text("<p>FROM PDF</p>")), &key),
        Arc::new(ObjectUrlRegistry::new()),
    );
    let mut from_png = SessionController::new(
        config(MockBackend::new(Answer::Text("<p>FROM PNG</p>")), &key),
        Arc::new(ObjectUrlRegistry::new()),
    );
    from_pdf.submit(pdf("notes.pdf")).await.unwrap();
    from_png.submit(png("notes.png")).await.unwrap();

    let first = from_pdf.download(&sink).await.unwrap();
    let second = from_png.download(&sink).await.unwrap();
    assert_ne!(first, second);
    assert!(std::fs::read_to_string(&first).unwrap().contains("FROM PDF"));
    assert!(std::fs::read_to_string(&second).unwrap().contains("FROM PNG"));
}

#[tokio::test]
async fn selection_while_processing_is_refused() {
    let key = with_key("MATH2WORD_TEST_KEY_BUSY");
    let backend = MockBackend::new(Answer::Text("<p>x</p>"));
    let mut controller =
        SessionController::new(config(backend, &key), Arc::new(ObjectUrlRegistry::new()));

    controller.select_file(pdf("first.pdf")).unwrap();
    let err = controller.select_file(pdf("second.pdf")).unwrap_err();
    assert!(matches!(err, Math2WordError::SelectionUnavailable { .. }));
    assert_eq!(controller.session().file().unwrap().name(), "first.pdf");
}

#[tokio::test]
async fn result_after_clear_is_dropped() {
    let key = with_key("MATH2WORD_TEST_KEY_STALE");
    let backend = MockBackend::new(Answer::Text("<p>late</p>"));
    let mut controller = SessionController::new(
        config(backend, &key),
        Arc::new(ObjectUrlRegistry::new()),
    );

    let ticket = controller.select_file(pdf("notes.pdf")).unwrap();
    let file_copy = pdf("notes.pdf");
    controller.clear();

    // The host finished the request after the user cleared the session.
    let late = convert_from_bytes(file_copy.name, file_copy.bytes, controller.client().config())
        .await
        .unwrap();
    assert_eq!(controller.complete(ticket, Ok(late)), SessionState::Idle);
    assert!(controller.session().output().is_none());
}

// ── Progress callback ────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for Recorder {
    fn on_state_change(&self, _file: Option<&str>, from: SessionState, to: SessionState) {
        self.events.lock().unwrap().push(format!("{from}->{to}"));
    }

    fn on_conversion_start(&self, file_name: &str, size_bytes: u64) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {file_name} {size_bytes}"));
    }

    fn on_conversion_complete(&self, file_name: &str, html_len: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {file_name} {html_len}"));
    }

    fn on_conversion_error(&self, file_name: &str, error: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("error {file_name} {error}"));
    }
}

#[tokio::test]
async fn progress_events_follow_the_session() {
    let key = with_key("MATH2WORD_TEST_KEY_PROGRESS");
    let recorder = Arc::new(Recorder::default());
    let cfg = ConversionConfig::builder()
        .backend(MockBackend::new(Answer::Text("<p>Hello</p>")))
        .api_key_env(&key)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let mut controller = SessionController::new(cfg, Arc::new(ObjectUrlRegistry::new()));

    controller.submit(pdf("notes.pdf")).await.unwrap();
    controller.clear();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "idle->processing".to_string(),
            "start notes.pdf 13".to_string(),
            "done notes.pdf 12".to_string(),
            "processing->success".to_string(),
            "success->idle".to_string(),
        ]
    );
}

#[test]
fn one_shot_conversion_from_bytes() {
    let key = with_key("MATH2WORD_TEST_KEY_ONESHOT");
    let cfg = config(MockBackend::new(Answer::Text("<h1>T</h1>")), &key);
    let output = tokio_test::block_on(convert_from_bytes(
        "scan.png",
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
        &cfg,
    ))
    .unwrap();
    assert_eq!(output.html(), "<h1>T</h1>");
}
