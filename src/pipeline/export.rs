//! Exporter: wrap an HTML fragment in a Word-compatible envelope and deliver it.
//!
//! Word opens an HTML document served as `application/msword` with a `.doc`
//! extension and, given the Office namespace declarations below, converts
//! embedded MathML into native editable equations (OMML). The envelope is
//! therefore fixed: namespaces, a conditional `WordDocument` block that opens
//! the file in Print view, and a small stylesheet for typographic defaults.
//!
//! Word only applies the HTML import path to the legacy `.doc` extension.

use crate::error::Math2WordError;
use crate::output::WordDocument;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// Content type the artifact is tagged with.
pub const WORD_CONTENT_TYPE: &str = "application/msword";

/// Base name used when the original name yields nothing usable.
pub const DEFAULT_BASE_NAME: &str = "document";

const ENVELOPE_HEAD: &str = r#"<html xmlns:o='urn:schemas-microsoft-com:office:office'
      xmlns:w='urn:schemas-microsoft-com:office:word'
      xmlns:m='http://schemas.microsoft.com/office/2004/12/omml'
      xmlns='http://www.w3.org/TR/REC-html40'>
<head>
  <meta charset='utf-8'>
  <title>{title}</title>
  <!--[if gte mso 9]>
  <xml>
  <w:WordDocument>
  <w:View>Print</w:View>
  <w:Zoom>100</w:Zoom>
  <w:DoNotOptimizeForBrowser/>
  </w:WordDocument>
  </xml>
  <![endif]-->
  <style>
    body { font-family: 'Calibri', 'Arial', sans-serif; font-size: 11pt; }
    p { margin-bottom: 10px; line-height: 1.5; }
    h1 { font-size: 16pt; font-weight: bold; color: #2E74B5; }
    h2 { font-size: 13pt; font-weight: bold; color: #2E74B5; }
    table { border-collapse: collapse; width: 100%; margin-bottom: 1em; }
    td, th { border: 1px solid #999; padding: 5px; }
  </style>
</head>
<body>
"#;

const ENVELOPE_TAIL: &str = "\n</body>\n</html>\n";

/// Original file name without directory and without its last extension.
///
/// `notes.pdf` → `notes`, `Scan.PNG` → `Scan`, `a/b/c.v2.pdf` → `c.v2`.
/// Falls back to [`DEFAULT_BASE_NAME`] when nothing is left.
pub fn export_base_name(original_name: &str) -> String {
    Path::new(original_name.trim())
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string())
}

/// `<original-name-without-extension>.doc`
pub fn export_file_name(original_name: &str) -> String {
    format!("{}.doc", export_base_name(original_name))
}

/// Wrap `fragment` in the Word envelope.
pub fn word_envelope(fragment: &str, title: &str) -> String {
    let head = ENVELOPE_HEAD.replace("{title}", &escape_text(title));
    let mut doc = String::with_capacity(head.len() + fragment.len() + ENVELOPE_TAIL.len());
    doc.push_str(&head);
    doc.push_str(fragment);
    doc.push_str(ENVELOPE_TAIL);
    doc
}

/// Build the exportable artifact for `fragment`, named after `original_name`.
pub fn build_word_document(fragment: &str, original_name: &str) -> WordDocument {
    let base = export_base_name(original_name);
    WordDocument {
        file_name: format!("{base}.doc"),
        content_type: WORD_CONTENT_TYPE.to_string(),
        body: word_envelope(fragment, &base),
    }
}

/// Standalone HTML page for previewing `fragment` in a browser.
///
/// The fragment is inserted as-is; MathML renders natively in current browsers.
pub fn preview_page(fragment: &str, original_name: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_text(&export_base_name(original_name)),
        fragment
    )
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Where exported documents go ("download").
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Deliver the document; returns where it ended up.
    async fn deliver(&self, doc: &WordDocument) -> Result<PathBuf, Math2WordError>;
}

/// Writes documents into a directory.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a
/// half-written `.doc` behind. Names are unique per sink: a second document
/// called `notes.doc` is written as `notes-2.doc`, a third as `notes-3.doc`.
/// Files left over from earlier runs are overwritten.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a path for `file_name` that no earlier delivery used.
    fn claim(&self, file_name: &str) -> PathBuf {
        let name = Path::new(file_name);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string());
        let ext = name.extension().map(|e| e.to_string_lossy().into_owned());

        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        let mut n = 1usize;
        loop {
            let candidate = match (n, &ext) {
                (1, _) => self.dir.join(file_name),
                (_, Some(ext)) => self.dir.join(format!("{stem}-{n}.{ext}")),
                (_, None) => self.dir.join(format!("{stem}-{n}")),
            };
            if claimed.insert(candidate.clone()) {
                if n > 1 {
                    warn!(
                        "'{}' already exported in this run; writing {}",
                        file_name,
                        candidate.display()
                    );
                }
                return candidate;
            }
            n += 1;
        }
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn deliver(&self, doc: &WordDocument) -> Result<PathBuf, Math2WordError> {
        let path = self.claim(&doc.file_name);
        write_atomically(&path, doc.body.as_bytes()).await?;
        info!("Exported {} ({} bytes)", path.display(), doc.body.len());
        Ok(path)
    }
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
///
/// The temp file is removed again if either step fails.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), Math2WordError> {
    let fail = |source| Math2WordError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = match tokio::fs::write(&tmp_path, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    Ok(())
}
