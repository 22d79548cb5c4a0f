//! Output types: the converted HTML, its call statistics, and the exported
//! Word artifact.

use serde::{Deserialize, Serialize};

/// Result of one successful conversion call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutput {
    html: String,
    raw_text: String,
    stats: ConversionStats,
}

impl ConversionOutput {
    pub fn new(html: String, raw_text: String, stats: ConversionStats) -> Self {
        Self {
            html,
            raw_text,
            stats,
        }
    }

    /// Cleaned HTML body fragment, as shown in the preview and exported.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Model text before fence stripping and cleanup.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }
}

/// Statistics for a single model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Backend identifier, e.g. `gemini/gemini-2.5-flash`.
    pub backend: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Raw upload size before base64 encoding.
    pub payload_bytes: u64,
    pub duration_ms: u64,
}

/// A Word-compatible document ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordDocument {
    /// `<base-name>.doc`
    pub file_name: String,
    /// Always `application/msword`.
    pub content_type: String,
    /// Full HTML envelope with the fragment inside `<body>`.
    pub body: String,
}
