//! Configuration types for document-to-Word conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct holds every knob so a
//! config can be cloned into concurrent sessions and logged as a whole.

use crate::error::Math2WordError;
use crate::pipeline::llm::VisionBackend;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default Gemini model: fast, vision-capable, reads PDFs natively.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default provider name passed to `edgequake_llm::ProviderFactory`.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Environment variable holding the API key by default.
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Documented upload ceiling (20 MB). Enforced only when
/// [`ConversionConfig::max_upload_bytes`] is set.
pub const DOCUMENTED_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Configuration for a document conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_math2word::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .model("gemini-2.5-pro")
///     .max_tokens(16_384)
///     .build()
///     .unwrap();
/// assert_eq!(config.temperature, 0.1);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// LLM model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// LLM provider name understood by `edgequake_llm::ProviderFactory`.
    /// Default: `gemini`.
    pub provider_name: String,

    /// Pre-constructed backend. Takes precedence over `provider_name`.
    pub backend: Option<Arc<dyn VisionBackend>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription wants the model to be faithful to the page, not creative.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// MathML is verbose; a dense page of equations easily exceeds 4 000 tokens.
    pub max_tokens: usize,

    /// Environment variable the API key is read from at call time.
    /// Default: `GEMINI_API_KEY`.
    pub api_key_env: String,

    /// Custom system instruction. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Custom user instruction. If None, uses [`crate::prompts::DEFAULT_USER_PROMPT`].
    pub user_prompt: Option<String>,

    /// How far returned HTML is trusted. Default: [`HtmlPolicy::Trusted`].
    pub html_policy: HtmlPolicy,

    /// Upload ceiling in bytes. Default: None (not enforced).
    pub max_upload_bytes: Option<u64>,

    /// Timeout for the model call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional observer for session events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: DEFAULT_PROVIDER.to_string(),
            backend: None,
            temperature: 0.1,
            max_tokens: 8192,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            system_prompt: None,
            user_prompt: None,
            html_policy: HtmlPolicy::default(),
            max_upload_bytes: None,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn VisionBackend>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key_env", &self.api_key_env)
            .field("html_policy", &self.html_policy)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn backend(mut self, backend: Arc<dyn VisionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_env = var.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.user_prompt = Some(prompt.into());
        self
    }

    pub fn html_policy(mut self, policy: HtmlPolicy) -> Self {
        self.config.html_policy = policy;
        self
    }

    pub fn max_upload_bytes(mut self, limit: u64) -> Self {
        self.config.max_upload_bytes = Some(limit);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Attach an observer for session events.
    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Math2WordError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(Math2WordError::InvalidConfig("model must not be empty".into()));
        }
        if c.api_key_env.trim().is_empty() {
            return Err(Math2WordError::InvalidConfig(
                "API key variable name must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Math2WordError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(Math2WordError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

/// How far HTML returned by the model is trusted before it is stored.
///
/// | Policy | Behaviour |
/// |--------|-----------|
/// | `Trusted` | Fence-stripped text is kept verbatim (default) |
/// | `StripActive` | Scripts, embedded objects, `on*` handlers and `javascript:` URLs are removed |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtmlPolicy {
    /// Keep the model's HTML as-is.
    #[default]
    Trusted,
    /// Remove active content before storing the output.
    StripActive,
}
