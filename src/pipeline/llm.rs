//! VLM interaction: the [`VisionBackend`] seam and its edgequake-llm implementation.
//!
//! The conversion client talks to the model only through [`VisionBackend`],
//! which takes one fully-built [`VisionRequest`] and answers with one
//! [`VisionResponse`]. Keeping the seam this small lets tests substitute a
//! recording mock and lets callers plug in middleware (caching, quotas)
//! without touching the client.
//!
//! Errors leave a backend already normalised into [`Math2WordError`]: a
//! provider failure becomes [`Math2WordError::Service`] carrying the
//! provider's own message, so nothing untyped reaches the session.
//!
//! The API key travels inside the request. The Gemini provider is built from
//! that key on every call; it never falls back to its own environment lookup.

use crate::error::Math2WordError;
use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, GeminiProvider, ImageData, LLMProvider, ProviderFactory,
};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// API key read from the configured environment variable.
///
/// `Debug` never prints the value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// One multimodal request: instructions plus a single attached document.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub system_instruction: String,
    pub prompt: String,
    /// Declared MIME type of the attachment, e.g. `application/pdf`.
    pub mime_type: String,
    /// Base64 payload without any `data:` prefix.
    pub data_base64: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Credential for this call.
    pub api_key: ApiKey,
}

/// What the model answered.
#[derive(Debug, Clone, Default)]
pub struct VisionResponse {
    /// Generated text; `None` or empty when the model produced nothing.
    pub text: Option<String>,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A hosted vision model that can read a document and answer in text.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Short identifier used in logs, e.g. `gemini/gemini-2.5-flash`.
    fn name(&self) -> String;

    /// Issue exactly one request; no retries.
    async fn generate(&self, request: &VisionRequest) -> Result<VisionResponse, Math2WordError>;
}

/// [`VisionBackend`] backed by an `edgequake_llm` provider.
///
/// For `gemini` the provider is built per call from [`VisionRequest::api_key`].
/// Other providers come from [`ProviderFactory`] on first use and read their
/// own key variables, so `api_key_env` must name that variable for them.
pub struct LlmBackend {
    provider_name: String,
    model: String,
    provider: OnceCell<Arc<dyn LLMProvider>>,
}

impl LlmBackend {
    /// Backend for a named provider and model.
    pub fn new(provider_name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            model: model.into(),
            provider: OnceCell::new(),
        }
    }

    /// Backend around an already-configured provider.
    pub fn from_provider(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider_name: "custom".to_string(),
            model: model.into(),
            provider: OnceCell::with_value(provider),
        }
    }

    fn takes_explicit_key(&self) -> bool {
        self.provider_name.eq_ignore_ascii_case("gemini")
    }

    fn provider(&self, api_key: &ApiKey) -> Result<Arc<dyn LLMProvider>, Math2WordError> {
        if let Some(provider) = self.provider.get() {
            return Ok(Arc::clone(provider));
        }
        if self.takes_explicit_key() {
            let gemini: Arc<dyn LLMProvider> =
                Arc::new(GeminiProvider::new(api_key.expose()).with_model(self.model.as_str()));
            return Ok(gemini);
        }
        self.provider
            .get_or_try_init(|| {
                ProviderFactory::create_llm_provider(&self.provider_name, &self.model).map_err(
                    |e| Math2WordError::ProviderNotConfigured {
                        provider: self.provider_name.clone(),
                        hint: format!("{e}"),
                    },
                )
            })
            .map(Arc::clone)
    }
}

#[async_trait]
impl VisionBackend for LlmBackend {
    fn name(&self) -> String {
        format!("{}/{}", self.provider_name, self.model)
    }

    async fn generate(&self, request: &VisionRequest) -> Result<VisionResponse, Math2WordError> {
        let provider = self.provider(&request.api_key)?;

        // System instruction first, then the document with the user prompt.
        let messages = vec![
            ChatMessage::system(request.system_instruction.as_str()),
            ChatMessage::user_with_images(
                request.prompt.as_str(),
                vec![ImageData::new(
                    request.data_base64.clone(),
                    request.mime_type.clone(),
                )],
            ),
        ];
        let options = build_options(request);

        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| Math2WordError::Service {
                message: e.to_string(),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name(),
            response.prompt_tokens,
            response.completion_tokens
        );

        Ok(VisionResponse {
            text: Some(response.content),
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Build `CompletionOptions` from the request.
fn build_options(request: &VisionRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}
