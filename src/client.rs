//! Conversion client: one uploaded document in, one HTML fragment out.
//!
//! ```text
//! credential ──▶ encode ──▶ VLM call ──▶ fence strip / policy ──▶ ConversionOutput
//! (env var)      (base64)   (1 request)  (postprocess)
//! ```
//!
//! The credential is read from the environment on every call and checked
//! before anything else, so a missing key never costs a network round-trip.
//! There are no retries and no streaming: each call is a single blocking
//! request/response exchange bounded by `api_timeout_secs`.

use crate::config::ConversionConfig;
use crate::error::Math2WordError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::encode::encode_payload;
use crate::pipeline::llm::{ApiKey, LlmBackend, VisionBackend, VisionRequest};
use crate::pipeline::postprocess::{clean_html, is_blank};
use crate::pipeline::upload::UploadedFile;
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sends uploaded documents to the vision backend.
#[derive(Clone)]
pub struct ConversionClient {
    backend: Arc<dyn VisionBackend>,
    config: ConversionConfig,
}

impl ConversionClient {
    /// Client for `config`; uses `config.backend` when set, otherwise an
    /// [`LlmBackend`] for `config.provider_name` / `config.model`.
    pub fn new(config: ConversionConfig) -> Self {
        let backend = match config.backend {
            Some(ref backend) => Arc::clone(backend),
            None => Arc::new(LlmBackend::new(&config.provider_name, &config.model)) as Arc<dyn VisionBackend>,
        };
        Self { backend, config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn backend_name(&self) -> String {
        self.backend.name()
    }

    /// Convert one uploaded document into an HTML body fragment.
    ///
    /// # Errors
    /// - [`Math2WordError::MissingCredential`] before any request is made
    /// - [`Math2WordError::Service`] / [`Math2WordError::ServiceTimeout`] when
    ///   the call fails
    /// - [`Math2WordError::EmptyResult`] when the model returned no text
    pub async fn convert(&self, file: &UploadedFile) -> Result<ConversionOutput, Math2WordError> {
        let api_key = read_credential(&self.config.api_key_env)?;

        let request = self.build_request(file, api_key);
        let backend_name = self.backend.name();
        info!(
            "Converting '{}' ({}, {} bytes) with {}",
            file.name(),
            file.mime_type(),
            file.size(),
            backend_name
        );

        let start = Instant::now();
        let secs = self.config.api_timeout_secs;
        let response = tokio::time::timeout(Duration::from_secs(secs), self.backend.generate(&request))
            .await
            .map_err(|_| {
                warn!("'{}': model call timed out after {}s", file.name(), secs);
                Math2WordError::ServiceTimeout { secs }
            })??;
        let duration_ms = start.elapsed().as_millis() as u64;

        let raw_text = response.text.unwrap_or_default();
        if is_blank(&raw_text) {
            warn!("'{}': model returned no content", file.name());
            return Err(Math2WordError::EmptyResult);
        }

        let html = clean_html(&raw_text, self.config.html_policy);
        if is_blank(&html) {
            warn!("'{}': model returned only a code fence", file.name());
            return Err(Math2WordError::EmptyResult);
        }
        debug!(
            "'{}': {} chars raw → {} chars html in {}ms",
            file.name(),
            raw_text.len(),
            html.len(),
            duration_ms
        );

        let stats = ConversionStats {
            backend: backend_name,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            payload_bytes: file.size(),
            duration_ms,
        };
        Ok(ConversionOutput::new(html, raw_text, stats))
    }

    fn build_request(&self, file: &UploadedFile, api_key: ApiKey) -> VisionRequest {
        VisionRequest {
            system_instruction: self
                .config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            prompt: self
                .config
                .user_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_PROMPT.to_string()),
            mime_type: file.mime_type().to_string(),
            data_base64: encode_payload(file.bytes()),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            api_key,
        }
    }
}

/// Read the API key from `env_var`; fails when it is unset or blank.
pub fn read_credential(env_var: &str) -> Result<ApiKey, Math2WordError> {
    match std::env::var(env_var) {
        Ok(v) if !v.trim().is_empty() => Ok(ApiKey::new(v.trim())),
        _ => Err(Math2WordError::MissingCredential {
            env_var: env_var.to_string(),
        }),
    }
}
