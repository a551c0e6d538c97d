/*!
 * Provider implementations for different translation services.
 *
 * Every backend is driven through the same batch contract: a list of masked
 * lines goes in, a list of the same length comes out.
 * - `llm`: OpenAI-compatible chat completions
 * - `deepl`: DeepL REST API
 * - `lingva`: Lingva public mirrors, one request per line
 * - `mock`: scripted in-process provider for tests
 */

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;
use crate::translation::cancel::CancellationToken;

pub mod deepl;
pub mod lingva;
pub mod llm;
pub mod mock;

/// Credentials attached to a request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// API key, if the backend needs one
    pub api_key: Option<String>,
}

impl Credentials {
    /// Credentials holding a key; blank keys count as none
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            api_key: if api_key.trim().is_empty() {
                None
            } else {
                Some(api_key.trim().to_string())
            },
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One provider call
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Masked lines, in item order
    pub payload: Vec<String>,
    /// Target language code
    pub target_language: String,
    /// Source language code, `None` for auto-detection
    pub source_language: Option<String>,
    /// Backend credentials
    pub credentials: Credentials,
}

impl BatchRequest {
    /// The API key, or an authentication error before any network call
    pub fn require_api_key(&self) -> Result<&str, ProviderError> {
        self.credentials
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::AuthenticationError("API key is missing".to_string()))
    }
}

/// Common trait for all translation providers
///
/// Implementations must return exactly one output per input line, in order,
/// or fail with `LengthMismatch`. Network waits race the cancellation token.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Translate a batch of masked lines
    async fn translate_batch(
        &self,
        request: &BatchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProviderError>;
}

/// Enforce the one-output-per-input contract
pub fn ensure_aligned(expected: usize, actual: usize) -> Result<(), ProviderError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ProviderError::LengthMismatch { expected, actual })
    }
}

/// HTTP client with the configured timeout
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .unwrap_or_default()
}

/// Await a request future unless the token fires first
pub(crate) async fn race_cancel<T, F>(cancel: &CancellationToken, future: F) -> Result<T, ProviderError>
where
    F: std::future::Future<Output = Result<T, ProviderError>>,
{
    if cancel.is_cancelled() {
        return Err(ProviderError::Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = future => result,
    }
}

/// Turn a non-success response into the matching error
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    log::error!("Provider API error ({}): {}", status, body);
    Err(ProviderError::from_status(status.as_u16(), body))
}

/// Build the adapter for the configured provider
pub fn build_provider(config: &TranslationConfig) -> Result<Arc<dyn Provider>> {
    let timeout = config.get_timeout_secs();
    let provider: Arc<dyn Provider> = match config.provider {
        TranslationProvider::Llm => Arc::new(llm::LlmProvider::new(
            config.get_endpoint(),
            config.get_model(),
            &config.common,
            timeout,
        )),
        TranslationProvider::DeepL => {
            Arc::new(deepl::DeepLProvider::new(config.get_endpoint(), timeout))
        }
        TranslationProvider::Lingva => Arc::new(lingva::LingvaProvider::new(
            config.get_endpoint(),
            config.get_fallback_endpoints(),
            timeout,
        )?),
    };
    Ok(provider)
}
