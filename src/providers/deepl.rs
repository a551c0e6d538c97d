/*!
 * DeepL REST API provider.
 *
 * One `POST /v2/translate` per batch with the lines as repeated `text`
 * entries. Free-tier keys (suffix `:fx`) go to the free host unless an
 * explicit endpoint is configured.
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, ensure_aligned, http_client, race_cancel, BatchRequest, Provider};
use crate::errors::ProviderError;
use crate::translation::cancel::CancellationToken;

const FREE_HOST: &str = "https://api-free.deepl.com";
const PRO_HOST: &str = "https://api.deepl.com";

// Targets where the quality-optimized model is available
const QUALITY_MODEL_TARGETS: &[&str] = &["DE", "EN-GB", "EN-US", "ES", "FR", "IT", "JA", "KO", "PT-BR", "PT-PT", "ZH-HANS"];

/// DeepL client
#[derive(Debug)]
pub struct DeepLProvider {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a [String],
    target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

impl DeepLProvider {
    /// Create a client; an empty endpoint picks the host from the key
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            endpoint: endpoint.into(),
        }
    }

    /// Base URL for a given key
    pub fn base_url(&self, api_key: &str) -> String {
        let configured = self.endpoint.trim();
        if !configured.is_empty() {
            return configured.trim_end_matches('/').to_string();
        }
        if api_key.ends_with(":fx") {
            FREE_HOST.to_string()
        } else {
            PRO_HOST.to_string()
        }
    }
}

/// DeepL target code for a language code
///
/// Languages with regional variants need one spelled out as a target.
pub fn target_code(language: &str) -> String {
    let upper = language.trim().replace('_', "-").to_uppercase();
    match upper.as_str() {
        "EN" => "EN-US".to_string(),
        "PT" => "PT-BR".to_string(),
        "ZH" | "ZH-CN" => "ZH-HANS".to_string(),
        "ZH-TW" => "ZH-HANT".to_string(),
        _ => upper,
    }
}

/// DeepL source code: base language only, `None` for auto-detection
pub fn source_code(language: Option<&str>) -> Option<String> {
    let language = language?.trim();
    if language.is_empty() || language.eq_ignore_ascii_case("auto") {
        return None;
    }
    let base = language.split(['-', '_']).next().unwrap_or(language);
    Some(base.to_uppercase())
}

#[async_trait]
impl Provider for DeepLProvider {
    fn name(&self) -> &str {
        "deepl"
    }

    async fn translate_batch(
        &self,
        request: &BatchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProviderError> {
        let api_key = request.require_api_key()?;
        if request.payload.is_empty() {
            return Ok(Vec::new());
        }

        let target_lang = target_code(&request.target_language);
        let model_type = QUALITY_MODEL_TARGETS
            .contains(&target_lang.as_str())
            .then_some("prefer_quality_optimized");
        let body = TranslateRequest {
            text: &request.payload,
            target_lang,
            source_lang: source_code(request.source_language.as_deref()),
            model_type,
        };
        let url = format!("{}/v2/translate", self.base_url(api_key));
        debug!("DeepL request: {} lines to {}", request.payload.len(), body.target_lang);

        let parsed: TranslateResponse = race_cancel(cancel, async {
            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("DeepL-Auth-Key {}", api_key))
                .json(&body)
                .send()
                .await?;
            let response = check_status(response).await?;
            response
                .json::<TranslateResponse>()
                .await
                .map_err(|e| ProviderError::ParseError(e.to_string()))
        })
        .await?;

        let lines: Vec<String> = parsed.translations.into_iter().map(|t| t.text).collect();
        ensure_aligned(request.payload.len(), lines.len())?;
        Ok(lines)
    }
}
