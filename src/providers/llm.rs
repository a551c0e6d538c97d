/*!
 * OpenAI-compatible chat completions provider.
 *
 * The whole batch travels as one JSON array inside a single prompt and a
 * JSON array of the same length is expected back. Models like to wrap the
 * array in code fences or prose, so the reply is searched for the first
 * well-formed array of strings.
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, ensure_aligned, http_client, race_cancel, BatchRequest, Provider};
use crate::app_config::TranslationCommonConfig;
use crate::errors::ProviderError;
use crate::language_utils;
use crate::translation::cancel::CancellationToken;

/// Chat completions client
#[derive(Debug)]
pub struct LlmProvider {
    client: Client,
    endpoint: String,
    model: String,
    system_prompt: String,
    temperature: f32,
}

/// Chat message
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

/// Chat completions request body
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

/// Chat completions response body
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Candidate completions
    pub choices: Vec<ChatChoice>,
}

/// One completion
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// The generated message
    pub message: ChatMessage,
}

impl LlmProvider {
    /// Create a client for `endpoint` (the API base, e.g. `https://api.openai.com/v1`)
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        common: &TranslationCommonConfig,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: http_client(timeout_secs),
            endpoint: endpoint.into(),
            model: model.into(),
            system_prompt: common.system_prompt.clone(),
            temperature: common.temperature,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    fn build_request(&self, request: &BatchRequest) -> Result<ChatRequest, ProviderError> {
        let source = request
            .source_language
            .as_deref()
            .map_or_else(|| "the detected language".to_string(), language_utils::display_name);
        let target = language_utils::display_name(&request.target_language);
        let system = self
            .system_prompt
            .replace("{source_language}", &source)
            .replace("{target_language}", &target);

        let lines = serde_json::to_string(&request.payload)
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to encode batch: {}", e)))?;

        let user = format!(
            "Translate each string of this JSON array into {}. Reply with only a JSON array of exactly {} strings, in the same order, one translation per input string.\n\n{}",
            target,
            request.payload.len(),
            lines
        );

        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system },
                ChatMessage { role: "user".to_string(), content: user },
            ],
            temperature: self.temperature,
        })
    }

    async fn send(&self, api_key: &str, body: &ChatRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::ParseError("Response has no choices".to_string()))
    }
}

#[async_trait]
impl Provider for LlmProvider {
    fn name(&self) -> &str {
        "llm"
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

        let body = self.build_request(request)?;
        let content = race_cancel(cancel, self.send(api_key, &body)).await?;
        debug!("LLM replied with {} characters", content.len());

        let lines = parse_string_array(&content).ok_or_else(|| {
            ProviderError::ParseError("No JSON array of strings in model reply".to_string())
        })?;
        ensure_aligned(request.payload.len(), lines.len())?;
        Ok(lines)
    }
}

/// Find the first well-formed JSON array in a model reply.
///
/// Code fences and surrounding prose are ignored. Non-string elements are
/// rendered as JSON text so that a stray number still counts toward the
/// length check instead of silently vanishing.
pub fn parse_string_array(reply: &str) -> Option<Vec<String>> {
    let text = strip_code_fences(reply);

    for (start, _) in text.match_indices('[') {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<Vec<serde_json::Value>>();
        if let Some(Ok(values)) = stream.next() {
            return Some(
                values
                    .into_iter()
                    .map(|value| match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            );
        }
    }
    None
}

fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
