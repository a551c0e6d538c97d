/*!
 * Lingva provider.
 *
 * Lingva exposes Google Translate through public mirrors with a
 * one-line-per-request API: `GET /api/v1/{source}/{target}/{text}`.
 * A batch is translated line by line. When a mirror fails with a
 * retryable error the next one in the pool is tried, and the pool keeps
 * starting from the last mirror that worked.
 */

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

use super::{check_status, ensure_aligned, http_client, race_cancel, BatchRequest, Provider};
use crate::errors::ProviderError;
use crate::translation::cancel::CancellationToken;

/// Public mirrors tried after the configured ones
pub const BUILTIN_MIRRORS: &[&str] = &[
    "https://lingva.ml",
    "https://lingva.lunar.icu",
    "https://translate.plausibility.cloud",
];

/// Lingva client over a pool of mirrors
#[derive(Debug)]
pub struct LingvaProvider {
    client: Client,
    mirrors: Vec<Url>,
    current: AtomicUsize,
}

#[derive(Debug, Deserialize)]
struct LingvaResponse {
    translation: String,
}

impl LingvaProvider {
    /// Create a client; the configured endpoint and fallbacks come before
    /// the built-in mirrors, duplicates are dropped
    pub fn new(endpoint: impl Into<String>, fallbacks: Vec<String>, timeout_secs: u64) -> Result<Self> {
        let endpoint = endpoint.into();
        let candidates = std::iter::once(endpoint)
            .chain(fallbacks)
            .chain(BUILTIN_MIRRORS.iter().map(|m| m.to_string()));

        let mut mirrors: Vec<Url> = Vec::new();
        for candidate in candidates {
            let candidate = candidate.trim().trim_end_matches('/');
            if candidate.is_empty() {
                continue;
            }
            let url = Url::parse(candidate)
                .map_err(|e| anyhow!("Invalid Lingva endpoint '{}': {}", candidate, e))?;
            if url.cannot_be_a_base() {
                return Err(anyhow!("Lingva endpoint '{}' cannot be used as a base URL", candidate));
            }
            if !mirrors.contains(&url) {
                mirrors.push(url);
            }
        }

        Ok(Self {
            client: http_client(timeout_secs),
            mirrors,
            current: AtomicUsize::new(0),
        })
    }

    /// Mirrors in the order they are tried
    pub fn mirrors(&self) -> &[Url] {
        &self.mirrors
    }

    /// Request URL for one line against one mirror
    pub fn line_url(base: &Url, source: &str, target: &str, text: &str) -> Url {
        let mut url = base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v1", source, target, text]);
        }
        url
    }

    async fn fetch(&self, url: Url) -> Result<String, ProviderError> {
        let response = self.client.get(url).send().await?;
        let response = check_status(response).await?;
        let parsed: LingvaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(parsed.translation)
    }

    async fn translate_line(
        &self,
        line: &str,
        source: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        // Nothing to translate, keep the spacing as is
        if line.trim().is_empty() {
            return Ok(line.to_string());
        }

        let start = self.current.load(Ordering::Relaxed);
        let mut last_error = ProviderError::ConnectionError("No Lingva mirrors configured".to_string());

        for offset in 0..self.mirrors.len() {
            let index = (start + offset) % self.mirrors.len();
            let url = Self::line_url(&self.mirrors[index], source, target, line);

            match race_cancel(cancel, self.fetch(url)).await {
                Ok(translation) => {
                    self.current.store(index, Ordering::Relaxed);
                    return Ok(translation);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Lingva mirror {} failed: {}", self.mirrors[index], e);
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        // Next call starts one mirror further along
        self.current
            .store((start + 1) % self.mirrors.len().max(1), Ordering::Relaxed);
        Err(last_error)
    }
}

#[async_trait]
impl Provider for LingvaProvider {
    fn name(&self) -> &str {
        "lingva"
    }

    async fn translate_batch(
        &self,
        request: &BatchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProviderError> {
        let source = request
            .source_language
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("auto");
        let target = request.target_language.as_str();
        debug!("Lingva request: {} lines {} -> {}", request.payload.len(), source, target);

        let mut lines = Vec::with_capacity(request.payload.len());
        for line in &request.payload {
            lines.push(self.translate_line(line, source, target, cancel).await?);
        }

        ensure_aligned(request.payload.len(), lines.len())?;
        Ok(lines)
    }
}
