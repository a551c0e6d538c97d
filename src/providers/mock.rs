/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds, prefixing each line with the target language
 * - `MockProvider::truncated()` - Returns one line fewer than it was sent
 * - `MockProvider::failing()` - Always fails with a server error
 * - `MockProvider::intermittent(n)` - Fails every nth call with a retryable error
 * - `MockProvider::hang_after(n)` - Succeeds n times, then waits until cancelled
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{BatchRequest, Provider};
use crate::translation::cancel::CancellationToken;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with one output per input
    Working,
    /// Drops the last line of every reply
    Truncated,
    /// Always fails with a 500
    Failing,
    /// Fails with a 503 on every nth call
    Intermittent { fail_every: usize },
    /// Succeeds for the first n calls, then blocks until cancelled
    HangAfter(usize),
    /// Succeeds after sleeping
    Slow { delay_ms: u64 },
}

/// Mock provider for testing orchestration behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<String>>>>,
    custom_response: Option<fn(&str) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that returns misaligned replies
    pub fn truncated() -> Self {
        Self::new(MockBehavior::Truncated)
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    /// Create a mock that stops answering after `n` calls
    pub fn hang_after(n: usize) -> Self {
        Self::new(MockBehavior::HangAfter(n))
    }

    /// Create a mock that answers after a delay
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom per-line response generator
    pub fn with_custom_response(mut self, generator: fn(&str) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of calls received so far, shared between clones
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Payloads of every call received so far
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().clone()
    }

    fn translate_lines(&self, request: &BatchRequest) -> Vec<String> {
        request
            .payload
            .iter()
            .map(|line| match self.custom_response {
                Some(generator) => generator(line),
                None => format!("[{}] {}", request.target_language, line),
            })
            .collect()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn translate_batch(
        &self,
        request: &BatchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.payload.clone());

        match self.behavior {
            MockBehavior::Working => Ok(self.translate_lines(request)),

            MockBehavior::Truncated => {
                let mut lines = self.translate_lines(request);
                lines.pop();
                Ok(lines)
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated provider failure".to_string(),
            }),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                    })
                } else {
                    Ok(self.translate_lines(request))
                }
            }

            MockBehavior::HangAfter(n) => {
                if count < n {
                    Ok(self.translate_lines(request))
                } else {
                    cancel.cancelled().await;
                    Err(ProviderError::Cancelled)
                }
            }

            MockBehavior::Slow { delay_ms } => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(ProviderError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => Ok(self.translate_lines(request)),
                }
            }
        }
    }
}
