/*!
 * Provider-specific batching and concurrency tuning.
 *
 * Recommended batch sizes and concurrency caps follow each backend's
 * request shape: one chat completion per batch, one REST call per batch,
 * or one request per line against shared public mirrors.
 */

use crate::app_config::TranslationProvider;

/// Largest batch ever sent in one provider call
pub const MAX_BATCH_SIZE: usize = 100;

/// Provider-specific concurrency profile with tuned defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Upper bound for concurrent batches
    pub max_concurrent_batches: usize,
    /// Batch size used when the configuration asks for the provider's choice
    pub recommended_batch_size: usize,
}

impl ProviderProfile {
    /// Get the optimal profile for a given provider
    pub fn for_provider(provider: TranslationProvider) -> Self {
        match provider {
            TranslationProvider::Llm => Self {
                // Long prompts, generous rate limits
                max_concurrent_batches: 4,
                recommended_batch_size: 20,
            },
            TranslationProvider::DeepL => Self {
                max_concurrent_batches: 4,
                recommended_batch_size: 50,
            },
            TranslationProvider::Lingva => Self {
                // Public mirrors, one request per line
                max_concurrent_batches: 2,
                recommended_batch_size: 10,
            },
        }
    }

    /// Batch size to use, 0 meaning the recommended one, clamped to `1..=MAX_BATCH_SIZE`
    pub fn effective_batch_size(&self, configured: usize) -> usize {
        let size = if configured == 0 {
            self.recommended_batch_size
        } else {
            configured
        };
        size.clamp(1, MAX_BATCH_SIZE)
    }

    /// Concurrent batches to run, never above the profile cap and never 0
    pub fn effective_concurrent_batches(&self, configured: usize) -> usize {
        configured.clamp(1, self.max_concurrent_batches.max(1))
    }
}
