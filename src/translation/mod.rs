/*!
 * Translation pipeline around the provider adapters.
 *
 * - `cancel`: cooperative cancellation token shared by a run
 * - `concurrency`: per-provider batch size and concurrency profiles
 * - `memory`: translation memory cache over the repository
 * - `orchestrator`: batch runs, scopes, progress and the run registry
 * - `retry`: exponential backoff with jitter
 */

pub use self::cancel::CancellationToken;
pub use self::memory::{normalize_source_key, TranslationMemory};
pub use self::orchestrator::{
    BatchOrchestrator, ItemFilter, Progress, RunGuard, RunRegistry, RunReport, RunScope, RunSettings,
    RunState,
};
pub use self::retry::{retry_with_backoff, RetryPolicy};

pub mod cancel;
pub mod concurrency;
pub mod memory;
pub mod orchestrator;
pub mod retry;
