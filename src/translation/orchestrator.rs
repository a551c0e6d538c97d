/*!
 * Batch orchestration of a translation run over one file.
 *
 * A run moves `Idle -> Running -> {Completed | Canceled | Failed}`:
 * - the candidate items for the scope are snapshotted
 * - translation memory hits are written straight away and dropped from the work
 * - the rest is cut into fixed-size batches, each sent to the provider under
 *   the retry policy, unmasked, and committed in one transaction together
 *   with its memory upserts
 *
 * Progress only moves forward after a commit, so whatever a run reports as
 * done is on disk. After a failed batch no new batch starts; batches that
 * already committed stay, and re-running the scope picks up the rest.
 */

use anyhow::Result;
use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use super::cancel::CancellationToken;
use super::concurrency::ProviderProfile;
use super::memory::TranslationMemory;
use super::retry::{retry_with_backoff, RetryPolicy};
use crate::app_config::Config;
use crate::database::{ItemUpdate, Repository, TranslationMemoryEntry};
use crate::errors::{ProviderError, TranslationError};
use crate::extraction::DialogueItem;
use crate::masking::TagMasker;
use crate::providers::{BatchRequest, Credentials, Provider};

/// Case-insensitive text filter over an item list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    /// Substring looked up in the original and the translation
    pub query: String,
    /// Only keep items without a translation
    pub untranslated_only: bool,
}

impl ItemFilter {
    /// Whether an item passes the filter
    pub fn matches(&self, item: &DialogueItem) -> bool {
        if self.untranslated_only && !item.is_missing() {
            return false;
        }
        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        item.quote.to_lowercase().contains(&query)
            || item
                .translated
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&query))
    }
}

/// Which items of a file a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunScope {
    /// Every item
    All,
    /// Items passing a filter
    Filtered(ItemFilter),
    /// Items with the given ids
    Selected(Vec<String>),
    /// Items without a translation
    Missing,
}

impl RunScope {
    /// Keep the items this scope covers, in file order
    pub fn select(&self, items: Vec<DialogueItem>) -> Vec<DialogueItem> {
        match self {
            Self::All => items,
            Self::Missing => items.into_iter().filter(|i| i.is_missing()).collect(),
            Self::Filtered(filter) => items.into_iter().filter(|i| filter.matches(i)).collect(),
            Self::Selected(ids) => {
                let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
                items
                    .into_iter()
                    .filter(|i| ids.contains(i.id.as_str()))
                    .collect()
            }
        }
    }
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Canceled,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Committed items out of the run's candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// How a run ended
#[derive(Debug)]
pub struct RunReport {
    /// Terminal state
    pub state: RunState,
    /// Final progress
    pub progress: Progress,
    /// Items filled from translation memory
    pub memory_hits: usize,
    /// Items translated by the provider
    pub translated: usize,
    /// Number of provider batches planned
    pub batches: usize,
    /// 0-based index of the batch that failed the run
    pub failed_batch: Option<usize>,
    /// Why the run failed
    pub error: Option<TranslationError>,
}

impl RunReport {
    fn new(total: usize) -> Self {
        Self {
            state: RunState::Running,
            progress: Progress { done: 0, total },
            memory_hits: 0,
            translated: 0,
            batches: 0,
            failed_batch: None,
            error: None,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} items ({} from memory, {} translated)",
            self.state, self.progress.done, self.progress.total, self.memory_hits, self.translated
        )?;
        if let (Some(batch), Some(error)) = (self.failed_batch, &self.error) {
            write!(f, ", batch {} failed: {}", batch + 1, error)?;
        }
        Ok(())
    }
}

/// Everything a run needs to know besides the items
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub target_language: String,
    /// `None` lets the provider detect the source language
    pub source_language: Option<String>,
    pub credentials: Credentials,
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    pub retry: RetryPolicy,
}

impl RunSettings {
    /// Settings for the active provider, clamped to its profile
    pub fn from_config(config: &Config) -> Self {
        let translation = &config.translation;
        let profile = ProviderProfile::for_provider(translation.provider);
        Self {
            target_language: config.target_language.clone(),
            source_language: config.source_language_hint(),
            credentials: Credentials::with_api_key(translation.get_api_key()),
            batch_size: profile.effective_batch_size(translation.common.batch_size),
            max_concurrent_batches: profile
                .effective_concurrent_batches(translation.common.max_concurrent_batches),
            retry: RetryPolicy::from_config(&translation.common),
        }
    }
}

/// Drives provider batches over a file's items
pub struct BatchOrchestrator {
    provider: Arc<dyn Provider>,
    repo: Repository,
    memory: TranslationMemory,
    settings: RunSettings,
}

enum BatchOutcome {
    Committed(usize),
    Skipped,
    Canceled,
    Failed(usize, TranslationError),
}

impl BatchOrchestrator {
    /// Create an orchestrator
    pub fn new(
        provider: Arc<dyn Provider>,
        repo: Repository,
        memory: TranslationMemory,
        settings: RunSettings,
    ) -> Self {
        Self {
            provider,
            repo,
            memory,
            settings,
        }
    }

    /// Settings in use
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Translate the scope's items of one file.
    ///
    /// Provider failures and cancellation end up in the report; storage
    /// errors before the first batch are returned as errors.
    pub async fn run<P>(
        &self,
        file_id: &str,
        scope: &RunScope,
        cancel: &CancellationToken,
        on_progress: P,
    ) -> Result<RunReport>
    where
        P: Fn(Progress) + Send + Sync,
    {
        let candidates = scope.select(self.repo.get_items(file_id).await?);
        let mut report = RunReport::new(candidates.len());
        info!(
            "Run on {} started: {} candidates with {}",
            file_id,
            candidates.len(),
            self.provider.name()
        );
        on_progress(report.progress);

        if cancel.is_cancelled() {
            report.state = RunState::Canceled;
            info!("Run on {} canceled before start", file_id);
            return Ok(report);
        }

        let remaining = self.prefill_from_memory(candidates, &mut report).await?;
        on_progress(report.progress);

        let batches: Vec<&[DialogueItem]> = remaining.chunks(self.settings.batch_size).collect();
        report.batches = batches.len();
        debug!(
            "{} items left for {} batches of up to {}",
            remaining.len(),
            batches.len(),
            self.settings.batch_size
        );

        let done = AtomicUsize::new(report.progress.done);
        let halted = AtomicBool::new(false);
        let total = report.progress.total;

        let outcomes: Vec<BatchOutcome> = stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| {
                let done = &done;
                let halted = &halted;
                let on_progress = &on_progress;
                async move {
                    if cancel.is_cancelled() {
                        return BatchOutcome::Canceled;
                    }
                    if halted.load(Ordering::SeqCst) {
                        return BatchOutcome::Skipped;
                    }
                    match self.process_batch(index, batch, cancel).await {
                        Ok(count) => {
                            let now = done.fetch_add(count, Ordering::SeqCst) + count;
                            on_progress(Progress { done: now, total });
                            BatchOutcome::Committed(count)
                        }
                        Err(TranslationError::Provider(ProviderError::Cancelled)) => {
                            BatchOutcome::Canceled
                        }
                        Err(e) => {
                            halted.store(true, Ordering::SeqCst);
                            error!("Batch {} of {} failed: {}", index + 1, file_id, e);
                            BatchOutcome::Failed(index, e)
                        }
                    }
                }
            })
            .buffer_unordered(self.settings.max_concurrent_batches)
            .collect()
            .await;

        report.progress.done = done.load(Ordering::SeqCst);
        let mut canceled = false;
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Committed(count) => report.translated += count,
                BatchOutcome::Canceled => canceled = true,
                BatchOutcome::Skipped => {}
                BatchOutcome::Failed(index, e) => {
                    if report.failed_batch.is_none_or(|first| index < first) {
                        report.failed_batch = Some(index);
                        report.error = Some(e);
                    }
                }
            }
        }

        report.state = if report.failed_batch.is_some() {
            RunState::Failed
        } else if canceled || (cancel.is_cancelled() && report.progress.done < total) {
            RunState::Canceled
        } else {
            RunState::Completed
        };

        match report.state {
            RunState::Failed => error!("Run on {} {}", file_id, report),
            _ => info!("Run on {} {}", file_id, report),
        }
        Ok(report)
    }

    /// Commit memory hits for the candidates, returning the items still to translate
    async fn prefill_from_memory(
        &self,
        candidates: Vec<DialogueItem>,
        report: &mut RunReport,
    ) -> Result<Vec<DialogueItem>> {
        if !self.memory.is_enabled() || candidates.is_empty() {
            return Ok(candidates);
        }

        let keys: Vec<String> = candidates
            .iter()
            .map(|item| item.cache_key.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let hits = self
            .memory
            .lookup_many(&self.settings.target_language, &keys)
            .await?;
        if hits.is_empty() {
            return Ok(candidates);
        }

        let mut updates = Vec::new();
        let mut remaining = Vec::new();
        for item in candidates {
            match hits.get(&item.cache_key) {
                Some(masked) => {
                    let text = TagMasker::unmask(masked, &item.placeholder_map);
                    updates.push(ItemUpdate::now(item.id.clone(), Some(text)));
                }
                None => remaining.push(item),
            }
        }

        let count = updates.len();
        self.repo.commit_batch(updates, Vec::new()).await?;
        report.memory_hits = count;
        report.progress.done += count;
        info!("Filled {} items from translation memory", count);

        Ok(remaining)
    }

    async fn process_batch(
        &self,
        index: usize,
        items: &[DialogueItem],
        cancel: &CancellationToken,
    ) -> Result<usize, TranslationError> {
        let request = BatchRequest {
            payload: items.iter().map(|item| item.masked_quote.clone()).collect(),
            target_language: self.settings.target_language.clone(),
            source_language: self.settings.source_language.clone(),
            credentials: self.settings.credentials.clone(),
        };

        let outputs = retry_with_backoff(&self.settings.retry, cancel, |attempt| {
            debug!("Batch {} attempt {}: {} lines", index + 1, attempt, request.payload.len());
            self.provider.translate_batch(&request, cancel)
        })
        .await?;

        // Adapters check this too; a misaligned commit would corrupt lines silently
        if outputs.len() != items.len() {
            return Err(ProviderError::LengthMismatch {
                expected: items.len(),
                actual: outputs.len(),
            }
            .into());
        }

        let mut updates = Vec::with_capacity(items.len());
        let mut memory: HashMap<String, TranslationMemoryEntry> = HashMap::new();
        for (item, output) in items.iter().zip(&outputs) {
            let warnings = TagMasker::check_integrity(output, &item.placeholder_map);
            TagMasker::log_warnings(&item.id, &warnings);

            let text = TagMasker::unmask(output, &item.placeholder_map);
            updates.push(ItemUpdate::now(item.id.clone(), Some(text)));

            if self.memory.is_enabled() {
                let entry =
                    TranslationMemory::entry(&self.settings.target_language, &item.masked_quote, output);
                memory.insert(entry.key.clone(), entry);
            }
        }

        let count = updates.len();
        self.repo
            .commit_batch(updates, memory.into_values().collect())
            .await
            .map_err(|e| TranslationError::Storage(format!("{:#}", e)))?;
        debug!("Batch {} committed ({} items)", index + 1, count);

        Ok(count)
    }
}

struct RunSlot {
    token: CancellationToken,
    lock: Arc<tokio::sync::Mutex<()>>,
}

/// One active run per file.
///
/// Starting a run cancels the previous run's token and then waits for that
/// run to let go of the file.
#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, RunSlot>>,
}

/// Exclusive claim on a file for the duration of a run
pub struct RunGuard {
    file_id: String,
    token: CancellationToken,
    _lock: OwnedMutexGuard<()>,
}

impl RunGuard {
    /// Token of this run
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// File this run holds
    pub fn file_id(&self) -> &str {
        &self.file_id
    }
}

impl RunRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a file, cancelling and awaiting any run already on it
    pub async fn begin(&self, file_id: &str) -> RunGuard {
        let token = CancellationToken::new();
        let lock = {
            let mut runs = self.runs.lock();
            let slot = runs.entry(file_id.to_string()).or_insert_with(|| RunSlot {
                token: CancellationToken::new(),
                lock: Arc::new(tokio::sync::Mutex::new(())),
            });
            slot.token.cancel();
            slot.token = token.clone();
            Arc::clone(&slot.lock)
        };

        let guard = lock.lock_owned().await;
        RunGuard {
            file_id: file_id.to_string(),
            token,
            _lock: guard,
        }
    }

    /// Cancel the current run on a file. Returns whether one was active.
    pub fn cancel(&self, file_id: &str) -> bool {
        let runs = self.runs.lock();
        match runs.get(file_id) {
            Some(slot) if slot.lock.try_lock().is_err() => {
                slot.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Whether a run currently holds the file
    pub fn is_running(&self, file_id: &str) -> bool {
        self.runs
            .lock()
            .get(file_id)
            .is_some_and(|slot| slot.lock.try_lock().is_err())
    }
}
