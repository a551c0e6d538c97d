/*!
 * Translation memory.
 *
 * A persistent cache from (target language, normalized masked source) to a
 * masked translation. Because both sides are stored masked, a hit recorded
 * for `Hello [name]!` also serves `Hello [player]!`: the tokens are
 * restored with the requesting item's own placeholder map.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::database::{Repository, TmStats, TranslationMemoryEntry};

/// Version written to and accepted from export files
pub const EXPORT_VERSION: u32 = 1;

/// Trim and collapse internal whitespace runs to one space
pub fn normalize_source_key(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Storage key for a language and a normalized source
pub fn storage_key(target_language: &str, source_key: &str) -> String {
    format!("{}::{}", target_language.trim().to_lowercase(), source_key)
}

/// Portable export document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmExport {
    /// Format version
    pub version: u32,
    /// Export time (RFC 3339)
    pub exported_at: String,
    /// All entries
    pub entries: Vec<TranslationMemoryEntry>,
}

/// Translation memory over the repository
#[derive(Clone)]
pub struct TranslationMemory {
    repo: Repository,
    enabled: bool,
}

impl TranslationMemory {
    /// Create a memory; a disabled memory never hits and never records
    pub fn new(repo: Repository, enabled: bool) -> Self {
        Self { repo, enabled }
    }

    /// Whether lookups and recording are active
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Build an entry without storing it
    pub fn entry(
        target_language: &str,
        masked_source: &str,
        masked_translation: &str,
    ) -> TranslationMemoryEntry {
        let source_key = normalize_source_key(masked_source);
        TranslationMemoryEntry::new(
            storage_key(target_language, &source_key),
            target_language.trim().to_lowercase(),
            source_key,
            masked_source.to_string(),
            masked_translation.to_string(),
        )
    }

    /// Bulk lookup by cache key.
    ///
    /// Returns masked translations keyed by the cache keys that hit.
    pub async fn lookup_many(
        &self,
        target_language: &str,
        cache_keys: &[String],
    ) -> Result<HashMap<String, String>> {
        if !self.enabled || cache_keys.is_empty() {
            return Ok(HashMap::new());
        }

        let by_storage: HashMap<String, String> = cache_keys
            .iter()
            .map(|key| (storage_key(target_language, key), key.clone()))
            .collect();

        let hits = self
            .repo
            .tm_lookup_many(by_storage.keys().cloned().collect())
            .await
            .context("Failed to query translation memory")?;

        debug!(
            "Translation memory: {} of {} distinct keys hit",
            hits.len(),
            by_storage.len()
        );

        Ok(hits
            .into_iter()
            .filter_map(|(storage, entry)| {
                by_storage
                    .get(&storage)
                    .map(|cache_key| (cache_key.clone(), entry.translated_text))
            })
            .collect())
    }

    /// Single lookup by cache key
    pub async fn get(&self, target_language: &str, cache_key: &str) -> Result<Option<String>> {
        if !self.enabled {
            return Ok(None);
        }
        let entry = self
            .repo
            .tm_get(&storage_key(target_language, cache_key))
            .await?;
        Ok(entry.map(|e| e.translated_text))
    }

    /// Record a single masked pair
    pub async fn record(
        &self,
        target_language: &str,
        masked_source: &str,
        masked_translation: &str,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.repo
            .tm_upsert_many(vec![Self::entry(
                target_language,
                masked_source,
                masked_translation,
            )])
            .await
    }

    /// Write every entry to a JSON file, returning the entry count
    pub async fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let export = TmExport {
            version: EXPORT_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            entries: self.repo.tm_export_all().await?,
        };

        let json = serde_json::to_string_pretty(&export)
            .context("Failed to serialize translation memory")?;
        crate::file_utils::FileManager::write_atomic(path, &json)?;

        info!(
            "Exported {} translation memory entries to {}",
            export.entries.len(),
            path.display()
        );
        Ok(export.entries.len())
    }

    /// Merge entries from a JSON export, overwriting by key
    pub async fn import_json<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read translation memory file: {}", path.display()))?;
        let export: TmExport = serde_json::from_str(&content)
            .with_context(|| format!("Invalid translation memory file: {}", path.display()))?;

        if export.version != EXPORT_VERSION {
            return Err(anyhow::anyhow!(
                "Unsupported translation memory version {} (expected {})",
                export.version,
                EXPORT_VERSION
            ));
        }

        let entries: Vec<TranslationMemoryEntry> = export
            .entries
            .into_iter()
            .map(|mut entry| {
                entry.target_language = entry.target_language.trim().to_lowercase();
                entry.source_key = normalize_source_key(&entry.source_key);
                entry.key = storage_key(&entry.target_language, &entry.source_key);
                entry
            })
            .collect();

        let count = self.repo.tm_import(entries).await?;
        info!(
            "Imported {} translation memory entries from {}",
            count,
            path.display()
        );
        Ok(count)
    }

    /// Entry and usage counts
    pub async fn stats(&self) -> Result<TmStats> {
        self.repo.tm_stats().await
    }

    /// Drop every entry
    pub async fn clear(&self) -> Result<usize> {
        self.repo.tm_clear().await
    }
}
