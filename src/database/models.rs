/*!
 * Database entity models and DTOs.
 *
 * File and dialogue rows map onto the extraction types directly; the
 * structures here cover the translation memory and the summaries and
 * updates exchanged with the repository.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extraction::SourceFormat;

/// One translation memory row.
///
/// Source and translation are stored masked, so a hit can be restored with
/// the tags of whichever item asks for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationMemoryEntry {
    /// `{target_language}::{source_key}`
    pub key: String,
    /// Lowercased target language
    pub target_language: String,
    /// Normalized masked source
    pub source_key: String,
    /// Masked source as first seen
    pub source_text: String,
    /// Masked translation
    pub translated_text: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
    /// Number of lookups served
    #[serde(default)]
    pub usage_count: i64,
}

impl TranslationMemoryEntry {
    /// Create a fresh entry
    pub fn new(
        key: String,
        target_language: String,
        source_key: String,
        source_text: String,
        translated_text: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            key,
            target_language,
            source_key,
            source_text,
            translated_text,
            created_at: now.clone(),
            updated_at: now,
            usage_count: 0,
        }
    }
}

/// New translated text for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate {
    /// Item id (`{file_id}:{index}`)
    pub item_id: String,
    /// New text, `None` clears the translation
    pub translated: Option<String>,
    /// Mutation timestamp (RFC 3339)
    pub updated_at: String,
}

impl ItemUpdate {
    /// Update stamped with the current time
    pub fn now(item_id: impl Into<String>, translated: Option<String>) -> Self {
        Self {
            item_id: item_id.into(),
            translated,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// File listing row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    /// File id
    pub id: String,
    /// Display name
    pub name: String,
    /// Archive path
    pub relative_path: String,
    /// Source format
    pub format: SourceFormat,
    /// Number of dialogue items
    pub item_count: i64,
    /// Number of items with a translation
    pub translated_count: i64,
    /// Import time
    pub created_at: String,
}

impl FileSummary {
    /// Translated share in percent
    pub fn progress_percent(&self) -> f64 {
        if self.item_count == 0 {
            100.0
        } else {
            self.translated_count as f64 * 100.0 / self.item_count as f64
        }
    }
}

impl fmt::Display for FileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}/{} translated ({:.0}%)",
            self.relative_path,
            self.format,
            self.translated_count,
            self.item_count,
            self.progress_percent()
        )
    }
}

/// Translation memory statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmStats {
    /// Number of entries
    pub entries: i64,
    /// Sum of usage counters
    pub total_usage: i64,
    /// Number of distinct target languages
    pub languages: i64,
}

impl fmt::Display for TmStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entries: {}, Languages: {}, Reuses: {}",
            self.entries, self.languages, self.total_usage
        )
    }
}
