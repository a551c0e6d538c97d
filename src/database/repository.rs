/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 */

use anyhow::Result;
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

use super::connection::DatabaseConnection;
use super::models::{FileSummary, ItemUpdate, TmStats, TranslationMemoryEntry};
use crate::extraction::{DialogueItem, FileRecord};

const ITEM_COLUMNS: &str = "id, file_id, idx, line_index, content_start, content_end, quote_char, \
     is_triple, syntax, quote, masked_quote, placeholder_map, cache_key, translated, updated_at";

const TM_COLUMNS: &str =
    "key, target_language, source_key, source_text, translated_text, created_at, updated_at, usage_count";

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // File Operations
    // =========================================================================

    /// Insert a file and all of its items in one transaction
    pub async fn insert_file(&self, record: &FileRecord) -> Result<()> {
        let record = record.clone();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    r#"
                    INSERT INTO files (
                        id, name, relative_path, format, source_text, source_hash, eol, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                    params![
                        record.id,
                        record.name,
                        record.relative_path,
                        record.format.to_string(),
                        record.source_text,
                        record.source_hash,
                        record.eol.to_string(),
                        record.created_at,
                    ],
                )?;

                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO dialogue_items ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    ITEM_COLUMNS
                ))?;

                for item in &record.items {
                    stmt.execute(params![
                        item.id,
                        item.file_id,
                        item.index as i64,
                        item.line_index as i64,
                        item.content_start as i64,
                        item.content_end as i64,
                        item.quote_char.to_string(),
                        item.is_triple,
                        item.syntax.to_string(),
                        item.quote,
                        item.masked_quote,
                        serde_json::to_string(&item.placeholder_map)?,
                        item.cache_key,
                        item.translated,
                        item.updated_at,
                    ])?;
                }

                debug!("Stored file {} with {} items", record.id, record.items.len());
                Ok(())
            })
            .await
    }

    /// Load a file with its items
    pub async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>> {
        let file_id = file_id.to_string();

        self.db
            .execute_async(move |conn| {
                let record = conn
                    .query_row(
                        r#"
                        SELECT id, name, relative_path, format, source_text, source_hash, eol, created_at
                        FROM files WHERE id = ?1
                        "#,
                        [&file_id],
                        |row| {
                            Ok(FileRecord {
                                id: row.get(0)?,
                                name: row.get(1)?,
                                relative_path: row.get(2)?,
                                format: parse_column(row, 3)?,
                                source_text: row.get(4)?,
                                source_hash: row.get(5)?,
                                eol: parse_column(row, 6)?,
                                created_at: row.get(7)?,
                                items: Vec::new(),
                            })
                        },
                    )
                    .optional()?;

                match record {
                    Some(mut record) => {
                        record.items = Self::get_items_sync(conn, &file_id)?;
                        Ok(Some(record))
                    }
                    None => Ok(None),
                }
            })
            .await
    }

    /// Newest stored file with this relative path and source hash
    pub async fn find_file(&self, relative_path: &str, source_hash: &str) -> Result<Option<FileRecord>> {
        let relative_path = relative_path.to_string();
        let source_hash = source_hash.to_string();

        let file_id = self
            .db
            .execute_async(move |conn| {
                let id = conn
                    .query_row(
                        r#"
                        SELECT id FROM files
                        WHERE relative_path = ?1 AND source_hash = ?2
                        ORDER BY created_at DESC
                        LIMIT 1
                        "#,
                        params![relative_path, source_hash],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(id)
            })
            .await?;

        match file_id {
            Some(id) => self.get_file(&id).await,
            None => Ok(None),
        }
    }

    /// List imported files with translation progress
    pub async fn list_files(&self) -> Result<Vec<FileSummary>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT f.id, f.name, f.relative_path, f.format, f.created_at,
                           COUNT(i.id), COUNT(i.translated)
                    FROM files f
                    LEFT JOIN dialogue_items i ON i.file_id = f.id
                    GROUP BY f.id
                    ORDER BY f.relative_path
                    "#,
                )?;

                let files = stmt
                    .query_map([], |row| {
                        Ok(FileSummary {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            relative_path: row.get(2)?,
                            format: parse_column(row, 3)?,
                            created_at: row.get(4)?,
                            item_count: row.get(5)?,
                            translated_count: row.get(6)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(files)
            })
            .await
    }

    /// Delete a file; its items go with it. Returns whether it existed.
    pub async fn delete_file(&self, file_id: &str) -> Result<bool> {
        let file_id = file_id.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM files WHERE id = ?1", [&file_id])?;
                Ok(deleted > 0)
            })
            .await
    }

    // =========================================================================
    // Dialogue Item Operations
    // =========================================================================

    /// Items of a file ordered by index
    pub async fn get_items(&self, file_id: &str) -> Result<Vec<DialogueItem>> {
        let file_id = file_id.to_string();

        self.db
            .execute_async(move |conn| Self::get_items_sync(conn, &file_id))
            .await
    }

    fn get_items_sync(conn: &Connection, file_id: &str) -> Result<Vec<DialogueItem>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM dialogue_items WHERE file_id = ?1 ORDER BY idx",
            ITEM_COLUMNS
        ))?;

        let items = stmt
            .query_map([file_id], parse_item_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(items)
    }

    /// A single item by id
    pub async fn get_item(&self, item_id: &str) -> Result<Option<DialogueItem>> {
        let item_id = item_id.to_string();

        self.db
            .execute_async(move |conn| {
                let item = conn
                    .query_row(
                        &format!("SELECT {} FROM dialogue_items WHERE id = ?1", ITEM_COLUMNS),
                        [&item_id],
                        parse_item_row,
                    )
                    .optional()?;
                Ok(item)
            })
            .await
    }

    /// Set or clear one item's translation. Returns whether the item exists.
    pub async fn set_translation(&self, update: ItemUpdate) -> Result<bool> {
        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    "UPDATE dialogue_items SET translated = ?1, updated_at = ?2 WHERE id = ?3",
                    params![update.translated, update.updated_at, update.item_id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Apply item updates and memory upserts in a single transaction.
    ///
    /// Either every row of the batch is written or none is.
    pub async fn commit_batch(
        &self,
        updates: Vec<ItemUpdate>,
        memory: Vec<TranslationMemoryEntry>,
    ) -> Result<()> {
        self.db
            .transaction_async(move |tx| {
                {
                    let mut stmt = tx.prepare(
                        "UPDATE dialogue_items SET translated = ?1, updated_at = ?2 WHERE id = ?3",
                    )?;
                    for update in &updates {
                        stmt.execute(params![update.translated, update.updated_at, update.item_id])?;
                    }
                }
                Self::tm_upsert_sync(tx, &memory)?;

                debug!(
                    "Committed batch: {} items, {} memory entries",
                    updates.len(),
                    memory.len()
                );
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Translation Memory Operations
    // =========================================================================

    /// Look up many keys at once, bumping the usage counter of each hit
    pub async fn tm_lookup_many(
        &self,
        keys: Vec<String>,
    ) -> Result<HashMap<String, TranslationMemoryEntry>> {
        self.db
            .transaction_async(move |tx| {
                let mut found = HashMap::new();
                {
                    let mut select = tx.prepare(&format!(
                        "SELECT {} FROM translation_memory WHERE key = ?1",
                        TM_COLUMNS
                    ))?;
                    let mut bump = tx.prepare(
                        "UPDATE translation_memory SET usage_count = usage_count + 1 WHERE key = ?1",
                    )?;

                    for key in keys {
                        if found.contains_key(&key) {
                            continue;
                        }
                        if let Some(entry) = select.query_row([&key], parse_tm_row).optional()? {
                            bump.execute([&key])?;
                            found.insert(key, entry);
                        }
                    }
                }
                Ok(found)
            })
            .await
    }

    /// One entry by storage key, without touching its counter
    pub async fn tm_get(&self, key: &str) -> Result<Option<TranslationMemoryEntry>> {
        let key = key.to_string();

        self.db
            .execute_async(move |conn| {
                let entry = conn
                    .query_row(
                        &format!("SELECT {} FROM translation_memory WHERE key = ?1", TM_COLUMNS),
                        [&key],
                        parse_tm_row,
                    )
                    .optional()?;
                Ok(entry)
            })
            .await
    }

    /// Insert or update entries; the last write wins
    pub async fn tm_upsert_many(&self, entries: Vec<TranslationMemoryEntry>) -> Result<()> {
        self.db
            .transaction_async(move |tx| Self::tm_upsert_sync(tx, &entries))
            .await
    }

    fn tm_upsert_sync(conn: &Connection, entries: &[TranslationMemoryEntry]) -> Result<()> {
        let mut stmt = conn.prepare(
            r#"
            INSERT INTO translation_memory (
                key, target_language, source_key, source_text, translated_text,
                created_at, updated_at, usage_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(key) DO UPDATE SET
                source_text = excluded.source_text,
                translated_text = excluded.translated_text,
                updated_at = excluded.updated_at
            "#,
        )?;

        for entry in entries {
            stmt.execute(params![
                entry.key,
                entry.target_language,
                entry.source_key,
                entry.source_text,
                entry.translated_text,
                entry.created_at,
                entry.updated_at,
                entry.usage_count,
            ])?;
        }
        Ok(())
    }

    /// Replace entries wholesale, counters and timestamps included
    pub async fn tm_import(&self, entries: Vec<TranslationMemoryEntry>) -> Result<usize> {
        self.db
            .transaction_async(move |tx| {
                let mut stmt = tx.prepare(&format!(
                    "INSERT OR REPLACE INTO translation_memory ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    TM_COLUMNS
                ))?;
                for entry in &entries {
                    stmt.execute(params![
                        entry.key,
                        entry.target_language,
                        entry.source_key,
                        entry.source_text,
                        entry.translated_text,
                        entry.created_at,
                        entry.updated_at,
                        entry.usage_count,
                    ])?;
                }
                Ok(entries.len())
            })
            .await
    }

    /// Every entry, ordered by key
    pub async fn tm_export_all(&self) -> Result<Vec<TranslationMemoryEntry>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM translation_memory ORDER BY key",
                    TM_COLUMNS
                ))?;
                let entries = stmt
                    .query_map([], parse_tm_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(entries)
            })
            .await
    }

    /// Memory statistics
    pub async fn tm_stats(&self) -> Result<TmStats> {
        self.db
            .execute_async(|conn| {
                let stats = conn.query_row(
                    r#"
                    SELECT COUNT(*), COALESCE(SUM(usage_count), 0), COUNT(DISTINCT target_language)
                    FROM translation_memory
                    "#,
                    [],
                    |row| {
                        Ok(TmStats {
                            entries: row.get(0)?,
                            total_usage: row.get(1)?,
                            languages: row.get(2)?,
                        })
                    },
                )?;
                Ok(stats)
            })
            .await
    }

    /// Remove every entry, returning how many were deleted
    pub async fn tm_clear(&self) -> Result<usize> {
        self.db
            .execute_async(|conn| Ok(conn.execute("DELETE FROM translation_memory", [])?))
            .await
    }
}

/// Parse a text column through `FromStr`
fn parse_column<T>(row: &Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: String = row.get(index)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, e.into()))
}

fn parse_item_row(row: &Row<'_>) -> rusqlite::Result<DialogueItem> {
    let quote_char: String = row.get(6)?;
    let placeholder_json: String = row.get(11)?;

    Ok(DialogueItem {
        id: row.get(0)?,
        file_id: row.get(1)?,
        index: row.get::<_, i64>(2)? as usize,
        line_index: row.get::<_, i64>(3)? as usize,
        content_start: row.get::<_, i64>(4)? as usize,
        content_end: row.get::<_, i64>(5)? as usize,
        quote_char: quote_char.chars().next().unwrap_or('"'),
        is_triple: row.get(7)?,
        syntax: parse_column(row, 8)?,
        quote: row.get(9)?,
        masked_quote: row.get(10)?,
        placeholder_map: serde_json::from_str(&placeholder_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e))
        })?,
        cache_key: row.get(12)?,
        translated: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn parse_tm_row(row: &Row<'_>) -> rusqlite::Result<TranslationMemoryEntry> {
    Ok(TranslationMemoryEntry {
        key: row.get(0)?,
        target_language: row.get(1)?,
        source_key: row.get(2)?,
        source_text: row.get(3)?,
        translated_text: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        usage_count: row.get(7)?,
    })
}
