/*!
 * Dialogue extraction.
 *
 * Turns a script or a JSON document into an ordered list of dialogue items
 * that carry the exact byte range of their payload in the source, so that
 * translations can later be spliced back without touching anything else.
 */

pub mod model;
pub mod script;
pub mod structured;

use log::debug;

use crate::errors::ExtractionError;
use crate::masking::TagMasker;
use crate::translation::memory::normalize_source_key;

pub use model::{
    DialogueItem, EolStyle, ExtractionMode, FileRecord, LiteralSyntax, SourceFormat,
};
pub use structured::{StructuredValue, TextLeaf};

/// Byte offsets of every line start, for offset to line lookups
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    /// Index a text. `\n`, `\r\n` and lone `\r` all end a line.
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut starts = vec![0];
        for (i, b) in bytes.iter().enumerate() {
            match b {
                b'\n' => starts.push(i + 1),
                b'\r' if bytes.get(i + 1) != Some(&b'\n') => starts.push(i + 1),
                _ => {}
            }
        }
        Self { starts }
    }

    /// 1-based line containing `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|start| *start <= offset).max(1)
    }

    /// Offset of the first byte of the line containing `offset`
    pub fn line_start(&self, offset: usize) -> usize {
        self.starts[self.line_of(offset) - 1]
    }
}

/// Accepted span before masking
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawSpan {
    pub content_start: usize,
    pub content_end: usize,
    pub quote_char: char,
    pub is_triple: bool,
    pub syntax: LiteralSyntax,
    pub value: String,
}

/// Dialogue extractor for one extraction mode
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor {
    mode: ExtractionMode,
}

impl Extractor {
    /// Create an extractor
    pub fn new(mode: ExtractionMode) -> Self {
        Self { mode }
    }

    /// Mode in use
    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Extract dialogue items, ordered by position, masked and keyed.
    ///
    /// Identical input and mode always yield the identical item list
    /// (apart from `updated_at`).
    pub fn extract(
        &self,
        file_id: &str,
        text: &str,
        format: SourceFormat,
    ) -> Result<Vec<DialogueItem>, ExtractionError> {
        let lines = LineIndex::new(text);
        let spans = match format {
            SourceFormat::Script => script::extract(text, self.mode, &lines)?,
            SourceFormat::Json => structured::extract(text, self.mode)?,
        };

        let now = chrono::Utc::now().to_rfc3339();
        let items: Vec<DialogueItem> = spans
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                let masked = TagMasker::mask(&span.value);
                DialogueItem {
                    id: DialogueItem::make_id(file_id, index),
                    file_id: file_id.to_string(),
                    index,
                    line_index: lines.line_of(span.content_start),
                    content_start: span.content_start,
                    content_end: span.content_end,
                    quote_char: span.quote_char,
                    is_triple: span.is_triple,
                    syntax: span.syntax,
                    quote: span.value,
                    cache_key: normalize_source_key(&masked.masked),
                    masked_quote: masked.masked,
                    placeholder_map: masked.placeholders,
                    translated: None,
                    updated_at: now.clone(),
                }
            })
            .collect();

        debug!(
            "Extracted {} dialogue items from {} source ({} mode)",
            items.len(),
            format,
            self.mode
        );

        Ok(items)
    }

    /// Build a complete file snapshot with a fresh id and its items
    pub fn build_record(
        &self,
        name: &str,
        relative_path: &str,
        text: &str,
        format: SourceFormat,
    ) -> Result<FileRecord, ExtractionError> {
        let id = uuid::Uuid::new_v4().to_string();
        let items = self.extract(&id, text, format)?;

        Ok(FileRecord {
            id,
            name: name.to_string(),
            relative_path: relative_path.to_string(),
            format,
            source_text: text.to_string(),
            source_hash: FileRecord::hash_text(text),
            eol: EolStyle::detect(text),
            created_at: chrono::Utc::now().to_rfc3339(),
            items,
        })
    }
}

/// Extract with a format tag such as `script` or `json`
pub fn extract_tagged(
    file_id: &str,
    text: &str,
    format_tag: &str,
    mode: ExtractionMode,
) -> Result<Vec<DialogueItem>, ExtractionError> {
    let format = SourceFormat::parse(format_tag)?;
    Extractor::new(mode).extract(file_id, text, format)
}
