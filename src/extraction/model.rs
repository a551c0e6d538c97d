/*!
 * Dialogue items and file snapshots.
 */

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

use crate::errors::ExtractionError;
use crate::masking::PlaceholderMap;

/// Kind of source we extract from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Script text with quoted literals
    Script,
    /// JSON document walked for string leaves
    Json,
}

impl SourceFormat {
    /// Resolve a format tag such as `script` or `json`
    pub fn parse(tag: &str) -> Result<Self, ExtractionError> {
        match tag.trim().to_lowercase().as_str() {
            "script" | "rpy" | "rpym" | "txt" => Ok(Self::Script),
            "json" | "structured" => Ok(Self::Json),
            other => Err(ExtractionError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Resolve the format from a file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ExtractionError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "rpy" | "rpym" | "txt" | "script" => Ok(Self::Script),
            "json" => Ok(Self::Json),
            "" => Err(ExtractionError::UnsupportedFormat(
                path.display().to_string(),
            )),
            other => Err(ExtractionError::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Script => write!(f, "script"),
            SourceFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for SourceFormat {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// How inclusively ambiguous string literals are treated as dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Only literals in speaker statement position
    Safe,
    /// Speaker statements plus prose-looking literals elsewhere
    #[default]
    Balanced,
    /// Every literal with alphabetic content
    Aggressive,
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Safe => write!(f, "safe"),
            ExtractionMode::Balanced => write!(f, "balanced"),
            ExtractionMode::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl std::str::FromStr for ExtractionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safe" => Ok(ExtractionMode::Safe),
            "balanced" => Ok(ExtractionMode::Balanced),
            "aggressive" => Ok(ExtractionMode::Aggressive),
            _ => Err(anyhow::anyhow!("Invalid extraction mode: {}", s)),
        }
    }
}

/// Literal syntax a payload was read from, which decides how it is re-escaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralSyntax {
    /// Script string literal (backslash escapes, optional triple quoting)
    Script,
    /// JSON string
    Json,
}

impl fmt::Display for LiteralSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralSyntax::Script => write!(f, "script"),
            LiteralSyntax::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LiteralSyntax {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "script" => Ok(LiteralSyntax::Script),
            "json" => Ok(LiteralSyntax::Json),
            _ => Err(anyhow::anyhow!("Invalid literal syntax: {}", s)),
        }
    }
}

/// End-of-line convention of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EolStyle {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    Crlf,
    /// `\r`
    Cr,
}

impl EolStyle {
    /// Detect the dominant line ending of a text
    pub fn detect(text: &str) -> Self {
        let crlf = text.matches("\r\n").count();
        let lf = text.matches('\n').count() - crlf;
        let cr = text.matches('\r').count() - crlf;

        if crlf > 0 && crlf >= lf && crlf >= cr {
            EolStyle::Crlf
        } else if cr > lf {
            EolStyle::Cr
        } else {
            EolStyle::Lf
        }
    }

    /// Line terminator for this style
    pub fn as_str(&self) -> &'static str {
        match self {
            EolStyle::Lf => "\n",
            EolStyle::Crlf => "\r\n",
            EolStyle::Cr => "\r",
        }
    }

    /// Rewrite every line break in `text` to this style
    pub fn apply(&self, text: &str) -> String {
        if !text.contains('\n') && !text.contains('\r') {
            return text.to_string();
        }
        let unified = text.replace("\r\n", "\n").replace('\r', "\n");
        match self {
            EolStyle::Lf => unified,
            _ => unified.replace('\n', self.as_str()),
        }
    }
}

impl fmt::Display for EolStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EolStyle::Lf => write!(f, "lf"),
            EolStyle::Crlf => write!(f, "crlf"),
            EolStyle::Cr => write!(f, "cr"),
        }
    }
}

impl std::str::FromStr for EolStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lf" => Ok(EolStyle::Lf),
            "crlf" => Ok(EolStyle::Crlf),
            "cr" => Ok(EolStyle::Cr),
            _ => Err(anyhow::anyhow!("Invalid end-of-line style: {}", s)),
        }
    }
}

/// One translatable quoted span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueItem {
    /// `{file_id}:{index}`
    pub id: String,
    /// Owning file
    pub file_id: String,
    /// Position within the file
    pub index: usize,
    /// 1-based line of the first payload byte
    pub line_index: usize,
    /// Byte offset of the payload start
    pub content_start: usize,
    /// Byte offset one past the payload end
    pub content_end: usize,
    /// Delimiter character
    pub quote_char: char,
    /// Triple-quoted literal
    pub is_triple: bool,
    /// Escaping rules of the literal
    pub syntax: LiteralSyntax,
    /// Original text
    pub quote: String,
    /// Text submitted to providers
    pub masked_quote: String,
    /// Token to tag mapping for `masked_quote`
    pub placeholder_map: PlaceholderMap,
    /// Translation memory key
    pub cache_key: String,
    /// Final text, `None` until translated
    pub translated: Option<String>,
    /// Last mutation (RFC 3339)
    pub updated_at: String,
}

impl DialogueItem {
    /// Positional id for an item
    pub fn make_id(file_id: &str, index: usize) -> String {
        format!("{}:{}", file_id, index)
    }

    /// Whether the item still needs a translation
    pub fn is_missing(&self) -> bool {
        self.translated.is_none()
    }
}

/// Imported source file with its dialogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Unique file identifier (UUID)
    pub id: String,
    /// Display name
    pub name: String,
    /// Path relative to the imported root, used for archives
    pub relative_path: String,
    /// Source format
    pub format: SourceFormat,
    /// Untouched source text
    pub source_text: String,
    /// SHA256 of the source text
    pub source_hash: String,
    /// Detected line endings
    pub eol: EolStyle,
    /// Import time (RFC 3339)
    pub created_at: String,
    /// Extracted dialogue, ordered by index
    pub items: Vec<DialogueItem>,
}

impl FileRecord {
    /// Compute SHA256 hash of text
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
