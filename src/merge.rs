/*!
 * Reinsertion of translated dialogue into the original source.
 *
 * Translations are spliced into each item's recorded payload range, from
 * the highest offset down so earlier ranges never shift. Everything outside
 * those ranges is copied byte for byte.
 */

use log::debug;

use crate::errors::MergeError;
use crate::extraction::{DialogueItem, EolStyle, FileRecord, LiteralSyntax};

/// Splices translations into a source text
pub struct Merger;

impl Merger {
    /// Compose the final text of a file from its stored items
    pub fn render(record: &FileRecord) -> Result<String, MergeError> {
        Self::apply(&record.source_text, record.eol, &record.items)
    }

    /// Splice every translated item into `source`.
    ///
    /// Untranslated items and items whose translation equals the original
    /// quote are left as they are.
    pub fn apply(source: &str, eol: EolStyle, items: &[DialogueItem]) -> Result<String, MergeError> {
        let mut candidates: Vec<&DialogueItem> =
            items.iter().filter(|item| item.translated.is_some()).collect();
        candidates.sort_by(|a, b| b.content_start.cmp(&a.content_start));

        for item in &candidates {
            Self::check_range(source, item)?;
        }
        for pair in candidates.windows(2) {
            let (higher, lower) = (pair[0], pair[1]);
            if lower.content_end > higher.content_start {
                return Err(MergeError::Overlap {
                    first: lower.id.clone(),
                    second: higher.id.clone(),
                });
            }
        }

        let mut output = source.to_string();
        let mut spliced = 0;
        for item in candidates {
            let Some(translated) = item.translated.as_deref() else {
                continue;
            };
            if translated == item.quote {
                continue;
            }
            let escaped = escape_for_literal(item, translated, eol)?;
            output.replace_range(item.content_start..item.content_end, &escaped);
            spliced += 1;
        }

        debug!("Merged {} translated items into source", spliced);
        Ok(output)
    }

    fn check_range(source: &str, item: &DialogueItem) -> Result<(), MergeError> {
        let (start, end) = (item.content_start, item.content_end);
        if start > end || end > source.len() {
            return Err(MergeError::OutOfBounds {
                item_id: item.id.clone(),
                start,
                end,
                len: source.len(),
            });
        }
        if !source.is_char_boundary(start) || !source.is_char_boundary(end) {
            return Err(MergeError::NotCharBoundary(item.id.clone()));
        }
        Ok(())
    }
}

/// Escape a translation for the literal an item was read from
pub fn escape_for_literal(
    item: &DialogueItem,
    text: &str,
    eol: EolStyle,
) -> Result<String, MergeError> {
    match item.syntax {
        LiteralSyntax::Json => escape_json(text).map_err(|e| MergeError::Encoding {
            item_id: item.id.clone(),
            message: e.to_string(),
        }),
        LiteralSyntax::Script => {
            let escaped = if item.is_triple {
                escape_triple(text, item.quote_char)
            } else {
                escape_single(text, item.quote_char)
            };
            Ok(eol.apply(&escaped))
        }
    }
}

/// Escape for a single-delimited script literal.
///
/// Existing escape pairs pass through, bare delimiters get a backslash and a
/// lone trailing backslash is doubled.
pub fn escape_single(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => {
                    out.push(c);
                    out.push(next);
                }
                None => out.push_str("\\\\"),
            }
        } else if c == quote {
            out.push('\\');
            out.push(c);
        } else {
            out.push(c);
        }
    }
    out
}

/// Escape for a triple-quoted script literal.
///
/// Only sequences that could close the literal are touched: runs of three
/// or more bare delimiters, and a bare run at the very end (it would merge
/// with the closing delimiter).
pub fn escape_triple(text: &str, quote: char) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 4);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                Some(next) => {
                    out.push(c);
                    out.push(*next);
                    i += 2;
                }
                None => {
                    out.push_str("\\\\");
                    i += 1;
                }
            }
            continue;
        }
        if c == quote {
            let run = chars[i..].iter().take_while(|ch| **ch == quote).count();
            let at_end = i + run == chars.len();
            for _ in 0..run {
                if run >= 3 || at_end {
                    out.push('\\');
                }
                out.push(quote);
            }
            i += run;
            continue;
        }
        out.push(c);
        i += 1;
    }

    out
}

/// Standard JSON string escaping, without the surrounding quotes
pub fn escape_json(text: &str) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_string(text)?;
    Ok(encoded[1..encoded.len() - 1].to_string())
}
