/*!
 * Quoted-literal scanner for script sources.
 *
 * The scanner works on bytes. Every delimiter we care about is ASCII and
 * UTF-8 continuation bytes never collide with ASCII, so byte offsets found
 * here always sit on character boundaries.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use super::model::ExtractionMode;
use super::{LineIndex, RawSpan};
use crate::errors::ExtractionError;
use crate::extraction::model::LiteralSyntax;

/// Statement keywords that can never start a speaker expression
const STATEMENT_KEYWORDS: &[&str] = &[
    "define", "default", "image", "show", "scene", "hide", "play", "queue", "stop", "voice",
    "sound", "jump", "call", "return", "label", "menu", "if", "elif", "else", "while", "for",
    "pass", "python", "init", "style", "transform", "screen", "translate", "with", "window",
    "pause", "camera", "at", "as", "behind", "onlayer", "zorder", "use", "import", "from",
];

/// Statements that load assets rather than show text
const ASSET_KEYWORDS: &[&str] = &[
    "play", "queue", "stop", "voice", "sound", "image", "show", "scene", "hide",
];

/// `e`, `e happy`, `mc.name` ... before a dialogue literal
static SPEAKER_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[A-Za-z_][\w.]*(?:\s+[A-Za-z_][\w.]*)*\s+$").expect("Invalid speaker regex")
});

/// `"Eileen" ` as a quoted speaker name
static QUOTED_SPEAKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:"[^"\n]*"|'[^'\n]*')\s+$"#).expect("Invalid quoted speaker regex")
});

/// Paths, file names, URLs and colours
static RESOURCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:https?://\S*|#[0-9a-f]{3,8}|[^\s]*[/\\][^\s]*|[^\s]+\.[a-z0-9]{2,4})$")
        .expect("Invalid resource regex")
});

/// Literal found in the source, before any mode filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Literal {
    /// Offset of the opening delimiter
    pub open: usize,
    /// First payload byte
    pub content_start: usize,
    /// One past the last payload byte
    pub content_end: usize,
    /// One past the closing delimiter
    pub close_end: usize,
    /// Delimiter character
    pub quote: u8,
    /// Triple-quoted
    pub triple: bool,
}

/// Find every quoted literal, skipping comments
pub(crate) fn scan_literals(text: &str, lines: &LineIndex) -> Result<Vec<Literal>, ExtractionError> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut literals = Vec::new();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'#' => i = skip_to_eol(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_to_eol(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = match find_subslice(bytes, i + 2, b"*/") {
                    Some(end) => end + 2,
                    None => {
                        return Err(malformed(lines, i, "unterminated block comment"));
                    }
                };
            }
            quote @ (b'"' | b'\'') => {
                let literal = read_literal(bytes, i, quote)
                    .ok_or_else(|| malformed(lines, i, "unterminated string literal"))?;
                i = literal.close_end;
                literals.push(literal);
            }
            _ => i += 1,
        }
    }

    Ok(literals)
}

fn read_literal(bytes: &[u8], open: usize, quote: u8) -> Option<Literal> {
    let triple = bytes.get(open + 1) == Some(&quote) && bytes.get(open + 2) == Some(&quote);
    let delimiter_len = if triple { 3 } else { 1 };
    let content_start = open + delimiter_len;
    let mut j = content_start;

    while j < bytes.len() {
        let b = bytes[j];
        if b == b'\\' {
            j += 2;
            continue;
        }
        if b == quote {
            let closes = !triple
                || (bytes.get(j + 1) == Some(&quote) && bytes.get(j + 2) == Some(&quote));
            if closes {
                return Some(Literal {
                    open,
                    content_start,
                    content_end: j,
                    close_end: j + delimiter_len,
                    quote,
                    triple,
                });
            }
        }
        j += 1;
    }

    None
}

fn skip_to_eol(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|p| from + p)
        .unwrap_or(bytes.len())
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn malformed(lines: &LineIndex, offset: usize, message: &str) -> ExtractionError {
    ExtractionError::Malformed {
        format: "script".to_string(),
        line: lines.line_of(offset),
        message: message.to_string(),
    }
}

/// Unescape the payload of a single-delimited literal.
///
/// Only `\q` for the literal's own delimiter is collapsed; every other
/// escape pair is kept verbatim so it can be re-escaped losslessly.
pub(crate) fn unescape_payload(payload: &str, quote: char) -> String {
    let mut out = String::with_capacity(payload.len());
    let mut chars = payload.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) if next == quote => out.push(next),
                Some(next) => {
                    out.push(c);
                    out.push(next);
                }
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Extract dialogue spans from script text
pub(crate) fn extract(
    text: &str,
    mode: ExtractionMode,
    lines: &LineIndex,
) -> Result<Vec<RawSpan>, ExtractionError> {
    let literals = scan_literals(text, lines)?;
    let mut spans = Vec::new();

    for (position, literal) in literals.iter().enumerate() {
        let payload = &text[literal.content_start..literal.content_end];
        let quote_char = char::from(literal.quote);
        let value = if literal.triple {
            payload.to_string()
        } else {
            unescape_payload(payload, quote_char)
        };

        if !value.chars().any(char::is_alphabetic) {
            continue;
        }

        let line_start = lines.line_start(literal.open);
        let prefix = &text[line_start..literal.open];
        let followed_by_literal = literals
            .get(position + 1)
            .is_some_and(|next| text[literal.close_end..next.open].trim_matches([' ', '\t']).is_empty());

        let accepted = match mode {
            ExtractionMode::Aggressive => true,
            ExtractionMode::Safe => !followed_by_literal && is_speaker_statement(prefix),
            ExtractionMode::Balanced => {
                !followed_by_literal
                    && (is_speaker_statement(prefix) || is_prose_literal(prefix, &value))
            }
        };

        if accepted {
            spans.push(RawSpan {
                content_start: literal.content_start,
                content_end: literal.content_end,
                quote_char,
                is_triple: literal.triple,
                syntax: LiteralSyntax::Script,
                value,
            });
        }
    }

    Ok(spans)
}

/// Whether the text before a literal is a dialogue statement head
fn is_speaker_statement(prefix: &str) -> bool {
    if prefix.trim().is_empty() {
        return true;
    }
    if QUOTED_SPEAKER_REGEX.is_match(prefix) {
        return true;
    }
    if !SPEAKER_PREFIX_REGEX.is_match(prefix) {
        return false;
    }
    first_word(prefix).is_some_and(|word| !STATEMENT_KEYWORDS.contains(&word))
}

/// Balanced-mode acceptance for literals outside speaker position
fn is_prose_literal(prefix: &str, value: &str) -> bool {
    if first_word(prefix).is_some_and(|word| ASSET_KEYWORDS.contains(&word)) {
        return false;
    }
    if is_resource_like(value) {
        return false;
    }

    let head = prefix.trim_end();
    let translation_call = head.ends_with("_(") || head.ends_with("__(");
    let prose = value.trim().contains(char::is_whitespace)
        || value.trim_end().ends_with(['.', '!', '?', '…', '。', '！', '？']);

    translation_call || prose
}

/// Paths, asset names, URLs and colour codes
pub(crate) fn is_resource_like(value: &str) -> bool {
    RESOURCE_REGEX.is_match(value.trim())
}

fn first_word(prefix: &str) -> Option<&str> {
    prefix
        .split(|c: char| c.is_whitespace() || c == '(' || c == '=' || c == ':')
        .find(|w| !w.is_empty())
}
