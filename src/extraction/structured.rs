/*!
 * Structured (JSON) sources.
 *
 * The document is first parsed into a [`StructuredValue`] tree that keeps the
 * byte span of every string payload, then walked for translatable leaves.
 * serde_json is used to decode each string literal so escape handling
 * matches the standard exactly, but it cannot report offsets, so the
 * surrounding grammar is parsed here.
 */

use super::model::{ExtractionMode, LiteralSyntax};
use super::script::is_resource_like;
use super::{LineIndex, RawSpan};
use crate::errors::ExtractionError;

/// Nesting deeper than this is rejected rather than risking the stack
const MAX_DEPTH: usize = 256;

/// A string leaf with the span of its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLeaf {
    /// Decoded value
    pub value: String,
    /// First payload byte (after the opening quote)
    pub content_start: usize,
    /// Offset of the closing quote
    pub content_end: usize,
}

/// JSON value with string spans
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredValue {
    /// String
    Text(TextLeaf),
    /// Array
    Sequence(Vec<StructuredValue>),
    /// Object, keys in document order
    Mapping(Vec<(String, StructuredValue)>),
    /// Number, boolean or null
    Scalar,
}

impl StructuredValue {
    /// Parse a whole JSON document
    pub fn parse(text: &str) -> Result<Self, ExtractionError> {
        let lines = LineIndex::new(text);
        let mut parser = Parser {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            lines: &lines,
        };
        parser.skip_ws();
        let value = parser.value(0)?;
        parser.skip_ws();
        if parser.pos != parser.bytes.len() {
            return Err(parser.error("trailing content after document"));
        }
        Ok(value)
    }

    /// Collect string leaves in document order
    pub fn leaves(&self) -> Vec<&TextLeaf> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a TextLeaf>) {
        match self {
            StructuredValue::Text(leaf) => out.push(leaf),
            StructuredValue::Sequence(values) => values.iter().for_each(|v| v.collect(out)),
            StructuredValue::Mapping(members) => members.iter().for_each(|(_, v)| v.collect(out)),
            StructuredValue::Scalar => {}
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    lines: &'a LineIndex,
}

impl Parser<'_> {
    fn value(&mut self, depth: usize) -> Result<StructuredValue, ExtractionError> {
        if depth > MAX_DEPTH {
            return Err(self.error("document nested too deeply"));
        }
        match self.bytes.get(self.pos) {
            Some(b'{') => self.mapping(depth),
            Some(b'[') => self.sequence(depth),
            Some(b'"') => Ok(StructuredValue::Text(self.string()?)),
            Some(b't' | b'f' | b'n' | b'-' | b'0'..=b'9') => self.scalar(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of document")),
        }
    }

    fn mapping(&mut self, depth: usize) -> Result<StructuredValue, ExtractionError> {
        self.pos += 1;
        let mut members = Vec::new();
        self.skip_ws();
        if self.eat(b'}') {
            return Ok(StructuredValue::Mapping(members));
        }
        loop {
            self.skip_ws();
            if self.bytes.get(self.pos) != Some(&b'"') {
                return Err(self.error("expected object key"));
            }
            let key = self.string()?.value;
            self.skip_ws();
            if !self.eat(b':') {
                return Err(self.error("expected ':' after object key"));
            }
            self.skip_ws();
            let value = self.value(depth + 1)?;
            members.push((key, value));
            self.skip_ws();
            if self.eat(b',') {
                continue;
            }
            if self.eat(b'}') {
                return Ok(StructuredValue::Mapping(members));
            }
            return Err(self.error("expected ',' or '}' in object"));
        }
    }

    fn sequence(&mut self, depth: usize) -> Result<StructuredValue, ExtractionError> {
        self.pos += 1;
        let mut values = Vec::new();
        self.skip_ws();
        if self.eat(b']') {
            return Ok(StructuredValue::Sequence(values));
        }
        loop {
            self.skip_ws();
            values.push(self.value(depth + 1)?);
            self.skip_ws();
            if self.eat(b',') {
                continue;
            }
            if self.eat(b']') {
                return Ok(StructuredValue::Sequence(values));
            }
            return Err(self.error("expected ',' or ']' in array"));
        }
    }

    fn string(&mut self) -> Result<TextLeaf, ExtractionError> {
        let open = self.pos;
        let mut j = open + 1;
        while j < self.bytes.len() {
            match self.bytes[j] {
                b'\\' => j += 2,
                b'"' => {
                    let literal = &self.text[open..=j];
                    let value: String = serde_json::from_str(literal)
                        .map_err(|e| self.error(&format!("invalid string literal: {}", e)))?;
                    self.pos = j + 1;
                    return Ok(TextLeaf {
                        value,
                        content_start: open + 1,
                        content_end: j,
                    });
                }
                _ => j += 1,
            }
        }
        Err(self.error("unterminated string"))
    }

    fn scalar(&mut self) -> Result<StructuredValue, ExtractionError> {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos], b'a'..=b'z' | b'0'..=b'9' | b'-' | b'+' | b'.' | b'E')
        {
            self.pos += 1;
        }
        let token = &self.text[start..self.pos];
        match token {
            "true" | "false" | "null" => Ok(StructuredValue::Scalar),
            number if serde_json::from_str::<serde_json::Number>(number).is_ok() => {
                Ok(StructuredValue::Scalar)
            }
            _ => {
                self.pos = start;
                Err(self.error(&format!("invalid literal '{}'", token)))
            }
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r')
        {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.bytes.get(self.pos) == Some(&byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> ExtractionError {
        ExtractionError::Malformed {
            format: "json".to_string(),
            line: self.lines.line_of(self.pos.min(self.bytes.len())),
            message: message.to_string(),
        }
    }
}

/// Whether a JSON string leaf looks like something a player reads
fn looks_translatable(value: &str, mode: ExtractionMode) -> bool {
    if !value.chars().any(char::is_alphabetic) {
        return false;
    }
    match mode {
        ExtractionMode::Aggressive => true,
        ExtractionMode::Safe | ExtractionMode::Balanced => !is_resource_like(value),
    }
}

/// Extract dialogue spans from a JSON document
pub(crate) fn extract(text: &str, mode: ExtractionMode) -> Result<Vec<RawSpan>, ExtractionError> {
    let root = StructuredValue::parse(text)?;

    Ok(root
        .leaves()
        .into_iter()
        .filter(|leaf| looks_translatable(&leaf.value, mode))
        .map(|leaf| RawSpan {
            content_start: leaf.content_start,
            content_end: leaf.content_end,
            quote_char: '"',
            is_triple: false,
            syntax: LiteralSyntax::Json,
            value: leaf.value.clone(),
        })
        .collect())
}
