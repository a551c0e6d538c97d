/*!
 * Reversible masking of inline control syntax.
 *
 * Visual novel dialogue is full of engine syntax that must survive
 * translation untouched: bracketed variable references (`[player_name]`),
 * brace text tags (`{i}`, `{color=#f00}`), and printf-style interpolations
 * (`%s`, `%(name)s`). Before a line is sent to a provider every such
 * sequence is replaced by a token from a reserved bracket alphabet
 * (`⟦T0⟧`, `⟦T1⟧`, ...) and restored from the placeholder map afterwards.
 */

use log::warn;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Opening bracket of the reserved token alphabet
pub const TOKEN_OPEN: char = '⟦';

/// Closing bracket of the reserved token alphabet
pub const TOKEN_CLOSE: char = '⟧';

/// Every inline control sequence we know how to protect.
///
/// Alternation order matters: escaped doubles win over the single forms.
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\[\[|\{\{",
        r"|⟦[^⟦⟧]*⟧",
        r"|\[[^\[\]\n]*\]",
        r"|\{[^{}\n]*\}",
        r"|%\([A-Za-z_][A-Za-z0-9_]*\)[-#0+]*\d*(?:\.\d+)?[sdifrxXeEgGc]",
        r"|%[-#0+]*\d*(?:\.\d+)?[sdifrxXeEgGc%]",
    ))
    .expect("Invalid tag regex")
});

/// Tokens after a provider has fiddled with case or spacing
static LENIENT_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"⟦\s*[Tt]\s*(\d+)\s*⟧").expect("Invalid lenient token regex"));

/// Older placeholder syntax still found in imported memories and projects
static LEGACY_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__(?:TAG_|PH)(\d+)__").expect("Invalid legacy token regex"));

/// One masked tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    /// Token substituted into the masked text
    pub token: String,
    /// Original tag text
    pub original: String,
}

/// Token to original tag mapping for a single dialogue item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceholderMap {
    entries: Vec<Placeholder>,
}

impl PlaceholderMap {
    /// Number of masked tags
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the text had no tags at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate placeholders in order of appearance
    pub fn iter(&self) -> impl Iterator<Item = &Placeholder> {
        self.entries.iter()
    }

    /// Original tag text for a token
    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|p| p.token == token)
            .map(|p| p.original.as_str())
    }

    fn push(&mut self, original: &str) -> String {
        let token = TagMasker::token(self.entries.len());
        self.entries.push(Placeholder {
            token: token.clone(),
            original: original.to_string(),
        });
        token
    }
}

/// Result of masking one text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedText {
    /// Text with every tag replaced by a token
    pub masked: String,
    /// How to undo it
    pub placeholders: PlaceholderMap,
}

/// Advisory problems spotted in a provider's masked output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderWarning {
    /// A token vanished, so its tag will be missing from the output
    #[error("placeholder {token} ({original}) is missing from the translation")]
    Missing { token: String, original: String },

    /// A token appears more than once, so its tag will be duplicated
    #[error("placeholder {token} appears {count} times in the translation")]
    Duplicated { token: String, count: usize },

    /// A well-formed token that this item never issued
    #[error("unknown placeholder {0} in the translation")]
    Unknown(String),

    /// A token whose case or spacing was altered
    #[error("mangled placeholder {0} in the translation")]
    Mangled(String),

    /// Legacy placeholder syntax leaked into the translation
    #[error("legacy placeholder {0} leaked into the translation")]
    Legacy(String),

    /// Raw control syntax the provider wrote instead of a token
    #[error("raw tag {0} in the translation")]
    RawTag(String),
}

/// Masks and unmasks inline control syntax
pub struct TagMasker;

impl TagMasker {
    /// Canonical token for a placeholder index
    pub fn token(index: usize) -> String {
        format!("{}T{}{}", TOKEN_OPEN, index, TOKEN_CLOSE)
    }

    /// Replace every control sequence with a fresh token
    pub fn mask(text: &str) -> MaskedText {
        let mut placeholders = PlaceholderMap::default();
        let mut masked = String::with_capacity(text.len());
        let mut last = 0;

        for found in TAG_REGEX.find_iter(text) {
            masked.push_str(&text[last..found.start()]);
            masked.push_str(&placeholders.push(found.as_str()));
            last = found.end();
        }
        masked.push_str(&text[last..]);

        MaskedText { masked, placeholders }
    }

    /// Restore original tags.
    ///
    /// Each token is looked up in the map independently, so providers that
    /// reorder tokens do not break restoration. Tokens the map does not know
    /// are left as they are.
    pub fn unmask(masked: &str, placeholders: &PlaceholderMap) -> String {
        if placeholders.is_empty() {
            return masked.to_string();
        }

        LENIENT_TOKEN_REGEX
            .replace_all(masked, |caps: &Captures<'_>| {
                let canonical = Self::token_from_capture(caps);
                match canonical.as_deref().and_then(|t| placeholders.get(t)) {
                    Some(original) => original.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Inspect a provider's masked output for token damage
    pub fn check_integrity(output: &str, placeholders: &PlaceholderMap) -> Vec<PlaceholderWarning> {
        let mut warnings = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();

        for caps in LENIENT_TOKEN_REGEX.captures_iter(output) {
            let Some(canonical) = Self::token_from_capture(&caps) else {
                continue;
            };
            if &caps[0] != canonical.as_str() {
                warnings.push(PlaceholderWarning::Mangled(caps[0].to_string()));
            }
            if placeholders.get(&canonical).is_none() {
                warnings.push(PlaceholderWarning::Unknown(canonical.clone()));
            }
            *counts.entry(canonical).or_insert(0) += 1;
        }

        for placeholder in placeholders.iter() {
            match counts.get(&placeholder.token).copied().unwrap_or(0) {
                0 => warnings.push(PlaceholderWarning::Missing {
                    token: placeholder.token.clone(),
                    original: placeholder.original.clone(),
                }),
                1 => {}
                count => warnings.push(PlaceholderWarning::Duplicated {
                    token: placeholder.token.clone(),
                    count,
                }),
            }
        }

        for legacy in LEGACY_TOKEN_REGEX.find_iter(output) {
            warnings.push(PlaceholderWarning::Legacy(legacy.as_str().to_string()));
        }

        for tag in Self::raw_tags(output) {
            warnings.push(PlaceholderWarning::RawTag(tag.to_string()));
        }

        warnings
    }

    /// Log integrity warnings for one item
    pub fn log_warnings(item_id: &str, warnings: &[PlaceholderWarning]) {
        for warning in warnings {
            warn!("{}: {}", item_id, warning);
        }
    }

    /// Mask a hand-written translation with the tokens an item already owns.
    ///
    /// Tags are matched to placeholders by text, first unused wins; tags
    /// the item never had stay raw.
    pub fn remask(text: &str, placeholders: &PlaceholderMap) -> String {
        let mut used = vec![false; placeholders.len()];
        let mut masked = String::with_capacity(text.len());
        let mut last = 0;

        for found in TAG_REGEX.find_iter(text) {
            masked.push_str(&text[last..found.start()]);
            let slot = placeholders
                .iter()
                .enumerate()
                .find(|(i, p)| !used[*i] && p.original == found.as_str());
            match slot {
                Some((i, placeholder)) => {
                    used[i] = true;
                    masked.push_str(&placeholder.token);
                }
                None => masked.push_str(found.as_str()),
            }
            last = found.end();
        }
        masked.push_str(&text[last..]);

        masked
    }

    /// Control sequences outside the reserved token alphabet
    fn raw_tags(text: &str) -> impl Iterator<Item = &str> {
        TAG_REGEX
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|tag| !tag.starts_with(TOKEN_OPEN))
    }

    fn token_from_capture(caps: &Captures<'_>) -> Option<String> {
        caps[1].parse::<usize>().ok().map(Self::token)
    }
}
