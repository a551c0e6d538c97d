//! Language utilities for ISO language code handling
//!
//! Codes are ISO 639-1 (2-letter) or ISO 639-2 (3-letter) primary subtags,
//! optionally followed by region or script subtags as in `pt-BR` or `zh-Hans`.
//! Subtags after the primary one are checked for shape only.

use anyhow::{anyhow, Result};
use isolang::Language;

/// ISO 639-2/B codes that differ from their ISO 639-2/T form
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Split a tag into its lowercased primary subtag and the remaining subtags
fn split_tag(code: &str) -> (String, Vec<&str>) {
    let mut parts = code.trim().split(['-', '_']);
    let primary = parts.next().unwrap_or_default().to_lowercase();
    (primary, parts.collect())
}

/// Resolve the primary subtag of a language tag
fn resolve_primary(primary: &str) -> Option<Language> {
    match primary.len() {
        2 => Language::from_639_1(primary),
        3 => {
            let part2t = PART2B_TO_PART2T
                .iter()
                .find(|(part2b, _)| *part2b == primary)
                .map_or(primary, |(_, part2t)| part2t);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Resolve a language tag (`vi`, `jpn`, `pt-BR`) to its ISO language
pub fn resolve_language(code: &str) -> Result<Language> {
    let (primary, rest) = split_tag(code);
    let language =
        resolve_primary(&primary).ok_or_else(|| anyhow!("Invalid language code: '{}'", code))?;

    let subtags_ok = rest
        .iter()
        .all(|s| (2..=8).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric()));
    if !subtags_ok {
        return Err(anyhow!("Invalid language subtag in '{}'", code));
    }

    Ok(language)
}

/// Validate a language tag
pub fn validate_language_code(code: &str) -> Result<()> {
    resolve_language(code).map(|_| ())
}

/// English name of a language tag, e.g. `vi` -> `Vietnamese`
pub fn get_language_name(code: &str) -> Result<String> {
    Ok(resolve_language(code)?.to_name().to_string())
}

/// English name for prompts, falling back to the raw tag when unknown
pub fn display_name(code: &str) -> String {
    get_language_name(code).unwrap_or_else(|_| code.to_string())
}

/// Check if two tags name the same language and variant (`en` == `eng`, `pt-BR` == `por_br`)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    let normalize = |code: &str| -> Option<(Language, Vec<String>)> {
        let (_, rest) = split_tag(code);
        let language = resolve_language(code).ok()?;
        Some((language, rest.iter().map(|s| s.to_lowercase()).collect()))
    };

    match (normalize(code1), normalize(code2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
