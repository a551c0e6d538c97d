/*!
 * Tests for splicing translations back into sources
 */

use vntl::errors::MergeError;
use vntl::extraction::{DialogueItem, EolStyle, ExtractionMode, Extractor, SourceFormat};
use vntl::merge::{escape_json, escape_single, escape_triple, Merger};
use crate::common::SAMPLE_SCRIPT;

fn items(text: &str) -> Vec<DialogueItem> {
    Extractor::new(ExtractionMode::Balanced)
        .extract("f", text, SourceFormat::Script)
        .unwrap()
}

#[test]
fn test_apply_withoutTranslations_shouldReturnSourceUnchanged() {
    let found = items(SAMPLE_SCRIPT);
    assert_eq!(Merger::apply(SAMPLE_SCRIPT, EolStyle::Lf, &found).unwrap(), SAMPLE_SCRIPT);
}

#[test]
fn test_apply_withIdentityTranslations_shouldBeByteIdentical() {
    let text = "e \"She said \\\"hi\\\".\"\ne 'Don\\'t.'\ne \"\"\"Raw \\n \"quote\".\"\"\"\n";
    let mut found = items(text);
    assert_eq!(found.len(), 3);
    for item in &mut found {
        item.translated = Some(item.quote.clone());
    }

    assert_eq!(Merger::apply(text, EolStyle::Lf, &found).unwrap(), text);
}

#[test]
fn test_apply_withPlayerNameLine_shouldOnlyChangePayload() {
    let text = "    e \"Hello [player_name]!\"\n";
    let mut found = items(text);
    found[0].translated = Some("Xin chào [player_name]!".to_string());

    assert_eq!(
        Merger::apply(text, EolStyle::Lf, &found).unwrap(),
        "    e \"Xin chào [player_name]!\"\n"
    );
}

#[test]
fn test_apply_withGrowingTranslations_shouldSpliceFromTheEnd() {
    let text = "e \"Hi.\"\ne \"Bye.\"\ne \"Ok.\"\n";
    let mut found = items(text);
    found[0].translated = Some("Xin chào bạn nhé.".to_string());
    found[1].translated = Some("T.".to_string());
    found[2].translated = Some("Được rồi, đi thôi.".to_string());
    let expected = "e \"Xin chào bạn nhé.\"\ne \"T.\"\ne \"Được rồi, đi thôi.\"\n";

    assert_eq!(Merger::apply(text, EolStyle::Lf, &found).unwrap(), expected);

    // Input order must not matter
    found.reverse();
    assert_eq!(Merger::apply(text, EolStyle::Lf, &found).unwrap(), expected);
}

#[test]
fn test_apply_withSameLineItems_shouldNotShiftLaterOffsets() {
    let text = "choice(\"Go left.\", \"Go right.\")\n";
    let mut found = Extractor::new(ExtractionMode::Aggressive)
        .extract("f", text, SourceFormat::Script)
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].line_index, found[1].line_index);
    found[0].translated = Some("Turn to the left now.".to_string());
    found[1].translated = Some("Right.".to_string());

    // Splicing front to back with the original offsets
    let mut ascending = text.to_string();
    for item in &found {
        ascending.replace_range(
            item.content_start..item.content_end,
            item.translated.as_deref().unwrap(),
        );
    }

    let merged = Merger::apply(text, EolStyle::Lf, &found).unwrap();
    assert_eq!(merged, "choice(\"Turn to the left now.\", \"Right.\")\n");
    assert_ne!(ascending, merged);
    assert_eq!(ascending, "choice(\"Turn to the Right.\", \"Go right.\")\n");
}

#[test]
fn test_apply_withQuotesInTranslation_shouldEscapeForLiteral() {
    let text = "e \"Hi.\"\ne 'Go.'\n";
    let mut found = items(text);
    found[0].translated = Some("Anh ấy nói \"chào\"".to_string());
    found[1].translated = Some("L'heure".to_string());

    assert_eq!(
        Merger::apply(text, EolStyle::Lf, &found).unwrap(),
        "e \"Anh ấy nói \\\"chào\\\"\"\ne 'L\\'heure'\n"
    );
}

#[test]
fn test_apply_withCrlfSource_shouldFollowFileLineEndings() {
    let text = "e \"\"\"One\r\ntwo\"\"\"\r\n";
    let mut found = items(text);
    found[0].translated = Some("Một\nhai".to_string());

    assert_eq!(
        Merger::apply(text, EolStyle::detect(text), &found).unwrap(),
        "e \"\"\"Một\r\nhai\"\"\"\r\n"
    );
}

#[test]
fn test_apply_withJsonItems_shouldUseJsonEscaping() {
    let text = r#"{"line": "Hello there!"}"#;
    let mut found = Extractor::default()
        .extract("f", text, SourceFormat::Json)
        .unwrap();
    found[0].translated = Some("Nói \"chào\"\nđi\\".to_string());

    let merged = Merger::apply(text, EolStyle::Lf, &found).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&merged).unwrap();
    assert_eq!(parsed["line"], "Nói \"chào\"\nđi\\");
}

#[test]
fn test_apply_withOutOfBoundsRange_shouldFail() {
    let text = "e \"Hi.\"\n";
    let mut found = items(text);
    found[0].content_end = 100;
    found[0].translated = Some("X".to_string());

    assert!(matches!(
        Merger::apply(text, EolStyle::Lf, &found),
        Err(MergeError::OutOfBounds { end: 100, .. })
    ));
}

#[test]
fn test_apply_withSplitCharacter_shouldFail() {
    let text = "e \"Chào.\"\n";
    let mut found = items(text);
    found[0].content_start += 3;
    found[0].translated = Some("X".to_string());

    assert!(matches!(
        Merger::apply(text, EolStyle::Lf, &found),
        Err(MergeError::NotCharBoundary(_))
    ));
}

#[test]
fn test_apply_withOverlappingRanges_shouldFail() {
    let text = "e \"Hi.\"\ne \"Bye.\"\n";
    let mut found = items(text);
    found[0].content_end = found[1].content_start + 1;
    found[0].translated = Some("X".to_string());
    found[1].translated = Some("Y".to_string());

    assert!(matches!(
        Merger::apply(text, EolStyle::Lf, &found),
        Err(MergeError::Overlap { .. })
    ));
}

#[test]
fn test_escapeSingle_shouldKeepPairsAndDoubleTrailingBackslash() {
    assert_eq!(escape_single("Say \"hi\" \\n ok\\", '"'), "Say \\\"hi\\\" \\n ok\\\\");
    assert_eq!(escape_single("It's", '"'), "It's");
}

#[test]
fn test_escapeTriple_shouldOnlyEscapeClosingRuns() {
    assert_eq!(escape_triple("a \"b\" c", '"'), "a \"b\" c");
    assert_eq!(
        escape_triple("He said \"\"\"no\"\"\" end\"", '"'),
        "He said \\\"\\\"\\\"no\\\"\\\"\\\" end\\\""
    );
}

#[test]
fn test_escapeJson_shouldStripOuterQuotes() {
    assert_eq!(escape_json("Say \"hi\"\nnow").unwrap(), "Say \\\"hi\\\"\\nnow");
}
