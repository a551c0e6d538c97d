/*!
 * Tests for tag masking, unmasking and integrity checks
 */

use vntl::masking::{PlaceholderWarning, TagMasker};

#[test]
fn test_mask_withoutTags_shouldLeaveTextUnchanged() {
    let masked = TagMasker::mask("Plain text, nothing to hide.");
    assert_eq!(masked.masked, "Plain text, nothing to hide.");
    assert!(masked.placeholders.is_empty());
}

#[test]
fn test_mask_withEverySyntaxClass_shouldNumberTokensInOrder() {
    let masked = TagMasker::mask("Hi [name], {b}50%%{/b} done %s %(count)d [[x");

    assert_eq!(
        masked.masked,
        "Hi ⟦T0⟧, ⟦T1⟧50⟦T2⟧⟦T3⟧ done ⟦T4⟧ ⟦T5⟧ ⟦T6⟧x"
    );
    let originals: Vec<&str> = masked.placeholders.iter().map(|p| p.original.as_str()).collect();
    assert_eq!(originals, vec!["[name]", "{b}", "%%", "{/b}", "%s", "%(count)d", "[["]);
}

#[test]
fn test_mask_withReservedBrackets_shouldProtectThemToo() {
    let masked = TagMasker::mask("Keep ⟦odd⟧ text");
    assert_eq!(masked.masked, "Keep ⟦T0⟧ text");
    assert_eq!(TagMasker::unmask(&masked.masked, &masked.placeholders), "Keep ⟦odd⟧ text");
}

#[test]
fn test_unmask_withReorderedTokens_shouldRestoreByKey() {
    let masked = TagMasker::mask("{color=#f00}Run{/color}, [name]!");
    let translated = "⟦T2⟧, ⟦T0⟧chạy đi⟦T1⟧!";

    assert_eq!(
        TagMasker::unmask(translated, &masked.placeholders),
        "[name], {color=#f00}chạy đi{/color}!"
    );
}

#[test]
fn test_unmask_withMangledToken_shouldStillRestore() {
    let masked = TagMasker::mask("Hello [player_name]!");
    assert_eq!(
        TagMasker::unmask("Xin chào ⟦ t0 ⟧!", &masked.placeholders),
        "Xin chào [player_name]!"
    );
}

#[test]
fn test_unmask_withDroppedToken_shouldLeaveTagMissing() {
    let masked = TagMasker::mask("Hello [player_name]!");
    assert_eq!(TagMasker::unmask("Xin chào!", &masked.placeholders), "Xin chào!");
}

#[test]
fn test_mask_afterRoundTrip_shouldBeIdempotent() {
    let text = "It's {i}really{/i} %(n)s o'clock, [who].";
    let first = TagMasker::mask(text);
    let restored = TagMasker::unmask(&first.masked, &first.placeholders);
    let second = TagMasker::mask(&restored);

    assert_eq!(restored, text);
    assert_eq!(first, second);
}

#[test]
fn test_checkIntegrity_withCleanOutput_shouldReportNothing() {
    let masked = TagMasker::mask("A [b] {c}");
    assert!(TagMasker::check_integrity("X ⟦T1⟧ ⟦T0⟧", &masked.placeholders).is_empty());
}

#[test]
fn test_checkIntegrity_withDamagedOutput_shouldFlagEachProblem() {
    let masked = TagMasker::mask("[a] [b] [c]");
    let warnings = TagMasker::check_integrity("⟦T0⟧ ⟦T0⟧ ⟦ t1 ⟧ ⟦T7⟧ __TAG_2__", &masked.placeholders);

    assert!(warnings.contains(&PlaceholderWarning::Duplicated {
        token: "⟦T0⟧".to_string(),
        count: 2
    }));
    assert!(warnings.contains(&PlaceholderWarning::Mangled("⟦ t1 ⟧".to_string())));
    assert!(warnings.contains(&PlaceholderWarning::Unknown("⟦T7⟧".to_string())));
    assert!(warnings.contains(&PlaceholderWarning::Missing {
        token: "⟦T2⟧".to_string(),
        original: "[c]".to_string()
    }));
    assert!(warnings.contains(&PlaceholderWarning::Legacy("__TAG_2__".to_string())));
}

#[test]
fn test_checkIntegrity_withLegacyPlaceholder_shouldWarnEvenWithoutTags() {
    let masked = TagMasker::mask("No tags.");
    let warnings = TagMasker::check_integrity("Không có __PH0__.", &masked.placeholders);
    assert_eq!(warnings, vec![PlaceholderWarning::Legacy("__PH0__".to_string())]);
}

#[test]
fn test_remask_withEditedTranslation_shouldReuseItemTokens() {
    let masked = TagMasker::mask("Hi [name], {i}welcome{/i}.");
    let remasked = TagMasker::remask("{i}Chào mừng{/i}, [name]. [new]", &masked.placeholders);

    assert_eq!(remasked, "⟦T1⟧Chào mừng⟦T2⟧, ⟦T0⟧. [new]");
}

#[test]
fn test_checkIntegrity_withRawTagInOutput_shouldFlagIt() {
    let masked = TagMasker::mask("Hello [name]!");
    let warnings = TagMasker::check_integrity("Xin chào [name] {b}bạn{/b}!", &masked.placeholders);

    assert!(warnings.contains(&PlaceholderWarning::Missing {
        token: "⟦T0⟧".to_string(),
        original: "[name]".to_string(),
    }));
    assert!(warnings.contains(&PlaceholderWarning::RawTag("[name]".to_string())));
    assert!(warnings.contains(&PlaceholderWarning::RawTag("{b}".to_string())));
    assert!(warnings.contains(&PlaceholderWarning::RawTag("{/b}".to_string())));

    // Tokens, even mangled ones, are not raw tags
    let warnings = TagMasker::check_integrity("Xin chào ⟦ t0 ⟧!", &masked.placeholders);
    assert_eq!(warnings, vec![PlaceholderWarning::Mangled("⟦ t0 ⟧".to_string())]);
}
