/*!
 * Tests for language utility functions
 */

use vntl::language_utils::{
    display_name, get_language_name, language_codes_match, validate_language_code,
};

/// Test validation of language codes
#[test]
fn test_validateLanguageCode_withValidCodes_shouldAccept() {
    // ISO 639-1, 639-2/T and 639-2/B
    for code in ["vi", "en", "ja", "eng", "vie", "fre", "ger", " EN ", "JPN"] {
        assert!(validate_language_code(code).is_ok(), "{} should be valid", code);
    }

    // Region and script subtags
    for code in ["pt-BR", "zh-Hans", "en_us"] {
        assert!(validate_language_code(code).is_ok(), "{} should be valid", code);
    }
}

#[test]
fn test_validateLanguageCode_withUnknownCodes_shouldReject() {
    for code in ["zz", "qqq", "xx-NOPE", "e", "123", "", "not a code", "pt-", "vi-B@"] {
        assert!(validate_language_code(code).is_err(), "{} should be invalid", code);
    }
}

#[test]
fn test_getLanguageName_shouldReturnEnglishName() {
    assert_eq!(get_language_name("vi").unwrap(), "Vietnamese");
    assert_eq!(get_language_name("jpn").unwrap(), "Japanese");
    assert_eq!(get_language_name("ger").unwrap(), "German");
    assert_eq!(get_language_name("pt-BR").unwrap(), "Portuguese");
    assert!(get_language_name("zz").is_err());

    // Prompts fall back to the raw tag
    assert_eq!(display_name("zz"), "zz");
}

#[test]
fn test_languageCodesMatch_shouldCompareAcrossCodeForms() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("fre", "fr"));
    assert!(language_codes_match("PT-br", "pt_BR"));
    assert!(!language_codes_match("pt-BR", "pt-PT"));
    assert!(!language_codes_match("en", "vi"));
    assert!(!language_codes_match("auto", "vi"));
}
