/*!
 * Tests for application configuration functionality
 */

use std::str::FromStr;
use vntl::app_config::{Config, LogLevel, ProviderConfig, TranslationProvider};
use vntl::extraction::ExtractionMode;
use crate::common::create_temp_dir;

/// Test default configuration values
#[test]
fn test_defaultConfig_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.source_language, "auto");
    assert_eq!(config.target_language, "vi");
    assert_eq!(config.extraction.mode, ExtractionMode::Balanced);
    assert_eq!(config.translation.provider, TranslationProvider::Llm);
    assert_eq!(config.log_level, LogLevel::Info);

    let common = &config.translation.common;
    assert_eq!(common.batch_size, 20);
    assert_eq!(common.max_concurrent_batches, 1);
    assert_eq!(common.retry_count, 3);
    assert!(common.use_translation_memory);

    assert_eq!(config.translation.get_model(), "gpt-4o-mini");
    assert_eq!(config.translation.get_endpoint(), "https://api.openai.com/v1");
    assert_eq!(config.translation.available_providers.len(), 3);
}

/// Test configuration validation
#[test]
fn test_validate_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Lingva;
    assert!(config.validate().is_ok());

    config.target_language = "".to_string();
    assert!(config.validate().is_err());
    config.target_language = "pt-BR".to_string();
    assert!(config.validate().is_ok());

    // Well-formed but unknown codes
    for code in ["zz", "qqq", "xx-NOPE"] {
        config.target_language = code.to_string();
        assert!(config.validate().is_err(), "{} should be rejected", code);
    }
    config.target_language = "pt-BR".to_string();

    config.source_language = "not a code".to_string();
    assert!(config.validate().is_err());
    config.source_language = "PT-br".to_string();
    assert!(config.validate().is_err(), "same source and target");
    config.source_language = "por_br".to_string();
    assert!(config.validate().is_err(), "same language in another code form");
    config.source_language = "ja".to_string();

    // Key-based providers need a key
    config.translation.provider = TranslationProvider::DeepL;
    assert!(config.validate().is_err());
    config.translation.provider_config_mut(TranslationProvider::DeepL).api_key = "k:fx".to_string();
    assert!(config.validate().is_ok());

    config.translation.common.max_concurrent_batches = 0;
    assert!(config.validate().is_err());
    config.translation.common.max_concurrent_batches = 2;

    config.translation.common.temperature = 3.5;
    assert!(config.validate().is_err());
    config.translation.common.temperature = 0.3;

    config.translation.common.retry_backoff_ms = 60_000;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withBadEndpoint_shouldFail() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Lingva;
    config.translation.provider_config_mut(TranslationProvider::Lingva).fallback_endpoints =
        vec!["not a url".to_string()];

    let err = config.validate().unwrap_err();
    assert!(format!("{:#}", err).contains("not a url"));
}

#[test]
fn test_providerConfigMut_withMissingProvider_shouldInsertDefaults() {
    let mut config = Config::default();
    config.translation.available_providers.clear();

    config.translation.provider_config_mut(TranslationProvider::Llm).model = "local-model".to_string();

    assert_eq!(config.translation.available_providers.len(), 1);
    assert_eq!(config.translation.get_model(), "local-model");
    assert_eq!(config.translation.get_timeout_secs(), 120);
}

#[test]
fn test_getters_withoutProviderEntry_shouldFallBackToDefaults() {
    let mut config = Config::default();
    config.translation.available_providers.clear();
    config.translation.provider = TranslationProvider::DeepL;

    assert_eq!(config.translation.get_endpoint(), "");
    assert_eq!(config.translation.get_api_key(), "");
    assert_eq!(config.translation.get_timeout_secs(), 30);
}

#[test]
fn test_sourceLanguageHint_withAuto_shouldBeNone() {
    let mut config = Config::default();
    assert_eq!(config.source_language_hint(), None);
    config.source_language = "ja".to_string();
    assert_eq!(config.source_language_hint(), Some("ja".to_string()));
}

#[test]
fn test_translationProvider_fromStr_shouldAcceptAliases() {
    assert_eq!(TranslationProvider::from_str("OpenAI").unwrap(), TranslationProvider::Llm);
    assert_eq!(TranslationProvider::from_str("deepl").unwrap(), TranslationProvider::DeepL);
    assert!(TranslationProvider::from_str("ollama").is_err());
    assert!(TranslationProvider::Llm.requires_api_key());
    assert!(!TranslationProvider::Lingva.requires_api_key());
}

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.target_language, "vi");

    let reloaded = Config::load_or_create(&path).unwrap();
    assert_eq!(reloaded.translation.provider, config.translation.provider);
}

#[test]
fn test_deserialize_withPartialJson_shouldFillDefaults() {
    let json = r#"{
        "target_language": "fr",
        "extraction": { "mode": "aggressive" },
        "translation": {
            "provider": "deepl",
            "available_providers": [{ "type": "deepl", "api_key": " secret " }],
            "common": { "batch_size": 0 }
        }
    }"#;

    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.source_language, "auto");
    assert_eq!(config.extraction.mode, ExtractionMode::Aggressive);
    assert_eq!(config.translation.get_api_key(), "secret");
    assert_eq!(config.translation.common.batch_size, 0);
    assert_eq!(config.translation.common.retry_count, 3);
    assert_eq!(config.log_level, LogLevel::Info);
}

#[test]
fn test_providerConfig_new_shouldCarryProviderDefaults() {
    let lingva = ProviderConfig::new(TranslationProvider::Lingva);
    assert_eq!(lingva.provider_type, "lingva");
    assert_eq!(lingva.endpoint, "https://lingva.ml");
    assert!(lingva.api_key.is_empty());
}
