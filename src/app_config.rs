use anyhow::{anyhow, Context, Result};
use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

use crate::extraction::ExtractionMode;
use crate::language_utils;

// Application configuration module
// This module handles the application configuration including loading,
// validating and saving configuration settings.

/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code, or `auto` to let the provider detect it
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// SQLite database location; the user data dir when absent
    #[serde(default)]
    pub database_path: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Extraction settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ExtractionConfig {
    // @field: How inclusive literal detection is
    #[serde(default)]
    pub mode: ExtractionMode,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: OpenAI-compatible chat completions
    #[default]
    Llm,
    // @provider: DeepL REST API
    DeepL,
    // @provider: Lingva public mirrors
    Lingva,
}

impl TranslationProvider {
    // @returns: Human readable provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Llm => "LLM (OpenAI-compatible)",
            Self::DeepL => "DeepL",
            Self::Lingva => "Lingva",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Llm => "llm".to_string(),
            Self::DeepL => "deepl".to_string(),
            Self::Lingva => "lingva".to_string(),
        }
    }

    // @returns: Whether calls need an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Llm | Self::DeepL)
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "llm" | "openai" => Ok(Self::Llm),
            "deepl" => Ok(Self::DeepL),
            "lingva" => Ok(Self::Lingva),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name (LLM only)
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Extra mirrors tried after the endpoint (Lingva)
    #[serde(default)]
    pub fallback_endpoints: Vec<String>,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        match provider_type {
            TranslationProvider::Llm => Self {
                provider_type: "llm".to_string(),
                model: default_llm_model(),
                api_key: String::new(),
                endpoint: default_llm_endpoint(),
                fallback_endpoints: Vec::new(),
                timeout_secs: default_llm_timeout_secs(),
            },
            TranslationProvider::DeepL => Self {
                provider_type: "deepl".to_string(),
                model: String::new(),
                api_key: String::new(),
                endpoint: String::new(),
                fallback_endpoints: Vec::new(),
                timeout_secs: default_timeout_secs(),
            },
            TranslationProvider::Lingva => Self {
                provider_type: "lingva".to_string(),
                model: String::new(),
                api_key: String::new(),
                endpoint: default_lingva_endpoint(),
                fallback_endpoints: Vec::new(),
                timeout_secs: default_timeout_secs(),
            },
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Items per provider call; 0 picks the provider's recommended size
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Batches in flight at once; 1 runs them sequentially
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff before the first retry (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Cap on the doubled backoff (in milliseconds)
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,

    /// Random extra delay added to each backoff (in milliseconds)
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,

    /// Reuse and record translations in the translation memory
    #[serde(default = "default_true")]
    pub use_translation_memory: bool,

    /// System prompt template for LLM translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Temperature parameter for text generation (0.0 to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrent_batches: default_max_concurrent_batches(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
            use_translation_memory: true,
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    // @returns: Matching `log` filter
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "auto".to_string()
}

fn default_target_language() -> String {
    "vi".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_batch_size() -> usize {
    20
}

fn default_max_concurrent_batches() -> usize {
    1
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_retry_max_backoff_ms() -> u64 {
    30_000
}

fn default_retry_jitter_ms() -> u64 {
    250
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_lingva_endpoint() -> String {
    "https://lingva.ml".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional visual novel translator. Translate the dialogue lines from {source_language} to {target_language}. Keep every token of the form ⟦T0⟧ exactly as written and in a natural position. Preserve tone, honorifics and line meaning.".to_string()
}

impl Config {
    /// Load the config at `path`, writing a default one first if it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            warn!(
                "Config file not found at '{}', creating default config.",
                path.display()
            );
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Write the config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        if !self.source_language.eq_ignore_ascii_case("auto") {
            language_utils::validate_language_code(&self.source_language)
                .context("Invalid source language")?;
        }
        language_utils::validate_language_code(&self.target_language)
            .context("Invalid target language")?;
        if language_utils::language_codes_match(&self.source_language, &self.target_language) {
            return Err(anyhow!(
                "Source and target language are both '{}'",
                self.target_language
            ));
        }

        let provider = self.translation.provider;
        if provider.requires_api_key() && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                provider.display_name()
            ));
        }

        for endpoint in std::iter::once(self.translation.get_endpoint())
            .chain(self.translation.get_fallback_endpoints())
            .filter(|e| !e.is_empty())
        {
            url::Url::parse(&endpoint)
                .with_context(|| format!("Invalid provider endpoint: {}", endpoint))?;
        }

        let common = &self.translation.common;
        if common.max_concurrent_batches == 0 {
            return Err(anyhow!("max_concurrent_batches must be at least 1"));
        }
        if common.retry_backoff_ms > common.retry_max_backoff_ms {
            return Err(anyhow!(
                "retry_backoff_ms ({}) exceeds retry_max_backoff_ms ({})",
                common.retry_backoff_ms,
                common.retry_max_backoff_ms
            ));
        }
        if !(0.0..=2.0).contains(&common.temperature) {
            return Err(anyhow!("temperature must be between 0.0 and 2.0"));
        }

        Ok(())
    }

    /// Database file, explicit or under the user data dir
    pub fn resolve_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => crate::database::DatabaseConnection::default_database_path(),
        }
    }

    /// Source language for providers, `None` for auto-detection
    pub fn source_language_hint(&self) -> Option<String> {
        if self.source_language.eq_ignore_ascii_case("auto") || self.source_language.is_empty() {
            None
        } else {
            Some(self.source_language.clone())
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            extraction: ExtractionConfig::default(),
            translation: TranslationConfig::default(),
            database_path: None,
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type.eq_ignore_ascii_case(&provider_str))
    }

    /// Mutable access, inserting defaults when the provider is not listed
    pub fn provider_config_mut(&mut self, provider_type: TranslationProvider) -> &mut ProviderConfig {
        let provider_str = provider_type.to_lowercase_string();
        let position = self
            .available_providers
            .iter()
            .position(|p| p.provider_type.eq_ignore_ascii_case(&provider_str));
        let index = match position {
            Some(index) => index,
            None => {
                self.available_providers.push(ProviderConfig::new(provider_type));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        match self.get_active_provider_config() {
            Some(config) if !config.model.is_empty() => config.model.clone(),
            _ => match self.provider {
                TranslationProvider::Llm => default_llm_model(),
                TranslationProvider::DeepL | TranslationProvider::Lingva => String::new(),
            },
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|config| config.api_key.trim().to_string())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider; empty means the provider's default host
    pub fn get_endpoint(&self) -> String {
        match self.get_active_provider_config() {
            Some(config) if !config.endpoint.is_empty() => config.endpoint.clone(),
            _ => match self.provider {
                TranslationProvider::Llm => default_llm_endpoint(),
                TranslationProvider::DeepL => String::new(),
                TranslationProvider::Lingva => default_lingva_endpoint(),
            },
        }
    }

    /// Additional mirrors for the active provider
    pub fn get_fallback_endpoints(&self) -> Vec<String> {
        self.get_active_provider_config()
            .map(|config| config.fallback_endpoints.clone())
            .unwrap_or_default()
    }

    /// Request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|config| config.timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or_else(default_timeout_secs)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Llm),
                ProviderConfig::new(TranslationProvider::DeepL),
                ProviderConfig::new(TranslationProvider::Lingva),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
