use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;
use url::Url;

/// Application configuration module
/// This module handles loading, validating and saving the pipeline settings:
/// which translation provider to call, how units are batched, how text is
/// fitted back onto the page and how many jobs run at once.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO), or "auto" to detect it per document
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Batching and retry behaviour
    #[serde(default)]
    pub batch: BatchConfig,

    /// Extraction thresholds and text fitting
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Worker pool and retention
    #[serde(default)]
    pub jobs: JobConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    Ollama,
    // @provider: OpenAI
    #[default]
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
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
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
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

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Completion token ceiling per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        let (model, endpoint) = match provider_type {
            TranslationProvider::Ollama => (default_ollama_model(), default_ollama_endpoint()),
            TranslationProvider::OpenAI => (default_openai_model(), default_openai_endpoint()),
            TranslationProvider::Anthropic => (default_anthropic_model(), default_anthropic_endpoint()),
            TranslationProvider::LMStudio => (default_lmstudio_model(), default_lmstudio_endpoint()),
        };
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model,
            api_key: String::new(),
            endpoint,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
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

    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Batching, context and retry settings for the batch translator
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchConfig {
    /// Maximum number of units per batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Number of translated pairs kept in the rolling context window
    #[serde(default = "default_context_pairs")]
    pub context_pairs: usize,

    /// Batches of one job that may be in flight at once
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Attempts per batch before falling back to source text
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Fraction of failed units above which the job fails
    #[serde(default = "default_failure_ceiling")]
    pub failure_ceiling: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            context_pairs: default_context_pairs(),
            max_concurrent_batches: default_max_concurrent_batches(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            failure_ceiling: default_failure_ceiling(),
        }
    }
}

/// How translated text is placed on the output page
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Translated text replaces the source text in place
    #[default]
    Replacement,
    /// Original page on the left, translation on the right
    SideBySide,
}

/// Extraction grouping thresholds and text fitting settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LayoutConfig {
    /// Blocks whose vertical centers differ by at most this many points share a row
    #[serde(default = "default_row_gap_threshold")]
    pub row_gap_threshold: f32,

    /// Maximum vertical gap between lines of one block, as a fraction of font size
    #[serde(default = "default_line_merge_gap")]
    pub line_merge_gap: f32,

    /// Maximum horizontal gap between runs of one line, as a fraction of font size
    #[serde(default = "default_word_gap")]
    pub word_gap: f32,

    /// Font size decrement per shrink step, in points
    #[serde(default = "default_font_step")]
    pub font_step: f32,

    /// Absolute minimum font size, in points
    #[serde(default = "default_min_font_size")]
    pub min_font_size: f32,

    /// Minimum font size as a fraction of the original size
    #[serde(default = "default_min_font_scale")]
    pub min_font_scale: f32,

    /// Line height as a multiple of font size when wrapping
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f32,

    /// Appended to text truncated for lack of space
    #[serde(default = "default_overflow_marker")]
    pub overflow_marker: String,

    /// Output page arrangement
    #[serde(default)]
    pub render_mode: RenderMode,

    /// TrueType font used for translated text; a system Unicode font or built-in Helvetica when unset
    #[serde(default)]
    pub font_path: Option<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_gap_threshold: default_row_gap_threshold(),
            line_merge_gap: default_line_merge_gap(),
            word_gap: default_word_gap(),
            font_step: default_font_step(),
            min_font_size: default_min_font_size(),
            min_font_scale: default_min_font_scale(),
            line_spacing: default_line_spacing(),
            overflow_marker: default_overflow_marker(),
            render_mode: RenderMode::default(),
            font_path: None,
        }
    }
}

/// Job worker pool settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobConfig {
    /// Jobs processed concurrently; the rest wait in Queued
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// How long terminal jobs stay queryable
    #[serde(default = "default_retention_ttl_secs")]
    pub retention_ttl_secs: u64,

    /// Interval of the expired-job sweeper
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            retention_ttl_secs: default_retention_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
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
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "auto".to_string()
}

fn default_target_language() -> String {
    "fr".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_batch_size() -> usize {
    10
}

fn default_context_pairs() -> usize {
    5
}

fn default_max_concurrent_batches() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_failure_ceiling() -> f64 {
    0.2
}

fn default_row_gap_threshold() -> f32 {
    3.0
}

fn default_line_merge_gap() -> f32 {
    0.6
}

fn default_word_gap() -> f32 {
    1.5
}

fn default_font_step() -> f32 {
    0.5
}

fn default_min_font_size() -> f32 {
    6.0
}

fn default_min_font_scale() -> f32 {
    0.5
}

fn default_line_spacing() -> f32 {
    1.2
}

fn default_overflow_marker() -> String {
    "…".to_string()
}

fn default_worker_count() -> usize {
    2
}

fn default_retention_ttl_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_lmstudio_endpoint() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}

fn default_lmstudio_model() -> String {
    // Placeholder; users should set it to the model loaded in LM Studio
    "local-model".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional document translator. Translate every text from {source_language} to {target_language}. \
Keep the meaning, tone and technical terminology; keep numbers, formulas, URLs and proper names unchanged; \
keep translations about as long as the originals because they are placed back into fixed-size boxes on the page. \
Use the context pairs only to stay consistent with earlier translations."
        .to_string()
}

impl Config {
    /// Load a configuration file, or return defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config file not found at '{}', using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if !crate::language_utils::is_auto(&self.source_language) {
            crate::language_utils::get_language_name(&self.source_language)?;
        }
        crate::language_utils::get_language_name(&self.target_language)?;

        match self.translation.provider {
            TranslationProvider::OpenAI | TranslationProvider::Anthropic => {
                if self.translation.get_api_key().is_empty() {
                    return Err(anyhow!(
                        "Translation API key is required for {} provider",
                        self.translation.provider.display_name()
                    ));
                }
            }
            _ => {}
        }
        validate_endpoint(&self.translation.get_endpoint())?;

        let batch = &self.batch;
        if batch.max_batch_size == 0 {
            return Err(anyhow!("batch.max_batch_size must be at least 1"));
        }
        if batch.max_concurrent_batches == 0 {
            return Err(anyhow!("batch.max_concurrent_batches must be at least 1"));
        }
        if batch.max_attempts == 0 {
            return Err(anyhow!("batch.max_attempts must be at least 1"));
        }
        if !(0.0..=1.0).contains(&batch.failure_ceiling) {
            return Err(anyhow!("batch.failure_ceiling must be between 0.0 and 1.0"));
        }

        let layout = &self.layout;
        if layout.font_step <= 0.0 {
            return Err(anyhow!("layout.font_step must be positive"));
        }
        if layout.min_font_size <= 0.0 {
            return Err(anyhow!("layout.min_font_size must be positive"));
        }
        if !(0.0..=1.0).contains(&layout.min_font_scale) {
            return Err(anyhow!("layout.min_font_scale must be between 0.0 and 1.0"));
        }
        if layout.line_spacing < 1.0 {
            return Err(anyhow!("layout.line_spacing must be at least 1.0"));
        }
        if layout.row_gap_threshold < 0.0 {
            return Err(anyhow!("layout.row_gap_threshold must not be negative"));
        }

        if self.jobs.worker_count == 0 {
            return Err(anyhow!("jobs.worker_count must be at least 1"));
        }

        Ok(())
    }
}

/// Endpoints may omit the scheme; `http` is assumed then
fn validate_endpoint(endpoint: &str) -> Result<()> {
    let with_scheme = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };
    let url = Url::parse(&with_scheme).context(format!("Failed to parse endpoint URL: {}", endpoint))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!("Unsupported endpoint scheme '{}' in {}", other, endpoint)),
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            batch: BatchConfig::default(),
            layout: LayoutConfig::default(),
            jobs: JobConfig::default(),
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
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }
        ProviderConfig::new(self.provider.clone()).model
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }
        ProviderConfig::new(self.provider.clone()).endpoint
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .unwrap_or_else(default_timeout_secs)
    }

    /// Get the completion token ceiling for the active provider
    pub fn get_max_tokens(&self) -> u32 {
        self.get_active_provider_config()
            .map(|p| p.max_tokens)
            .unwrap_or_else(default_max_tokens)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::LMStudio),
            ],
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_shouldUseDocumentedConstants() {
        let config = Config::default();
        assert_eq!(config.batch.max_batch_size, 10);
        assert_eq!(config.batch.failure_ceiling, 0.2);
        assert_eq!(config.layout.min_font_size, 6.0);
        assert_eq!(config.layout.row_gap_threshold, 3.0);
        assert_eq!(config.layout.render_mode, RenderMode::Replacement);
    }

    #[test]
    fn test_validate_withZeroBatchSize_shouldFail() {
        let mut config = Config::default();
        config.translation.provider = TranslationProvider::Ollama;
        assert!(config.validate().is_ok());
        config.batch.max_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_withOpenAiAndNoKey_shouldFail() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_withBadEndpoint_shouldFail() {
        let mut config = Config::default();
        config.translation.provider = TranslationProvider::Ollama;
        for provider in config.translation.available_providers.iter_mut() {
            provider.endpoint = "ftp://localhost:11434".to_string();
        }
        assert!(config.validate().is_err());
        for provider in config.translation.available_providers.iter_mut() {
            provider.endpoint = "gpu-box:11434".to_string();
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_shouldFillDefaults() {
        let config: Config = serde_json::from_str(r#"{"target_language": "de", "layout": {"render_mode": "side_by_side"}}"#)
            .unwrap();
        assert_eq!(config.target_language, "de");
        assert_eq!(config.source_language, "auto");
        assert_eq!(config.layout.render_mode, RenderMode::SideBySide);
        assert_eq!(config.layout.line_spacing, 1.2);
        assert_eq!(config.jobs.worker_count, 2);
    }
}
