/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use folio::app_config::{Config, LogLevel, RenderMode, TranslationProvider};

use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.source_language, "auto");
    assert_eq!(config.target_language, "fr");
    assert_eq!(config.batch.context_pairs, 5);
    assert_eq!(config.batch.max_concurrent_batches, 2);
    assert_eq!(config.batch.max_attempts, 3);
    assert_eq!(config.batch.backoff_base_ms, 1000);
    assert_eq!(config.layout.font_step, 0.5);
    assert_eq!(config.layout.min_font_scale, 0.5);
    assert_eq!(config.layout.line_spacing, 1.2);
    assert_eq!(config.layout.overflow_marker, "…");
    assert_eq!(config.jobs.worker_count, 2);
    assert_eq!(config.jobs.retention_ttl_secs, 3600);
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Ollama;
    assert!(config.validate().is_ok());

    // Invalid source language
    config.source_language = "xyz".to_string();
    assert!(config.validate().is_err());
    config.source_language = "en".to_string();

    // Invalid target language
    config.target_language = "".to_string();
    assert!(config.validate().is_err());
    config.target_language = "de".to_string();

    // Font floor scale out of range
    config.layout.min_font_scale = 1.5;
    assert!(config.validate().is_err());
    config.layout.min_font_scale = 0.5;

    // No workers
    config.jobs.worker_count = 0;
    assert!(config.validate().is_err());
    config.jobs.worker_count = 1;

    // Anthropic requires an API key
    config.translation.provider = TranslationProvider::Anthropic;
    assert!(config.validate().is_err());
    if let Some(provider) = config
        .translation
        .available_providers
        .iter_mut()
        .find(|p| p.provider_type == "anthropic")
    {
        provider.api_key = "sk-ant-1234".to_string();
    }
    assert!(config.validate().is_ok());
}

/// Test saving and loading a configuration file
#[test]
fn test_save_and_load_withTempFile_shouldPreserveValues() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("conf.json");

    let mut config = Config::default();
    config.target_language = "ja".to_string();
    config.batch.max_batch_size = 4;
    config.layout.render_mode = RenderMode::SideBySide;
    config.layout.font_path = Some("/fonts/NotoSansJP.ttf".to_string());
    config.save(&path)?;

    let loaded = Config::load(&path)?;
    assert_eq!(loaded.target_language, "ja");
    assert_eq!(loaded.batch.max_batch_size, 4);
    assert_eq!(loaded.layout.render_mode, RenderMode::SideBySide);
    assert_eq!(loaded.layout.font_path.as_deref(), Some("/fonts/NotoSansJP.ttf"));
    Ok(())
}

/// Test that a partial file falls back to defaults for missing fields
#[test]
fn test_load_withPartialFile_shouldFillDefaults() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        dir.path(),
        "partial.json",
        r#"{ "target_language": "es", "layout": { "render_mode": "side_by_side" } }"#,
    )?;

    let config = Config::load(&path)?;
    assert_eq!(config.target_language, "es");
    assert_eq!(config.layout.render_mode, RenderMode::SideBySide);
    assert_eq!(config.layout.min_font_size, 6.0);
    assert_eq!(config.batch.max_batch_size, 10);
    Ok(())
}

/// Test loading a missing file
#[test]
fn test_load_withMissingFile_shouldReturnDefaults() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let config = Config::load(dir.path().join("missing.json"))?;
    assert_eq!(config.batch.failure_ceiling, 0.2);
    Ok(())
}

/// Test loading malformed JSON
#[test]
fn test_load_withMalformedJson_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(dir.path(), "broken.json", "{ not json")?;
    assert!(Config::load(&path).is_err());
    Ok(())
}
