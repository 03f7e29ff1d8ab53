// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use folio::app_config::{self, Config, RenderMode, TranslationProvider};
use folio::{JobOrchestrator, JobRequest, JobStatus, LlmBackend, RenderFont, Terminology, TranslationBackend};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    OpenAI,
    Anthropic,
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for RenderMode to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliRenderMode {
    Replacement,
    SideBySide,
}

impl From<CliRenderMode> for RenderMode {
    fn from(mode: CliRenderMode) -> Self {
        match mode {
            CliRenderMode::Replacement => RenderMode::Replacement,
            CliRenderMode::SideBySide => RenderMode::SideBySide,
        }
    }
}

/// folio - layout-preserving PDF translation
///
/// Translates the text of a PDF with an AI provider and writes the
/// translation back onto the original page layout.
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(version = "0.1.0")]
#[command(about = "AI-powered layout-preserving PDF translation")]
#[command(long_about = "folio extracts the text of a PDF, translates it in context-aware batches and renders the translation into the original layout.

EXAMPLES:
    folio paper.pdf                               # Translate using default config
    folio -s en -t de paper.pdf                   # Translate from English to German
    folio -p ollama -m llama3.2:3b paper.pdf      # Use a specific provider and model
    folio --mode side-by-side paper.pdf           # Original and translation next to each other
    folio --terminology terms.json paper.pdf      # Apply a term dictionary

CONFIGURATION:
    Configuration is read from conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    /// Input PDF file
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Output file; defaults to <input>.<target>.pdf next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force overwrite of an existing output file
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'es', 'fr'), or 'auto'
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Output page arrangement
    #[arg(long, value_enum)]
    mode: Option<CliRenderMode>,

    /// TrueType font for the translated text
    #[arg(long, env = "FOLIO_FONT")]
    font: Option<String>,

    /// JSON object mapping source terms to target terms
    #[arg(long)]
    terminology: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Also append log lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
        let file = match log_file {
            Some(path) => Some(Mutex::new(
                File::options()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?,
            )),
            None => None,
        };
        let logger = Box::new(CustomLogger { level, file });
        log::set_boxed_logger(logger).map_err(|e: SetLoggerError| anyhow!("Failed to install logger: {}", e))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Level tag and its ANSI color
    fn tag_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("ERROR", "\x1B[1;31m"),
            Level::Warn => ("WARN ", "\x1B[1;33m"),
            Level::Info => ("INFO ", "\x1B[1;32m"),
            Level::Debug => ("DEBUG", "\x1B[1;36m"),
            Level::Trace => ("TRACE", "\x1B[1;35m"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // dependencies only get through at warn and above
        metadata.level() <= self.level && (metadata.target().starts_with("folio") || metadata.level() <= Level::Warn)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let (tag, color) = Self::tag_for_level(record.level());

        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "{}{} {} {}\x1B[0m", color, now, tag, record.args());

        if let Some(file) = &self.file {
            let _ = writeln!(
                file.lock(),
                "{} {} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                tag,
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = CommandLineOptions::parse();

    let initial_level = options
        .log_level
        .clone()
        .map(|level| app_config::LogLevel::from(level).to_level_filter())
        .unwrap_or(LevelFilter::Info);
    CustomLogger::init(initial_level, options.log_file.as_deref())?;

    run(options).await
}

async fn run(options: CommandLineOptions) -> Result<()> {
    let config = load_config(&options)?;
    if options.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    let input = &options.input_path;
    if !input.is_file() {
        return Err(anyhow!("Input file does not exist: {:?}", input));
    }
    let output_path = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input, &config.target_language));
    if output_path.exists() && !options.force_overwrite {
        warn!("Output file already exists: {:?}. Use -f to force overwrite.", output_path);
        return Ok(());
    }

    let font = RenderFont::load(config.layout.font_path.as_deref()).context("Failed to load rendering font")?;
    let terminology = match &options.terminology {
        Some(path) => load_terminology(path)?,
        None => Terminology::default(),
    };

    let backend = LlmBackend::new(&config.translation);
    if let Err(e) = backend.test_connection().await {
        warn!("{} is not reachable yet: {}", config.translation.provider.display_name(), e);
    }

    let source = std::fs::read(input).with_context(|| format!("Failed to read input file: {:?}", input))?;
    info!(
        "Translating {:?} ({} -> {}) with {} ({})",
        input,
        config.source_language,
        config.target_language,
        config.translation.provider.display_name(),
        config.translation.get_model()
    );

    let orchestrator = JobOrchestrator::new(config, Arc::new(backend), font);
    let mut request = JobRequest::new(source).with_terminology(terminology);
    if let Some(mode) = options.mode.clone() {
        request = request.with_render_mode(mode.into());
    }
    let id = orchestrator.submit(request)?;

    let mut updates = orchestrator
        .subscribe(&id)
        .ok_or_else(|| anyhow!("Job {} disappeared", id))?;
    let progress_bar = ProgressBar::new(100);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    progress_bar.enable_steady_tick(Duration::from_millis(120));

    let report = loop {
        let report = updates.borrow_and_update().clone();
        progress_bar.set_position(report.progress as u64);
        progress_bar.set_message(report.stage.clone());
        if report.is_terminal() {
            break report;
        }
        if updates.changed().await.is_err() {
            break orchestrator
                .get_status(&id)
                .ok_or_else(|| anyhow!("Job {} disappeared", id))?;
        }
    };
    progress_bar.finish_and_clear();

    for warning in &report.warnings {
        warn!(
            "{} (page {}, block {}): {}",
            warning.category,
            warning.page.map(|p| (p + 1).to_string()).unwrap_or_else(|| "-".to_string()),
            warning.block.map(|b| b.to_string()).unwrap_or_else(|| "-".to_string()),
            warning.detail
        );
    }

    let result = match report.status {
        JobStatus::Completed => {
            let bytes = orchestrator
                .output(&id)
                .ok_or_else(|| anyhow!("Job {} completed without output", id))?;
            std::fs::write(&output_path, &bytes)
                .with_context(|| format!("Failed to write output file: {:?}", output_path))?;
            info!("Success: {:?}", output_path);
            Ok(())
        }
        _ => {
            let failure = report.error.as_ref();
            Err(anyhow!(
                "Job failed ({}): {}",
                failure.map(|f| f.category.to_string()).unwrap_or_else(|| "unknown".to_string()),
                failure.map(|f| f.detail.as_str()).unwrap_or("no detail")
            ))
        }
    };
    orchestrator.shutdown().await;
    result
}

fn load_config(options: &CommandLineOptions) -> Result<Config> {
    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        Config::load(config_path)?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        config.save(config_path)?;
        config
    };

    // Override config with CLI options if provided
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        let provider_str = config.translation.provider.to_lowercase_string();
        if let Some(provider_config) = config
            .translation
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            provider_config.model = model.clone();
        }
    }
    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(font) = &options.font {
        config.layout.font_path = Some(font.clone());
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn load_terminology(path: &Path) -> Result<Terminology> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read terminology file: {:?}", path))?;
    let map: HashMap<String, String> = serde_json::from_str(&contents)
        .with_context(|| format!("Terminology file must be a JSON object of strings: {:?}", path))?;
    let terminology = Terminology::from_map(&map);
    info!("Loaded {} terminology entries", terminology.len());
    Ok(terminology)
}

fn default_output_path(input: &Path, target_language: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}.{}.pdf", stem, target_language.to_lowercase()))
}
