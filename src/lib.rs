/*!
 * # folio - layout-preserving PDF translation
 *
 * A Rust library that translates the text of PDF documents with LLM
 * providers and writes the translation back onto the original page layout.
 *
 * ## Features
 *
 * - Extract text blocks and images from PDF pages in reading order
 * - Translate text in context-aware batches using various AI providers:
 *   - Ollama (local LLM)
 *   - OpenAI API (and OpenAI-compatible servers such as LM Studio)
 *   - Anthropic API
 * - Apply a user terminology dictionary to every translation
 * - Fit translated text into the original boxes by shrinking, wrapping and
 *   truncating, in place or side by side with the original page
 * - Run documents as jobs on a bounded worker pool with pollable status
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: Content model and reading order
 * - `extraction`: PDF parsing into the content model
 * - `fonts`: Font metrics, encodings and the rendering font
 * - `terminology`: Term dictionary substitution
 * - `translation`: Batch translation with a rolling context window
 * - `providers`: Client implementations for various LLM providers:
 *   - `providers::ollama`: Ollama API client
 *   - `providers::openai`: OpenAI API client
 *   - `providers::anthropic`: Anthropic API client
 * - `layout`: Text fitting and output document assembly
 * - `jobs`: Job state machine, registry and orchestrator
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod document;
pub mod errors;
pub mod extraction;
pub mod fonts;
pub mod jobs;
pub mod language_utils;
pub mod layout;
pub mod providers;
pub mod terminology;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::{Config, RenderMode};
pub use document::{ContentBlock, Document, ImageBlock, Page, TextBlock};
pub use errors::{AppError, ErrorCategory, ExtractError, JobError, ProviderError, RenderError, TranslationError};
pub use extraction::Extractor;
pub use fonts::RenderFont;
pub use jobs::{CancellationToken, JobId, JobOrchestrator, JobRequest, JobStatus, JobStatusReport};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use layout::Reconstructor;
pub use providers::{LlmBackend, TranslationBackend};
pub use terminology::{Terminology, TerminologyEntry};
pub use translation::{BatchTranslator, TranslationUnit};
