/*!
 * Clients for the external translation capability.
 *
 * - [`Provider`]: one chat completion against an LLM HTTP API
 *   (OpenAI-compatible, Anthropic, Ollama)
 * - [`TranslationBackend`]: what the batch translator needs, implemented
 *   over a provider by [`LlmBackend`] and by [`mock::MockBackend`] in tests
 *
 * Providers make a single attempt per call; retries belong to the caller.
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably behind the translation backend.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// A system prompt plus one user message
#[derive(Debug, Clone)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

pub mod anthropic;
pub mod backend;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use backend::{LlmBackend, TranslationBackend};

/// Read an error body and classify it by status code
pub(crate) async fn error_from_response(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    log::error!("{} API error ({}): {}", provider, status, body);
    ProviderError::from_status(status, body)
}
