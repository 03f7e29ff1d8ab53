/*!
 * The translation capability as seen by the batch translator.
 */

use async_trait::async_trait;
use log::debug;
use std::time::Instant;

use super::anthropic::{Anthropic, AnthropicRequest};
use super::ollama::{ChatMessage, ChatRequest, Ollama};
use super::openai::{OpenAI, OpenAIRequest};
use super::{ChatPrompt, Provider};
use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;
use crate::translation::protocol::{self, BatchRequest};
use crate::translation::window::ContextPair;

/// External translation capability
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Translate `texts` in order, returning exactly one output per input
    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
        context: &[ContextPair],
    ) -> Result<Vec<String>, ProviderError>;

    /// Guess the language of `sample`, as an ISO code
    async fn detect_language(&self, sample: &str) -> Result<String, ProviderError>;

    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Provider implementation variants
#[derive(Debug)]
enum ProviderClient {
    Ollama(Ollama),
    /// OpenAI, or an OpenAI-compatible server such as LM Studio
    OpenAI(OpenAI),
    Anthropic(Anthropic),
}

/// Translation backend speaking the batch prompt protocol to an LLM
#[derive(Debug)]
pub struct LlmBackend {
    client: ProviderClient,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmBackend {
    pub fn new(config: &TranslationConfig) -> Self {
        let model = config.get_model();
        let endpoint = config.get_endpoint();
        let timeout = config.get_timeout_secs();
        let client = match config.provider {
            TranslationProvider::Ollama => ProviderClient::Ollama(Ollama::new(&endpoint, model.clone(), timeout)),
            TranslationProvider::OpenAI => {
                ProviderClient::OpenAI(OpenAI::new(config.get_api_key(), endpoint, model.clone(), timeout))
            }
            TranslationProvider::LMStudio => {
                // LM Studio often doesn't require an API key; use a placeholder if empty
                let api_key = match config.get_api_key() {
                    key if key.is_empty() => "lm-studio".to_string(),
                    key => key,
                };
                ProviderClient::OpenAI(OpenAI::new(api_key, endpoint, model.clone(), timeout))
            }
            TranslationProvider::Anthropic => {
                ProviderClient::Anthropic(Anthropic::new(config.get_api_key(), endpoint, model.clone(), timeout))
            }
        };
        Self {
            client,
            model,
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.get_max_tokens(),
        }
    }

    /// Send one system + user exchange and return the answer text
    async fn chat(&self, prompt: ChatPrompt) -> Result<String, ProviderError> {
        let started = Instant::now();
        let text = match &self.client {
            ProviderClient::Ollama(client) => {
                let request = ChatRequest::new(
                    self.model.clone(),
                    vec![
                        ChatMessage { role: "system".to_string(), content: prompt.system },
                        ChatMessage { role: "user".to_string(), content: prompt.user },
                    ],
                )
                .temperature(self.temperature)
                .num_predict(self.max_tokens);
                Ollama::extract_text(&client.complete(request).await?)
            }
            ProviderClient::OpenAI(client) => {
                let request = OpenAIRequest::new(self.model.clone())
                    .add_message("system", prompt.system)
                    .add_message("user", prompt.user)
                    .temperature(self.temperature)
                    .max_tokens(self.max_tokens);
                OpenAI::extract_text(&client.complete(request).await?)
            }
            ProviderClient::Anthropic(client) => {
                let request = AnthropicRequest::new(self.model.clone(), self.max_tokens)
                    .system(prompt.system)
                    .add_message("user", prompt.user)
                    .temperature(self.temperature);
                Anthropic::extract_text(&client.complete(request).await?)
            }
        };
        debug!("{} answered in {:?}", self.model, started.elapsed());
        if text.trim().is_empty() {
            return Err(ProviderError::MalformedResponse("empty response".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl TranslationBackend for LlmBackend {
    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
        context: &[ContextPair],
    ) -> Result<Vec<String>, ProviderError> {
        let request = BatchRequest::new(texts, source_language, target_language, context);
        let prompt = ChatPrompt {
            system: protocol::render_system_prompt(&self.system_prompt, source_language, target_language),
            user: protocol::render_user_prompt(&request)?,
        };
        let answer = self.chat(prompt).await?;
        protocol::parse_batch_response(&answer, texts.len())
    }

    async fn detect_language(&self, sample: &str) -> Result<String, ProviderError> {
        let prompt = ChatPrompt {
            system: protocol::detection_system_prompt().to_string(),
            user: sample.to_string(),
        };
        let answer = self.chat(prompt).await?;
        protocol::parse_detected_language(&answer)
            .ok_or_else(|| ProviderError::MalformedResponse(format!("not a language code: {}", answer.trim())))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match &self.client {
            ProviderClient::Ollama(client) => client.test_connection().await,
            ProviderClient::OpenAI(client) => client.test_connection().await,
            ProviderClient::Anthropic(client) => client.test_connection().await,
        }
    }
}
