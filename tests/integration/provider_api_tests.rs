/*!
 * Integration tests for provider requests and the batch prompt protocol
 */

use folio::app_config::{ProviderConfig, TranslationConfig, TranslationProvider};
use folio::providers::anthropic::AnthropicRequest;
use folio::providers::ollama::{ChatMessage, ChatRequest};
use folio::providers::openai::OpenAIRequest;
use folio::providers::{LlmBackend, TranslationBackend};
use folio::translation::ContextPair;
use folio::translation::protocol::{BatchRequest, parse_batch_response, render_system_prompt, render_user_prompt};

/// Test the OpenAI request body
#[test]
fn test_openai_request_shouldSerializeMessagesInOrder() {
    let request = OpenAIRequest::new("gpt-4o-mini")
        .add_message("system", "You translate documents.")
        .add_message("user", "{}")
        .temperature(0.3)
        .max_tokens(256);
    let body = serde_json::to_value(&request).unwrap();

    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "{}");
    assert_eq!(body["max_tokens"], 256);
}

/// Test that Anthropic keeps the system prompt out of the message list
#[test]
fn test_anthropic_request_shouldCarrySystemSeparately() {
    let request = AnthropicRequest::new("claude-3-haiku-20240307", 1024)
        .system("You translate documents.")
        .add_message("user", "hello");
    let body = serde_json::to_value(&request).unwrap();

    assert_eq!(body["system"], "You translate documents.");
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert!(body.get("temperature").is_none());
}

/// Test the Ollama chat body
#[test]
fn test_ollama_request_shouldDisableStreaming() {
    let request = ChatRequest::new(
        "llama3",
        vec![ChatMessage { role: "user".to_string(), content: "hello".to_string() }],
    )
    .temperature(0.2);
    let body = serde_json::to_value(&request).unwrap();

    assert_eq!(body["model"], "llama3");
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"][0]["content"], "hello");
}

/// Test that a batch prompt names languages and carries context and ids
#[test]
fn test_batch_prompt_shouldCarryContextAndIds() {
    let texts = vec!["Introduction".to_string(), "Results".to_string()];
    let context = vec![ContextPair::new("Abstract", "Résumé")];
    let request = BatchRequest::new(&texts, "en", "fr", &context);
    let user = render_user_prompt(&request).unwrap();
    let system = render_system_prompt("Translate from {source_language} to {target_language}.", "en", "fr");

    assert!(system.starts_with("Translate from English to French."));
    let body: serde_json::Value = serde_json::from_str(&user).unwrap();
    assert_eq!(body["texts"][1]["id"], 1);
    assert_eq!(body["texts"][1]["text"], "Results");
    assert_eq!(body["context"][0]["target"], "Résumé");
}

/// Test parsing answers wrapped in prose and code fences
#[test]
fn test_parse_batch_response_withFencedJson_shouldAlignById() {
    let answer = "Here you go:\n```json\n{\"translations\": [{\"id\": 1, \"text\": \"Résultats\"}, {\"id\": 0, \"text\": \"Introduction\"}]}\n```";
    let parsed = parse_batch_response(answer, 2).unwrap();
    assert_eq!(parsed, vec!["Introduction", "Résultats"]);

    let error = parse_batch_response(answer, 3).unwrap_err();
    assert!(error.is_transient());
}

/// Test that an unreachable server yields a retryable error
#[tokio::test]
async fn test_llm_backend_withUnreachableServer_shouldFailTransiently() {
    let mut provider = ProviderConfig::new(TranslationProvider::Ollama);
    provider.endpoint = "http://127.0.0.1:9".to_string();
    provider.timeout_secs = 2;
    let config = TranslationConfig {
        provider: TranslationProvider::Ollama,
        available_providers: vec![provider],
        ..TranslationConfig::default()
    };
    let backend = LlmBackend::new(&config);

    let error = backend
        .translate_batch(&["Hello".to_string()], "en", "fr", &[])
        .await
        .unwrap_err();
    assert!(error.is_transient(), "{:?}", error);
    assert!(backend.test_connection().await.is_err());
}
