/*!
 * Batch prompt protocol spoken with chat-style language models.
 *
 * The user message is a JSON object carrying the texts to translate with
 * positional ids and the recent context pairs. The model must answer with
 * `{"translations": [{"id": .., "text": ..}]}`, optionally wrapped in a
 * fenced code block. Answers that are not JSON are tried as numbered
 * segments separated by `---` lines.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::window::ContextPair;
use crate::errors::ProviderError;
use crate::language_utils;

static NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\[(\d+)\]|(\d+)[.):])\s*").expect("static regex"));

/// One text of a batch, addressed by its position in the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextItem {
    pub id: usize,
    pub text: String,
}

/// User message payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub source_language: String,
    pub target_language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<ContextPair>,
    pub texts: Vec<TextItem>,
}

impl BatchRequest {
    pub fn new(texts: &[String], source_language: &str, target_language: &str, context: &[ContextPair]) -> Self {
        Self {
            source_language: language_utils::display_name(source_language),
            target_language: language_utils::display_name(target_language),
            context: context.to_vec(),
            texts: texts
                .iter()
                .enumerate()
                .map(|(id, text)| TextItem { id, text: text.clone() })
                .collect(),
        }
    }
}

/// Expected model answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub translations: Vec<TextItem>,
}

/// Fill the `{source_language}`/`{target_language}` placeholders of a system prompt
pub fn render_system_prompt(template: &str, source_language: &str, target_language: &str) -> String {
    let body = template
        .replace("{source_language}", &language_utils::display_name(source_language))
        .replace("{target_language}", &language_utils::display_name(target_language));
    format!(
        "{}\n\nThe user message is a JSON object. Translate every entry of \"texts\". \
Answer with JSON only, in the form {{\"translations\": [{{\"id\": 0, \"text\": \"...\"}}]}}, \
with exactly one translation per id.",
        body
    )
}

pub fn render_user_prompt(request: &BatchRequest) -> Result<String, ProviderError> {
    serde_json::to_string_pretty(request).map_err(|e| ProviderError::ParseError(e.to_string()))
}

/// Parse a model answer into exactly `expected` translations in id order
pub fn parse_batch_response(response: &str, expected: usize) -> Result<Vec<String>, ProviderError> {
    match extract_json(response).and_then(|json| serde_json::from_str::<BatchResponse>(json).ok()) {
        Some(parsed) => align(parsed.translations, expected),
        None => parse_numbered_segments(response, expected),
    }
}

fn align(items: Vec<TextItem>, expected: usize) -> Result<Vec<String>, ProviderError> {
    if items.len() != expected {
        return Err(ProviderError::MalformedResponse(format!(
            "expected {} translations, got {}",
            expected,
            items.len()
        )));
    }
    let mut slots: Vec<Option<String>> = vec![None; expected];
    for item in items {
        match slots.get_mut(item.id) {
            None => return Err(ProviderError::MalformedResponse(format!("unknown id {}", item.id))),
            Some(slot) if slot.is_some() => {
                return Err(ProviderError::MalformedResponse(format!("duplicate id {}", item.id)));
            }
            Some(slot) => *slot = Some(item.text),
        }
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(id, slot)| slot.ok_or_else(|| ProviderError::MalformedResponse(format!("missing id {}", id))))
        .collect()
}

/// Locate the JSON object inside a possibly wrapped answer
pub fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        if let Some(end) = after_fence[body_start..].find("```") {
            let body = after_fence[body_start..body_start + end].trim();
            if body.starts_with('{') {
                return Some(body);
            }
        }
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&trimmed[start..=end]),
        _ => None,
    }
}

/// Fallback format: one segment per text, separated by lines holding `---`
fn parse_numbered_segments(response: &str, expected: usize) -> Result<Vec<String>, ProviderError> {
    let mut segments: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in response.trim().lines() {
        if line.trim() == "---" {
            segments.push(current.join("\n"));
            current.clear();
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        segments.push(current.join("\n"));
    }

    let segments: Vec<String> = segments
        .into_iter()
        .map(|s| NUMBER_PREFIX.replace(s.trim(), "").trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if segments.len() == expected && expected > 0 {
        Ok(segments)
    } else {
        Err(ProviderError::MalformedResponse(format!(
            "response is neither translation JSON nor {} separated segments",
            expected
        )))
    }
}

pub fn detection_system_prompt() -> &'static str {
    "Identify the language of the text in the user message. \
Answer with its ISO 639-1 code only, for example: en"
}

/// Read a language code out of a detection answer
pub fn parse_detected_language(response: &str) -> Option<String> {
    let token = response
        .split(|c: char| !c.is_alphabetic())
        .find(|t| !t.is_empty())?;
    language_utils::normalize_to_part1_or_part2t(token).ok()
}
