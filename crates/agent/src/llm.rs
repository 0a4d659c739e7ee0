//! Language-model collaborators.
//!
//! [`LlmClient`] is the raw text-completion transport. [`IntentModel`] and
//! [`ResponseGenerator`] are the two contracts the dialogue core consumes; both
//! may fail, and callers degrade on failure rather than propagating it.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ration_core::config::{AppConfig, LlmProvider};
use ration_core::domain::conversation::ConversationState;
use serde_json::Value;

use crate::openai::ChatCompletionsClient;

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Used when no provider is configured; every call fails so callers take their
/// offline fallback.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledLlmClient;

#[async_trait]
impl LlmClient for DisabledLlmClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        Err(anyhow!("language model provider is disabled"))
    }
}

pub fn client_from_config(config: &AppConfig) -> Result<Arc<dyn LlmClient>> {
    match config.llm.provider {
        LlmProvider::Disabled => Ok(Arc::new(DisabledLlmClient)),
        LlmProvider::OpenAi | LlmProvider::Groq | LlmProvider::Ollama => {
            Ok(Arc::new(ChatCompletionsClient::from_config(config)?))
        }
    }
}

/// Closed-label intent classification used when no local rule matched.
#[async_trait]
pub trait IntentModel: Send + Sync {
    async fn classify(
        &self,
        utterance: &str,
        cart_summary: &str,
        allowed_labels: &[&str],
    ) -> Result<String>;
}

pub struct LlmIntentModel {
    client: Arc<dyn LlmClient>,
}

impl LlmIntentModel {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IntentModel for LlmIntentModel {
    async fn classify(
        &self,
        utterance: &str,
        cart_summary: &str,
        allowed_labels: &[&str],
    ) -> Result<String> {
        let labels = allowed_labels.join(", ");
        let prompt = format!(
            "You are an intent classifier for a ration ordering phone agent.\n\
             Classify the user message into exactly one intent.\n\n\
             Current cart: {cart_summary}\n\
             User message: \"{utterance}\"\n\n\
             Respond with ONLY valid JSON, no explanation, no markdown:\n\
             {{\"intent\": \"<one of: {labels}>\"}}"
        );

        let raw = self
            .client
            .complete(CompletionRequest { system: None, prompt, temperature: 0.0, max_tokens: 50 })
            .await?;

        extract_label(&raw).ok_or_else(|| anyhow!("no intent label in model response `{raw}`"))
    }
}

/// Pulls an intent label out of a free-text model reply. Markdown fences are
/// stripped, then the first JSON object's `intent` field is read, then a bare
/// single-word label is accepted.
pub fn extract_label(raw: &str) -> Option<String> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&cleaned[start..=end]) {
                return value
                    .get("intent")
                    .and_then(Value::as_str)
                    .map(|label| label.trim().to_ascii_lowercase())
                    .filter(|label| !label.is_empty());
            }
        }
    }

    let bare = cleaned.trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c.is_whitespace());
    let is_label = !bare.is_empty() && bare.chars().all(|c| c.is_ascii_alphabetic() || c == '_');
    is_label.then(|| bare.to_ascii_lowercase())
}

/// Natural-language reply for open-ended turns.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn respond(
        &self,
        utterance: &str,
        state: &ConversationState,
        instruction: &str,
    ) -> Result<String>;
}

const ASSISTANT_PERSONA: &str = "You are a friendly ration ordering assistant on a phone call.\n\
You help customers place their monthly grocery orders.\n\
Keep responses SHORT (1-2 sentences max), warm, and natural.\n\
If the customer is making small talk, respond naturally but gently guide them back to ordering.\n\
Never make up order details. Never confirm things the customer didn't say.\n\
Speak like a helpful human agent, not a robot.";

pub struct LlmResponseGenerator {
    client: Arc<dyn LlmClient>,
}

impl LlmResponseGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResponseGenerator for LlmResponseGenerator {
    async fn respond(
        &self,
        utterance: &str,
        state: &ConversationState,
        instruction: &str,
    ) -> Result<String> {
        let mut prompt = format!(
            "Customer said: \"{utterance}\"\nCurrent cart: {}\n",
            state.items.summary()
        );
        if !instruction.is_empty() {
            prompt.push_str(&format!("Context: {instruction}\n"));
        }
        prompt.push_str("Respond naturally in 1-2 sentences.");

        let reply = self
            .client
            .complete(CompletionRequest {
                system: Some(ASSISTANT_PERSONA.to_string()),
                prompt,
                temperature: 0.7,
                max_tokens: 80,
            })
            .await?;

        Ok(reply.trim().to_string())
    }
}
