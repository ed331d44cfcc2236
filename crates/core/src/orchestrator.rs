//! Multi-provider inference orchestration.
//!
//! Every AI-backed operation in the system (question generation, follow-up
//! decisions, grading) routes through [`Orchestrator::infer`]: primary
//! provider, then secondary provider, then the caller-supplied fallback
//! stub. The ladder never returns an error; callers always receive a
//! structured value they can consume directly.

use crate::model::PromptMessage;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// A chat-completion backend. Implementations translate the shared
/// message shape into their own calling convention and return the raw
/// model text; repair and parsing happen in the orchestrator.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String>;
}

// --- OpenAI chat completions ---

#[derive(Debug, Deserialize)]
struct LlmResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

pub struct OpenAiChat {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl OpenAiChat {
    pub fn new(api_key: SecretString, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "response_format": { "type": "json_object" },
            "temperature": 0.2
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<LlmResponse>()
            .await?;

        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("chat completion returned no choices"))
    }
}

// --- Gemini generateContent ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: String,
}

pub struct GeminiChat {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl GeminiChat {
    pub fn new(api_key: SecretString, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiChat {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        // Gemini has no system role in this endpoint; the same semantic
        // prompt is flattened into a single user turn.
        let combined = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let body = json!({
            "contents": [
                { "role": "user", "parts": [ { "text": combined } ] }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.2
            }
        });

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model,
            self.api_key.expose_secret()
        );

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<GeminiResponse>()
            .await?;

        resp.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow::anyhow!("gemini returned no candidates"))
    }
}

// --- The degrade ladder ---

/// Tagged result of an inference call. Downstream code consumes the value
/// without re-branching on parse success; the tag exists for logging and
/// for tests.
#[derive(Debug, Clone, PartialEq)]
pub enum InferOutcome {
    Parsed(Value),
    UsedFallback(Value),
}

impl InferOutcome {
    pub fn into_value(self) -> Value {
        match self {
            InferOutcome::Parsed(v) | InferOutcome::UsedFallback(v) => v,
        }
    }

    pub fn used_fallback(&self) -> bool {
        matches!(self, InferOutcome::UsedFallback(_))
    }
}

pub struct Orchestrator {
    primary: Arc<dyn ChatProvider>,
    secondary: Option<Arc<dyn ChatProvider>>,
}

impl Orchestrator {
    pub fn new(primary: Arc<dyn ChatProvider>) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn ChatProvider>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Routes a prompt down the provider ladder. Never fails: a provider
    /// error or unparseable output moves to the next rung, and the last
    /// rung is the caller's own fallback stub.
    pub async fn infer(&self, messages: &[PromptMessage], fallback: Value) -> InferOutcome {
        match self.primary.complete(messages).await {
            Ok(raw) => {
                if let Some(parsed) = repair_json(&raw) {
                    return InferOutcome::Parsed(parsed);
                }
                tracing::warn!("primary provider output was unparseable after repair");
            }
            Err(e) => tracing::warn!("primary provider failed: {e:#}"),
        }

        if let Some(secondary) = &self.secondary {
            match secondary.complete(messages).await {
                Ok(raw) => {
                    if let Some(parsed) = repair_json(&raw) {
                        return InferOutcome::Parsed(parsed);
                    }
                    tracing::warn!("secondary provider output was unparseable after repair");
                }
                Err(e) => tracing::warn!("secondary provider failed: {e:#}"),
            }
        }

        tracing::warn!("all providers exhausted, serving caller fallback");
        InferOutcome::UsedFallback(fallback)
    }
}

/// Best-effort repair of model output into a JSON object: code-fence
/// markers are stripped, then the text is truncated to the substring
/// between the first `{` and the last `}` to tolerate preambles and
/// trailing prose.
pub fn repair_json(raw: &str) -> Option<Value> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&cleaned[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> Vec<PromptMessage> {
        vec![PromptMessage::user("ping")]
    }

    #[test]
    fn repair_strips_fences_and_preamble() {
        let raw = "Sure, here is the JSON you asked for:\n```json\n{\"ok\": true}\n```\nLet me know!";
        let parsed = repair_json(raw).expect("should repair fenced output");
        assert_eq!(parsed, json!({"ok": true}));
    }

    #[test]
    fn repair_takes_outermost_braces() {
        let raw = "prefix {\"a\": {\"b\": 1}} suffix";
        let parsed = repair_json(raw).expect("should repair wrapped output");
        assert_eq!(parsed, json!({"a": {"b": 1}}));
    }

    #[test]
    fn repair_rejects_braceless_text() {
        assert!(repair_json("no json here").is_none());
        assert!(repair_json("} backwards {").is_none());
    }

    #[tokio::test]
    async fn both_providers_failing_round_trips_the_stub() {
        let mut primary = MockChatProvider::new();
        primary
            .expect_complete()
            .returning(|_| Err(anyhow::anyhow!("quota exceeded")))
            .once();
        let mut secondary = MockChatProvider::new();
        secondary
            .expect_complete()
            .returning(|_| Err(anyhow::anyhow!("bad credentials")))
            .once();

        let orchestrator =
            Orchestrator::new(Arc::new(primary)).with_secondary(Arc::new(secondary));

        let stub = json!({"questions": ["fallback question"]});
        let outcome = orchestrator.infer(&prompt(), stub.clone()).await;

        assert!(outcome.used_fallback());
        assert_eq!(outcome.into_value(), stub);
    }

    #[tokio::test]
    async fn primary_success_skips_secondary() {
        let mut primary = MockChatProvider::new();
        primary
            .expect_complete()
            .returning(|_| Ok(r#"{"answer": 42}"#.to_string()))
            .once();
        let mut secondary = MockChatProvider::new();
        secondary.expect_complete().never();

        let orchestrator =
            Orchestrator::new(Arc::new(primary)).with_secondary(Arc::new(secondary));

        let outcome = orchestrator.infer(&prompt(), Value::Null).await;
        assert!(!outcome.used_fallback());
        assert_eq!(outcome.into_value(), json!({"answer": 42}));
    }

    #[tokio::test]
    async fn unparseable_primary_falls_through_to_secondary() {
        let mut primary = MockChatProvider::new();
        primary
            .expect_complete()
            .returning(|_| Ok("I'd rather chat than emit JSON".to_string()))
            .once();
        let mut secondary = MockChatProvider::new();
        secondary
            .expect_complete()
            .returning(|_| Ok("```json\n{\"rescued\": true}\n```".to_string()))
            .once();

        let orchestrator =
            Orchestrator::new(Arc::new(primary)).with_secondary(Arc::new(secondary));

        let outcome = orchestrator.infer(&prompt(), Value::Null).await;
        assert!(!outcome.used_fallback());
        assert_eq!(outcome.into_value(), json!({"rescued": true}));
    }

    #[tokio::test]
    async fn missing_secondary_degrades_straight_to_stub() {
        let mut primary = MockChatProvider::new();
        primary
            .expect_complete()
            .returning(|_| Err(anyhow::anyhow!("timeout")))
            .once();

        let orchestrator = Orchestrator::new(Arc::new(primary));
        let stub = json!({"followUp": null});
        let outcome = orchestrator.infer(&prompt(), stub.clone()).await;

        assert!(outcome.used_fallback());
        assert_eq!(outcome.into_value(), stub);
    }
}
