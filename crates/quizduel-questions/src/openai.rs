//! Question generation through an OpenAI-compatible chat completions API.

use std::time::Duration;

use quizduel_protocol::Difficulty;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::GenerationError;
use crate::provider::QuestionSource;
use crate::question::RawQuestion;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// HTTP deadline for one chat completion, connect through last body byte.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`OpenAiSource`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl OpenAiConfig {
    /// Settings for the public endpoint and default model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Remote question generator.
pub struct OpenAiSource {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiSource {
    /// # Errors
    /// [`GenerationError::Upstream`] if the HTTP client cannot be built
    /// (no usable TLS backend).
    pub fn new(config: OpenAiConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(config.request_timeout))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn request(&self, difficulty: Difficulty, count: usize) -> Result<Vec<RawQuestion>, GenerationError> {
        if self.config.api_key.trim().is_empty() {
            return Err(GenerationError::MissingCredential);
        }

        let body = json!({
            "model": self.config.model,
            "temperature": 0.9,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(difficulty, count) }
            ]
        });

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream(format!("status {status}: {text}")));
        }

        let api: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let content = api
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Malformed("response has no message content".into()))?;

        parse_content(&content)
    }
}

impl QuestionSource for OpenAiSource {
    async fn generate(&self, difficulty: Difficulty, count: usize) -> Result<Vec<RawQuestion>, GenerationError> {
        tracing::debug!(%difficulty, count, model = %self.config.model, "requesting questions");
        self.request(difficulty, count).await
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

const SYSTEM_PROMPT: &str = "You write trivia questions for a two-player quiz game. \
Reply with a JSON array only, no prose. Each element has the fields \
\"question\" (string), \"correctAnswer\" (string, or array of strings for \
questions that ask to name several items) and optionally \"options\" \
(array of 4 strings that contains every correct answer). Keep answers short.";

fn user_prompt(difficulty: Difficulty, count: usize) -> String {
    format!(
        "Write {count} {difficulty} trivia questions. Mix single-answer, multiple-choice \
         and name-several-items questions. Do not repeat topics."
    )
}

/// Extracts the question array from a model reply.
///
/// Models like to wrap JSON in Markdown fences or to return an object
/// with the array under some key; both are accepted.
pub(crate) fn parse_content(content: &str) -> Result<Vec<RawQuestion>, GenerationError> {
    let body = strip_fences(content);
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                serde_json::Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| GenerationError::Malformed("object without a question array".into()))?,
        _ => return Err(GenerationError::Malformed("expected a JSON array".into())),
    };

    // Item by item, so one odd entry does not sink the batch.
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawQuestion>(item) {
            Ok(q) => Some(q),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable question");
                None
            }
        })
        .collect())
}

fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
