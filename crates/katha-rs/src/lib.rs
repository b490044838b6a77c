//! Multi-chapter story generation on top of the OpenRouter chat completions
//! API.
//!
//! `katha-rs` turns a plot concept into a complete, persisted story: an
//! outline, a cast, and `N` chapters generated strictly in order. Each chapter
//! call receives a ranked [`ContextBundle`](context::ContextBundle) distilled
//! from the chapters before it, plus [`GenreEmphasis`](genre::GenreEmphasis)
//! guidance that rotates the story's genres across the narrative arc.
//!
//! # Getting started
//!
//! ```ignore
//! use katha_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = std::env::var("OPENROUTER_KEY").unwrap();
//!     let config = StoryConfig::default().with_output_dir("output");
//!     let generator = OpenRouterGenerator::new(OpenRouterClient::new(api_key)?, &config);
//!
//!     let request = StoryRequest::new("A lighthouse keeper finds a letter from 1952")
//!         .with_genres(["Mystery", "Drama"])
//!         .with_chapters(5);
//!
//!     let run = StoryPipeline::new(&generator, config)?
//!         .with_progress_handler(&LoggingHandler)
//!         .run(request)
//!         .await?;
//!
//!     println!("{} chapters, {}", run.chapters.len(), run.usage.summary());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pipeline`] | [`StoryPipeline`](pipeline::StoryPipeline): foundation, cast, then the chapter loop |
//! | [`context`] | [`ContextStore`](context::ContextStore): weighted memory of completed chapters, pruning, retrieval |
//! | [`genre`] | Narrative phase, rotating genre emphasis, genre arc stages |
//! | [`schema`] | Response contracts: format instructions, JSON extraction, shape normalization |
//! | [`story`] | Stage generators for outline, characters, chapters, decision points and branches |
//! | [`prompts`] | Stage prompt templates and `{placeholder}` rendering |
//! | [`generator`] | The [`Generator`](generator::Generator) seam and its OpenRouter implementation |
//! | [`storage`] | [`StoryStorage`](storage::StoryStorage) persistence and Markdown/audiobook export |
//! | [`catalog`] | Genre, tone and pacing catalogs; story element suggestions |
//! | [`events`] | Progress reporting side channel |
//! | [`api`] | Retry with backoff, trace ids, token and cost accounting |
//!
//! Generation never fails outright on bad model output: every stage has a
//! deterministic fallback record, and the failure is logged at `warn`.

pub mod api;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod generator;
pub mod genre;
pub mod pipeline;
pub mod prelude;
pub mod prompts;
pub mod schema;
pub mod storage;
pub mod story;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` for a type deriving
/// `schemars::JsonSchema`.
///
/// Used to show the model the exact shape of typed answers such as
/// [`StoryElementSuggestions`](catalog::StoryElementSuggestions).
///
/// ```
/// use katha_rs::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct Blend {
///     primary_genre: String,
///     #[serde(default)]
///     secondary_genres: Vec<String>,
/// }
///
/// let schema = json_schema_for::<Blend>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"primary_genre".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unset optional fields are omitted.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

/// JSON output format type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ResponseFormatType {
    #[serde(rename = "json_object")]
    JsonObject,
}

/// JSON output mode.
#[derive(Serialize, Debug)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub fmt_type: ResponseFormatType,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            fmt_type: ResponseFormatType::JsonObject,
        }
    }
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from `OpenRouterClient::chat()`.
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    referer: String,
    title: String,
}

impl OpenRouterClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, "https://github.com/katha-rs/katha-rs", "katha-rs")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        // Chapters are long; a full chapter completion regularly takes minutes.
        let client = reqwest::Client::builder()
            .user_agent("katha-rs/0.1")
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
        })
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }

        let parsed: RawChatResponse =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;

        if let Some(err) = parsed.error {
            return Err(format!("OpenRouter API error: {}", err.message));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        let (content, finish_reason) = match parsed.choices.and_then(|c| c.into_iter().next()) {
            Some(c) => (c.message.content, c.finish_reason),
            None => {
                debug!("LLM output: empty (no choices)");
                (None, None)
            }
        };

        Ok(ChatCompletion {
            content,
            usage: parsed.usage,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content, "hello");
        assert_eq!(Message::user("world").role, MessageRole::User);
    }

    #[test]
    fn chat_request_skips_unset_fields() {
        let req = ChatRequest {
            model: "test-model".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn json_response_format_serializes_type() {
        let req = ChatRequest {
            model: "m".into(),
            response_format: Some(ResponseFormat::json_object()),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn raw_response_tolerates_missing_usage() {
        let raw: RawChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{}"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert!(raw.usage.is_none());
        assert_eq!(raw.choices.unwrap().len(), 1);
    }
}
