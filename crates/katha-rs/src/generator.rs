//! The text generation seam.
//!
//! Every stage hands a fully rendered prompt to a [`Generator`] and gets raw
//! text back. The text is untrusted: stages parse it through their
//! [`ResponseSchema`](crate::schema::ResponseSchema) and fall back to a
//! deterministic record when it is unusable.
//!
//! [`OpenRouterGenerator`] is the production implementation. [`FnGenerator`]
//! wraps a closure, which is how tests script model answers.

use crate::api::retry::{RetryConfig, retry_transient};
use crate::config::StoryConfig;
use crate::prompts::PromptStage;
use crate::{ChatRequest, Message, OpenRouterClient, ResponseFormat, UsageInfo};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Boxed future returned by [`Generator::generate`].
pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<Generation, String>> + Send + 'a>>;

/// Raw model output for one prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub usage: Option<UsageInfo>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// Something that turns a prompt into text.
///
/// Implementations must be shareable across tasks: branch generation runs
/// several prompts concurrently against one generator.
pub trait Generator: Send + Sync {
    /// Model identifier, used for cost accounting.
    fn model(&self) -> &str;

    /// Generate a response for a rendered `prompt` of the given stage.
    fn generate<'a>(&'a self, stage: PromptStage, prompt: &'a str) -> GenerateFuture<'a>;
}

/// Call `generator`, failing with an error string if it takes longer than
/// `timeout`.
pub async fn generate_within(
    generator: &dyn Generator,
    stage: PromptStage,
    prompt: &str,
    timeout: Duration,
) -> Result<Generation, String> {
    match tokio::time::timeout(timeout, generator.generate(stage, prompt)).await {
        Ok(result) => result,
        Err(_) => Err(format!(
            "{stage} generation timed out after {}s",
            timeout.as_secs()
        )),
    }
}

// ── OpenRouterGenerator ────────────────────────────────────────────

const SYSTEM_PROMPT: &str = "You are a novelist and story architect. \
Always answer with a single JSON object exactly as the user's return format describes.";

/// [`Generator`] backed by the OpenRouter chat completions API.
pub struct OpenRouterGenerator {
    client: OpenRouterClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryConfig,
}

impl OpenRouterGenerator {
    /// Build a generator using the model, sampling and retry settings of
    /// `config`.
    pub fn new(client: OpenRouterClient, config: &StoryConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry: config.retry.clone(),
        }
    }
}

impl Generator for OpenRouterGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, stage: PromptStage, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            let body = ChatRequest {
                model: self.model.clone(),
                messages: vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)],
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                response_format: Some(ResponseFormat::json_object()),
                ..Default::default()
            };
            debug!("{stage}: prompt of {} chars", prompt.len());

            let (client, body) = (&self.client, &body);
            let completion =
                retry_transient(&self.retry, stage.name(), move || client.chat(body)).await?;

            if completion.finish_reason.as_deref() == Some("length") {
                warn!("{stage}: output hit max_tokens ({}) and may be truncated", self.max_tokens);
            }
            let text = completion
                .content
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| format!("{stage}: model returned no content"))?;
            Ok(Generation {
                text,
                usage: completion.usage,
            })
        })
    }
}

// ── FnGenerator ────────────────────────────────────────────────────

type ErasedGenerate = Box<
    dyn Fn(PromptStage, String) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send>>
        + Send
        + Sync,
>;

/// A closure-based generator.
///
/// ```
/// use katha_rs::generator::{FnGenerator, Generator};
/// use katha_rs::prompts::PromptStage;
///
/// # tokio_test(async {
/// let generator = FnGenerator::new(|stage, _prompt| async move {
///     Ok(format!("{{\"stage\": \"{stage}\"}}"))
/// });
/// let out = generator.generate(PromptStage::Foundation, "prompt").await.unwrap();
/// assert_eq!(out.text, r#"{"stage": "foundation"}"#);
/// # });
/// # fn tokio_test(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
pub struct FnGenerator {
    model: String,
    handler: ErasedGenerate,
}

impl FnGenerator {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(PromptStage, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        let erased = move |stage: PromptStage,
                           prompt: String|
              -> Pin<Box<dyn Future<Output = Result<String, String>> + Send>> {
            Box::pin(handler(stage, prompt))
        };
        Self {
            model: "scripted".to_string(),
            handler: Box::new(erased),
        }
    }

    /// Model name reported for cost accounting (builder pattern).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Generator for FnGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, stage: PromptStage, prompt: &'a str) -> GenerateFuture<'a> {
        let fut = (self.handler)(stage, prompt.to_string());
        Box::pin(async move { fut.await.map(Generation::new) })
    }
}

impl fmt::Debug for FnGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnGenerator")
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_generator_passes_stage_and_prompt() {
        let generator = FnGenerator::new(|stage, prompt| async move {
            Ok(format!("{}:{}", stage.name(), prompt.len()))
        })
        .with_model("test/model");
        let out = generator
            .generate(PromptStage::ChapterGeneration, "abc")
            .await
            .unwrap();
        assert_eq!(out.text, "chapter_generation:3");
        assert_eq!(generator.model(), "test/model");
    }

    #[tokio::test]
    async fn timeout_becomes_an_error() {
        let generator = FnGenerator::new(|_, _| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        });
        let err = generate_within(
            &generator,
            PromptStage::Foundation,
            "p",
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();
        assert!(err.contains("timed out"));
    }

    #[tokio::test]
    async fn generator_errors_pass_through() {
        let generator = FnGenerator::new(|_, _| async { Err("boom".to_string()) });
        let err = generate_within(
            &generator,
            PromptStage::Foundation,
            "p",
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert_eq!(err, "boom");
    }
}
