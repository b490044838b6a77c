//! Generation stages.
//!
//! Each submodule owns the records of one stage, the [`ResponseSchema`] the
//! model must answer with, and the deterministic fallback used when the
//! answer is unusable:
//!
//! | Stage | Module | Records |
//! |-------|--------|---------|
//! | Outline and chapter stubs | [`foundation`] | [`StoryOutline`], [`ChapterOutline`] |
//! | Cast | [`characters`] | [`Character`], [`SupportingCharacter`] |
//! | Chapters | [`chapters`] | [`Chapter`] |
//! | Decision points and branches | [`interactions`] | [`DecisionPoint`], [`Choice`], [`Branch`] |
//!
//! Stages talk to the model through a [`StageClient`], which renders the
//! stage template, enforces the per-call timeout and accounts token usage.
//!
//! [`ResponseSchema`]: crate::schema::ResponseSchema

pub mod chapters;
pub mod characters;
pub mod foundation;
pub mod interactions;

pub use chapters::{Chapter, ChapterRequest};
pub use characters::{Character, SupportingCharacter};
pub use foundation::{ChapterOutline, GenreBlend, StoryOutline};
pub use interactions::{Branch, Choice, DecisionPoint, GenreDecision, InteractiveSession};

use crate::api::tracing::UsageTracker;
use crate::generator::{Generator, generate_within};
use crate::prompts::{PromptStage, PromptTemplates, PromptVars};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

// ── Settings ───────────────────────────────────────────────────────

/// Story-wide parameters shared by every stage prompt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StorySettings {
    pub region: String,
    pub narrative_tone: String,
    pub narrative_pacing: String,
    pub genres: Vec<String>,
    pub language: String,
}

impl StorySettings {
    /// Genres comma-joined, as shown in prompts and fallback text.
    pub fn genres_text(&self) -> String {
        self.genres.join(", ")
    }

    /// Prompt variables common to all stages.
    pub fn prompt_vars(&self) -> PromptVars {
        PromptVars::new()
            .text("region", self.region.as_str())
            .text("narrative_tone", self.narrative_tone.as_str())
            .text("narrative_pacing", self.narrative_pacing.as_str())
            .list("genres", &self.genres)
            .text("language", self.language.as_str())
    }
}

/// Persisted description of a generated story.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoryMetadata {
    pub title: String,
    pub plot_concept: String,
    #[serde(flatten)]
    pub settings: StorySettings,
    pub chapter_count: u32,
    pub trace_id: String,
    pub created_at: DateTime<Utc>,
}

// ── StageClient ────────────────────────────────────────────────────

/// Renders stage prompts and sends them to the generator.
pub struct StageClient<'a> {
    generator: &'a dyn Generator,
    templates: &'a PromptTemplates,
    timeout: Duration,
    usage: Mutex<UsageTracker>,
}

impl<'a> StageClient<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        templates: &'a PromptTemplates,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            templates,
            timeout,
            usage: Mutex::new(UsageTracker::new()),
        }
    }

    /// Render the template for `stage` and return the raw model text.
    ///
    /// Rendering, transport and timeout failures all come back as `Err`;
    /// callers treat them the same as an unusable answer.
    pub async fn request(&self, stage: PromptStage, vars: &PromptVars) -> Result<String, String> {
        let prompt = self.templates.render(stage, vars)?;
        let generation = generate_within(self.generator, stage, &prompt, self.timeout).await?;
        let usage = generation.usage.clone().unwrap_or_default();
        debug!(
            "{stage}: {} chars back, {} completion tokens",
            generation.text.len(),
            usage.completion_tokens.unwrap_or(0)
        );
        if let Ok(mut tracker) = self.usage.lock() {
            tracker.record(
                stage.name(),
                self.generator.model(),
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
            );
        }
        Ok(generation.text)
    }

    /// Snapshot of the token usage so far.
    pub fn usage(&self) -> UsageTracker {
        self.usage
            .lock()
            .map(|tracker| tracker.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) fn settings(genres: &[&str]) -> StorySettings {
        StorySettings {
            region: "Kerala".into(),
            narrative_tone: "Dramatic".into(),
            narrative_pacing: "Slow-burning".into(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            language: "English".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FnGenerator;

    #[tokio::test]
    async fn request_renders_and_counts_calls() {
        let generator = FnGenerator::new(|_, prompt| async move { Ok(prompt) });
        let templates = PromptTemplates::new()
            .with_override(PromptStage::GenreBlend, "Blend {genres} in {region}");
        let client = StageClient::new(&generator, &templates, Duration::from_secs(1));
        let vars = testing::settings(&["Mystery", "Romance"]).prompt_vars();

        let text = client.request(PromptStage::GenreBlend, &vars).await.unwrap();
        assert_eq!(text, "Blend Mystery, Romance in Kerala");
        assert_eq!(client.usage().calls(), 1);
    }

    #[tokio::test]
    async fn missing_variable_fails_before_generation() {
        let generator = FnGenerator::new(|_, _| async { Ok("{}".to_string()) });
        let templates = PromptTemplates::new();
        let client = StageClient::new(&generator, &templates, Duration::from_secs(1));
        let err = client
            .request(PromptStage::Foundation, &PromptVars::new())
            .await
            .unwrap_err();
        assert!(err.contains("foundation"));
        assert_eq!(client.usage().calls(), 0);
    }

    #[test]
    fn metadata_flattens_settings() {
        let metadata = StoryMetadata {
            title: "T".into(),
            plot_concept: "p".into(),
            settings: testing::settings(&["Drama"]),
            chapter_count: 3,
            trace_id: "story-1".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["region"], "Kerala");
        assert_eq!(json["genres"][0], "Drama");
        let back: StoryMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }
}
