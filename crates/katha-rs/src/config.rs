//! Configuration with sensible defaults.
//!
//! [`StoryConfig`] carries everything a generation run needs besides the
//! story request itself: model settings, cast sizes, the per-call timeout,
//! and the [`ContextConfig`] for the continuity store. All fields have
//! defaults and `with_*` builder methods; call [`StoryConfig::validate`]
//! before starting a run.

use crate::api::retry::RetryConfig;
use crate::error::ContextError;
use std::path::PathBuf;
use std::time::Duration;

// ── Constants ──────────────────────────────────────────────────────

/// Most items of each kind handed to a chapter prompt.
pub const MAX_CONTEXT_ITEMS: usize = 15;

/// Weight assigned to `critical` context points.
pub const CRITICAL_CONTEXT_WEIGHT: u32 = 3;

/// Default number of chapters in a story.
pub const DEFAULT_CHAPTERS: u32 = 10;

/// Default model for all generation calls.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";

pub const DEFAULT_LANGUAGE: &str = "English";

// ── ContextConfig ──────────────────────────────────────────────────

/// Tuning for the [`ContextStore`](crate::context::ContextStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// Cap on each list in a retrieval bundle. Pruning triggers above three
    /// times this many points and keeps twice this many.
    pub max_context_items: usize,
    /// Weight of a `critical` point. Default `3`, equal to `high`.
    pub critical_context_weight: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_items: MAX_CONTEXT_ITEMS,
            critical_context_weight: CRITICAL_CONTEXT_WEIGHT,
        }
    }
}

impl ContextConfig {
    pub fn with_max_context_items(mut self, n: usize) -> Self {
        self.max_context_items = n;
        self
    }

    pub fn with_critical_context_weight(mut self, weight: u32) -> Self {
        self.critical_context_weight = weight;
        self
    }

    /// Point count above which the store prunes.
    pub fn prune_threshold(&self) -> usize {
        self.max_context_items.saturating_mul(3)
    }

    /// Point count kept by a prune.
    pub fn prune_target(&self) -> usize {
        self.max_context_items.saturating_mul(2)
    }

    pub fn validate(&self) -> Result<(), ContextError> {
        if self.max_context_items == 0 {
            return Err(ContextError::Config(
                "max_context_items must be positive".into(),
            ));
        }
        if self.max_context_items.checked_mul(3).is_none() {
            return Err(ContextError::Config(format!(
                "max_context_items {} is too large",
                self.max_context_items
            )));
        }
        if self.critical_context_weight == 0 {
            return Err(ContextError::Config(
                "critical_context_weight must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ── StoryConfig ────────────────────────────────────────────────────

/// Settings for a story generation run.
#[derive(Debug, Clone)]
pub struct StoryConfig {
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,
    /// Maximum tokens per response. Default: `8192`.
    pub max_tokens: u32,
    /// Sampling temperature. Default: `0.7`.
    pub temperature: f32,
    /// Root directory for story folders. Default: `"output"`.
    pub output_dir: PathBuf,
    /// Main characters generated per story. Default: `3`.
    pub main_characters: u32,
    /// Supporting characters generated per story. Default: `5`.
    pub supporting_characters: u32,
    /// Decision points generated per chapter on request. Default: `1`.
    pub decision_points: u32,
    /// Upper bound on a single generation call. Default: 180 s.
    pub generation_timeout: Duration,
    /// Retry policy for transient API errors. Default: no retries.
    pub retry: RetryConfig,
    /// Continuity store tuning.
    pub context: ContextConfig,
    /// JSON file of prompt template overrides, keyed by stage name.
    pub prompt_overrides: Option<PathBuf>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8192,
            temperature: 0.7,
            output_dir: PathBuf::from("output"),
            main_characters: 3,
            supporting_characters: 5,
            decision_points: 1,
            generation_timeout: Duration::from_secs(180),
            retry: RetryConfig::default(),
            context: ContextConfig::default(),
            prompt_overrides: None,
        }
    }
}

impl StoryConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_cast(mut self, main: u32, supporting: u32) -> Self {
        self.main_characters = main;
        self.supporting_characters = supporting;
        self
    }

    pub fn with_decision_points(mut self, n: u32) -> Self {
        self.decision_points = n;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }

    pub fn with_prompt_overrides(mut self, path: impl Into<PathBuf>) -> Self {
        self.prompt_overrides = Some(path.into());
        self
    }

    /// Reject configurations that cannot produce a story.
    pub fn validate(&self) -> Result<(), String> {
        self.context.validate().map_err(|e| e.to_string())?;
        if self.model.trim().is_empty() {
            return Err("model must not be empty".into());
        }
        if self.main_characters == 0 {
            return Err("at least one main character is required".into());
        }
        if self.decision_points == 0 {
            return Err("decision_points must be positive".into());
        }
        if self.generation_timeout.is_zero() {
            return Err("generation_timeout must be positive".into());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            ));
        }
        Ok(())
    }
}
