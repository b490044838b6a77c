//! Convenience re-exports for common `katha-rs` types.
//!
//! ```ignore
//! use katha_rs::prelude::*;
//! ```
//!
//! Covers what most programs need to generate, branch and export a story.
//! Context store internals, response schemas and stage-level generators are
//! left out; import those from their modules directly.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{Message, OpenRouterClient, json_schema_for};

// ── Configuration ───────────────────────────────────────────────────
pub use crate::api::{RetryConfig, UsageTracker};
pub use crate::config::{ContextConfig, StoryConfig};

// ── Pipeline ────────────────────────────────────────────────────────
pub use crate::generator::{FnGenerator, Generator, OpenRouterGenerator};
pub use crate::pipeline::{
    BranchRun, PipelineState, StoryPipeline, StoryRequest, StoryRun, StorySession,
};
pub use crate::prompts::{PromptStage, PromptTemplates};

// ── Events ──────────────────────────────────────────────────────────
pub use crate::events::{
    CompositeProgressHandler, FnProgressHandler, LoggingHandler, NoopHandler, ProgressEvent,
    ProgressHandler,
};

// ── Records and storage ─────────────────────────────────────────────
pub use crate::catalog::StoryElementSuggestions;
pub use crate::storage::{
    Cast, FileStorage, MemoryStorage, StoryStorage, export_audiobook_script, export_full_story,
};
pub use crate::story::{
    Branch, Chapter, Character, DecisionPoint, StoryMetadata, StoryOutline, StorySettings,
    SupportingCharacter,
};
