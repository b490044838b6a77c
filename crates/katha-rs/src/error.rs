//! Typed errors for the continuity core.
//!
//! The generation and storage seams report failures as `String`, like the
//! rest of the crate. The two places where callers need to match on the
//! failure kind get dedicated enums: the context store (misuse must fail
//! fast) and the structured response parser (failures turn into fallbacks).

use thiserror::Error;

/// Misuse of the [`ContextStore`](crate::context::ContextStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("chapter numbers start at 1, got {0}")]
    InvalidChapter(u32),

    #[error("chapter {chapter} does not advance past chapter {latest}")]
    ChapterNotAdvancing { chapter: u32, latest: u32 },

    #[error("context configuration error: {0}")]
    Config(String),
}

/// A model response that could not be turned into a record.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in response ({0} bytes)")]
    NoJson(usize),

    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("response missing required field `{0}`")]
    MissingField(&'static str),
}
