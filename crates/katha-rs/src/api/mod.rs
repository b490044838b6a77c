//! API support: retry policy for transient failures, run identifiers and
//! token accounting.
//!
//! - [`retry`] decides which [`OpenRouterClient`](crate::OpenRouterClient)
//!   errors are worth another attempt and sleeps between attempts.
//! - [`tracing`] issues `trace_id`s for story runs and tracks per-stage token
//!   usage in a [`UsageTracker`].

pub mod retry;
pub mod tracing;

pub use retry::{RetryConfig, retry_transient};
pub use tracing::{UsageTracker, generate_trace_id};
