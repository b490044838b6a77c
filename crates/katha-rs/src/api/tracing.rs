//! Run identifiers and token accounting.
//!
//! Each story run gets a `trace_id` that appears in its log lines and in the
//! saved metadata. [`UsageTracker`] accumulates token counts per generation
//! stage and an approximate cost.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique identifier for a story run.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("story-{ts:x}-{count:04x}")
}

/// Approximate USD price per million tokens, keyed on the model name.
///
/// Only used to flag runaway spend, not for billing.
pub fn price_per_million(model: &str) -> (f64, f64) {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();
    if name.contains("4o-mini") {
        (0.15, 0.60)
    } else if name.contains("gpt-4o") {
        (2.50, 10.0)
    } else if name.contains("haiku") {
        (0.80, 4.0)
    } else if name.contains("sonnet") {
        (3.0, 15.0)
    } else if name.contains("opus") {
        (15.0, 75.0)
    } else if name.contains("gemini") && name.contains("flash") {
        (0.10, 0.40)
    } else {
        (3.0, 15.0)
    }
}

/// Token counts for one stage.
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageUsage {
    pub calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Cumulative token usage for a run.
#[derive(Serialize, Debug, Default, Clone)]
pub struct UsageTracker {
    pub stages: BTreeMap<String, StageUsage>,
    pub estimated_cost_usd: f64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one generation call.
    pub fn record(&mut self, stage: &str, model: &str, prompt_tokens: u32, completion_tokens: u32) {
        let entry = self.stages.entry(stage.to_string()).or_default();
        entry.calls += 1;
        entry.prompt_tokens += u64::from(prompt_tokens);
        entry.completion_tokens += u64::from(completion_tokens);

        let (input, output) = price_per_million(model);
        self.estimated_cost_usd += f64::from(prompt_tokens) / 1_000_000.0 * input
            + f64::from(completion_tokens) / 1_000_000.0 * output;
    }

    pub fn calls(&self) -> u32 {
        self.stages.values().map(|s| s.calls).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.stages
            .values()
            .map(|s| s.prompt_tokens + s.completion_tokens)
            .sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} call(s), {} tokens, est. cost: ${:.4}",
            self.calls(),
            self.total_tokens(),
            self.estimated_cost_usd
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_unique() {
        let a = generate_trace_id();
        let b = generate_trace_id();
        assert_ne!(a, b);
        assert!(a.starts_with("story-"));
    }

    #[test]
    fn usage_accumulates_per_stage() {
        let mut usage = UsageTracker::new();
        usage.record("chapter_generation", "openai/gpt-4o", 1000, 4000);
        usage.record("chapter_generation", "openai/gpt-4o", 1000, 4000);
        usage.record("foundation", "openai/gpt-4o", 500, 500);
        assert_eq!(usage.calls(), 3);
        assert_eq!(usage.total_tokens(), 11_000);
        assert_eq!(usage.stages["chapter_generation"].calls, 2);
        assert!(usage.estimated_cost_usd > 0.0);
        assert!(usage.summary().starts_with("3 call(s)"));
    }

    #[test]
    fn pricing_matches_on_model_segment() {
        assert_eq!(price_per_million("openai/gpt-4o-mini"), (0.15, 0.60));
        assert_eq!(price_per_million("openai/gpt-4o"), (2.50, 10.0));
    }
}
