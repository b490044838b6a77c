//! Cross-chapter continuity.
//!
//! The [`ContextStore`] is the memory of a single generation session. After
//! each chapter is generated, [`ContextStore::update_with_chapter`] folds it
//! into the store as a [`ChapterSummary`] plus weighted [`ContextPoint`]s
//! (key events, character development, open hooks). Before each chapter,
//! [`ContextStore::context_for_chapter`] produces the [`ContextBundle`] that
//! the chapter prompt receives.
//!
//! Retention is governed by fixed weight tiers, not relevance: every point's
//! weight is a pure function of its [`Importance`], and when the store grows
//! past `3 × max_context_items` points it keeps the `2 × max_context_items`
//! heaviest (ties broken toward later chapters). Retrieval never prunes.
//!
//! The store lives exactly as long as one run; nothing is persisted.

mod bundle;
mod store;

pub use bundle::ContextBundle;
pub use store::{ChapterSummary, ContextPoint, ContextStore, Importance, PointKind};
