//! Context points and chapter summaries accumulated during a session.

use crate::config::ContextConfig;
use crate::error::ContextError;
use crate::story::Chapter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ── Point types ────────────────────────────────────────────────────

/// Importance tier of a context point.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

impl Importance {
    /// Retention weight: low 1, medium 2, high 3, critical as configured.
    pub fn weight(self, critical_weight: u32) -> u32 {
        match self {
            Importance::Low => 1,
            Importance::Medium => 2,
            Importance::High => 3,
            Importance::Critical => critical_weight,
        }
    }

    /// Parse a tier name. Unknown names map to `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" => Importance::Low,
            "high" => Importance::High,
            "critical" => Importance::Critical,
            _ => Importance::Medium,
        }
    }

    /// Importance of a key event, judged from its wording.
    ///
    /// Literal English substring match on "critical" / "important"; text in
    /// other languages always lands on `Medium`.
    pub fn of_event(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("critical") || lower.contains("important") {
            Importance::High
        } else {
            Importance::Medium
        }
    }
}

/// What a context point records.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Event,
    CharacterDevelopment,
    Hook,
}

/// One remembered fact from a completed chapter. Immutable once recorded.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ContextPoint {
    content: String,
    chapter: u32,
    kind: PointKind,
    importance: Importance,
    weight: u32,
}

impl ContextPoint {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    pub fn kind(&self) -> PointKind {
        self.kind
    }

    pub fn importance(&self) -> Importance {
        self.importance
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Ordering key: heavier first, then later chapters first.
    pub(crate) fn rank(&self) -> (u32, u32) {
        (self.weight, self.chapter)
    }
}

/// Condensed record of one completed chapter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChapterSummary {
    pub title: String,
    pub summary: String,
    pub key_events: Vec<String>,
}

// ── ContextStore ───────────────────────────────────────────────────

/// Session-scoped memory of what happened in earlier chapters.
///
/// Points are kept in insertion order until a prune reorders them by rank.
/// Summaries are keyed by chapter number and replaced on re-insert.
#[derive(Debug, Clone)]
pub struct ContextStore {
    config: ContextConfig,
    points: Vec<ContextPoint>,
    summaries: BTreeMap<u32, ChapterSummary>,
    latest_chapter: u32,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self {
            config: ContextConfig::default(),
            points: Vec::new(),
            summaries: BTreeMap::new(),
            latest_chapter: 0,
        }
    }
}

impl ContextStore {
    /// Create an empty store, rejecting non-positive tuning values.
    pub fn new(config: ContextConfig) -> Result<Self, ContextError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn points(&self) -> &[ContextPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn summary(&self, chapter: u32) -> Option<&ChapterSummary> {
        self.summaries.get(&chapter)
    }

    pub(crate) fn summaries(&self) -> &BTreeMap<u32, ChapterSummary> {
        &self.summaries
    }

    /// Highest chapter applied through [`update_with_chapter`](Self::update_with_chapter).
    pub fn latest_chapter(&self) -> u32 {
        self.latest_chapter
    }

    /// Append a point. Does not prune.
    pub fn record(
        &mut self,
        content: impl Into<String>,
        chapter: u32,
        kind: PointKind,
        importance: Importance,
    ) -> Result<(), ContextError> {
        if chapter == 0 {
            return Err(ContextError::InvalidChapter(chapter));
        }
        self.points.push(ContextPoint {
            content: content.into(),
            chapter,
            kind,
            importance,
            weight: importance.weight(self.config.critical_context_weight),
        });
        Ok(())
    }

    /// Insert or replace the summary for `chapter`.
    pub fn upsert_chapter_summary(&mut self, chapter: u32, summary: ChapterSummary) {
        if self.summaries.insert(chapter, summary).is_some() {
            debug!("Replaced summary for chapter {chapter}");
        }
    }

    /// Fold a completed chapter into the store.
    ///
    /// Records the summary, one point per key event, character development
    /// item and hook, then prunes. `chapter_number` must be at least 1 and
    /// greater than every chapter applied before; otherwise the store is left
    /// untouched.
    pub fn update_with_chapter(
        &mut self,
        chapter: &Chapter,
        chapter_number: u32,
    ) -> Result<(), ContextError> {
        if chapter_number == 0 {
            return Err(ContextError::InvalidChapter(chapter_number));
        }
        if chapter_number <= self.latest_chapter {
            return Err(ContextError::ChapterNotAdvancing {
                chapter: chapter_number,
                latest: self.latest_chapter,
            });
        }

        let title = if chapter.title.trim().is_empty() {
            format!("Chapter {chapter_number}")
        } else {
            chapter.title.clone()
        };
        let summary = if chapter.summary.trim().is_empty() {
            "No summary available.".to_string()
        } else {
            chapter.summary.clone()
        };
        self.upsert_chapter_summary(
            chapter_number,
            ChapterSummary {
                title,
                summary,
                key_events: chapter.key_events.clone(),
            },
        );

        for event in &chapter.key_events {
            self.record(
                event.as_str(),
                chapter_number,
                PointKind::Event,
                Importance::of_event(event),
            )?;
        }
        for development in chapter.character_development.items() {
            self.record(
                development,
                chapter_number,
                PointKind::CharacterDevelopment,
                Importance::High,
            )?;
        }
        for hook in &chapter.next_chapter_hooks {
            self.record(hook.as_str(), chapter_number, PointKind::Hook, Importance::High)?;
        }

        self.latest_chapter = chapter_number;
        let pruned = self.prune();
        debug!(
            "Context updated with chapter {chapter_number}: {} point(s) held, {pruned} pruned",
            self.points.len()
        );
        Ok(())
    }

    /// Drop the lowest-ranked points once the store grows past its threshold.
    ///
    /// Above `3 × max_context_items` points, stable-sorts by
    /// (weight, chapter) descending and keeps `2 × max_context_items`.
    /// Returns the number of points removed.
    pub fn prune(&mut self) -> usize {
        if self.points.len() <= self.config.prune_threshold() {
            return 0;
        }
        let before = self.points.len();
        self.points.sort_by(|a, b| b.rank().cmp(&a.rank()));
        self.points.truncate(self.config.prune_target());
        before - self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OneOrMany;

    fn chapter(events: &[&str], development: OneOrMany, hooks: &[&str]) -> Chapter {
        Chapter {
            title: "The Well".into(),
            summary: "Water runs dry.".into(),
            key_events: events.iter().map(|s| s.to_string()).collect(),
            character_development: development,
            next_chapter_hooks: hooks.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn weights_follow_importance() {
        assert_eq!(Importance::Low.weight(3), 1);
        assert_eq!(Importance::Medium.weight(3), 2);
        assert_eq!(Importance::High.weight(3), 3);
        assert_eq!(Importance::Critical.weight(7), 7);
        assert_eq!(Importance::from_label("CRITICAL"), Importance::Critical);
        assert_eq!(Importance::from_label("urgent"), Importance::Medium);
    }

    #[test]
    fn event_importance_heuristic() {
        assert_eq!(Importance::of_event("A CRITICAL betrayal"), Importance::High);
        assert_eq!(Importance::of_event("An important letter"), Importance::High);
        assert_eq!(Importance::of_event("Tea is served"), Importance::Medium);
        assert_eq!(Importance::of_event("एक महत्वपूर्ण पत्र"), Importance::Medium);
    }

    #[test]
    fn update_records_points_by_kind() {
        let mut store = ContextStore::default();
        let ch = chapter(
            &["Critical discovery", "Market visit"],
            OneOrMany::from("Meera learns to trust"),
            &["Who sent the letter?"],
        );
        store.update_with_chapter(&ch, 1).unwrap();

        let points = store.points();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].kind(), PointKind::Event);
        assert_eq!(points[0].importance(), Importance::High);
        assert_eq!(points[1].importance(), Importance::Medium);
        assert_eq!(points[1].weight(), 2);
        assert_eq!(points[2].kind(), PointKind::CharacterDevelopment);
        assert_eq!(points[2].weight(), 3);
        assert_eq!(points[3].kind(), PointKind::Hook);
        assert_eq!(store.summary(1).unwrap().key_events.len(), 2);
        assert_eq!(store.latest_chapter(), 1);
    }

    #[test]
    fn development_list_yields_one_point_per_item() {
        let mut store = ContextStore::default();
        let ch = chapter(
            &[],
            OneOrMany::Many(vec!["a".into(), "b".into(), "c".into()]),
            &[],
        );
        store.update_with_chapter(&ch, 1).unwrap();
        assert_eq!(store.len(), 3);
        assert!(
            store
                .points()
                .iter()
                .all(|p| p.kind() == PointKind::CharacterDevelopment)
        );
    }

    #[test]
    fn blank_development_text_adds_nothing() {
        let mut store = ContextStore::default();
        store
            .update_with_chapter(&chapter(&[], OneOrMany::from(""), &[]), 1)
            .unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn missing_title_and_summary_get_defaults() {
        let mut store = ContextStore::default();
        let ch = Chapter::default();
        store.update_with_chapter(&ch, 2).unwrap();
        let summary = store.summary(2).unwrap();
        assert_eq!(summary.title, "Chapter 2");
        assert_eq!(summary.summary, "No summary available.");
    }

    #[test]
    fn chapter_zero_rejected_without_mutation() {
        let mut store = ContextStore::default();
        let err = store
            .update_with_chapter(&chapter(&["x"], OneOrMany::default(), &[]), 0)
            .unwrap_err();
        assert_eq!(err, ContextError::InvalidChapter(0));
        assert!(store.is_empty());
        assert!(store.summary(0).is_none());
    }

    #[test]
    fn non_advancing_chapter_rejected_without_mutation() {
        let mut store = ContextStore::default();
        store
            .update_with_chapter(&chapter(&["first"], OneOrMany::default(), &[]), 2)
            .unwrap();
        let err = store
            .update_with_chapter(&chapter(&["again"], OneOrMany::default(), &[]), 2)
            .unwrap_err();
        assert_eq!(
            err,
            ContextError::ChapterNotAdvancing {
                chapter: 2,
                latest: 2
            }
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.summary(2).unwrap().key_events, vec!["first"]);
    }

    #[test]
    fn upsert_replaces_summary() {
        let mut store = ContextStore::default();
        let summary = |t: &str| ChapterSummary {
            title: t.into(),
            summary: String::new(),
            key_events: vec![],
        };
        store.upsert_chapter_summary(3, summary("old"));
        store.upsert_chapter_summary(3, summary("new"));
        assert_eq!(store.summary(3).unwrap().title, "new");
    }

    #[test]
    fn record_rejects_chapter_zero() {
        let mut store = ContextStore::default();
        assert!(
            store
                .record("x", 0, PointKind::Event, Importance::Low)
                .is_err()
        );
    }

    #[test]
    fn no_prune_at_threshold() {
        let mut store = ContextStore::default();
        for i in 0..45 {
            store
                .record(format!("e{i}"), 1, PointKind::Event, Importance::Low)
                .unwrap();
        }
        assert_eq!(store.prune(), 0);
        assert_eq!(store.len(), 45);
    }

    #[test]
    fn prune_keeps_highest_ranked_in_stable_order() {
        let mut store = ContextStore::default();
        // 46 points: 20 low in chapter 5, 20 medium in chapter 1, 6 high in chapter 2.
        for i in 0..20 {
            store
                .record(format!("low{i}"), 5, PointKind::Event, Importance::Low)
                .unwrap();
        }
        for i in 0..20 {
            store
                .record(format!("med{i}"), 1, PointKind::Event, Importance::Medium)
                .unwrap();
        }
        for i in 0..6 {
            store
                .record(format!("high{i}"), 2, PointKind::Hook, Importance::High)
                .unwrap();
        }
        assert_eq!(store.prune(), 16);
        assert_eq!(store.len(), 30);

        let contents: Vec<&str> = store.points().iter().map(|p| p.content()).collect();
        assert_eq!(contents[0], "high0");
        assert_eq!(contents[5], "high5");
        assert_eq!(contents[6], "med0");
        assert_eq!(contents[25], "med19");
        assert_eq!(contents[26], "low0");
        assert_eq!(contents[29], "low3");
    }

    #[test]
    fn critical_weight_is_configurable() {
        let config = ContextConfig::default().with_critical_context_weight(5);
        let mut store = ContextStore::new(config).unwrap();
        store
            .record("omen", 1, PointKind::Event, Importance::Critical)
            .unwrap();
        assert_eq!(store.points()[0].weight(), 5);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = ContextConfig::default().with_max_context_items(0);
        assert!(ContextStore::new(config).is_err());
    }

    #[test]
    fn chapter_updates_keep_the_store_bounded() {
        let mut store = ContextStore::default();
        for n in 1..=5u32 {
            let events: Vec<String> = (0..10).map(|i| format!("Event {n}.{i}")).collect();
            let events: Vec<&str> = events.iter().map(String::as_str).collect();
            let development =
                OneOrMany::Many((0..3).map(|i| format!("Growth {n}.{i}")).collect());
            let ch = chapter(&events, development, &["Hook A", "Hook B"]);
            store.update_with_chapter(&ch, n).unwrap();

            assert!(store.len() <= 45, "chapter {n} left {} points", store.len());
            if n == 4 {
                // 60 points crossed the threshold and were cut back.
                assert_eq!(store.len(), 30);
            }
        }
        assert_eq!(store.len(), 45);
        assert_eq!(store.latest_chapter(), 5);
    }

    #[test]
    fn single_string_events_become_one_point() {
        let ch: Chapter = crate::story::chapters::chapter_schema()
            .parse(r#"{"content": "text", "key_events": "Hero found the letter"}"#)
            .unwrap();
        let mut store = ContextStore::default();
        store.update_with_chapter(&ch, 1).unwrap();

        let events: Vec<&str> = store
            .points()
            .iter()
            .filter(|p| p.kind() == PointKind::Event)
            .map(|p| p.content())
            .collect();
        assert_eq!(events, vec!["Hero found the letter"]);
    }

    #[test]
    fn largest_valid_item_cap_does_not_overflow() {
        let config = ContextConfig::default().with_max_context_items(usize::MAX / 3);
        let mut store = ContextStore::new(config).unwrap();
        store
            .update_with_chapter(&chapter(&["A storm"], OneOrMany::default(), &[]), 1)
            .unwrap();
        assert_eq!(store.len(), 1);
    }
}
