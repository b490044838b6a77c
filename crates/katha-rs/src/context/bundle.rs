//! Retrieval: the context handed to the prompt for chapter `n`.

use super::store::{ChapterSummary, ContextPoint, ContextStore, PointKind};
use crate::error::ContextError;
use serde::{Deserialize, Serialize};

/// Ranked context for generating one chapter.
///
/// Serialized as-is into the chapter prompt.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextBundle {
    pub previous_chapters: Vec<ChapterSummary>,
    pub key_events: Vec<String>,
    pub character_developments: Vec<String>,
    pub open_hooks: Vec<String>,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.previous_chapters.is_empty()
            && self.key_events.is_empty()
            && self.character_developments.is_empty()
            && self.open_hooks.is_empty()
    }
}

impl ContextStore {
    /// Build the context bundle for chapter `chapter`.
    ///
    /// Chapter 1 always gets an empty bundle. For later chapters: summaries
    /// of chapters `1..chapter` in order, and points from earlier chapters
    /// ranked by (weight, chapter) descending, split by kind and capped at
    /// `max_context_items` each. Read-only.
    pub fn context_for_chapter(&self, chapter: u32) -> Result<ContextBundle, ContextError> {
        if chapter == 0 {
            return Err(ContextError::InvalidChapter(chapter));
        }
        if chapter == 1 {
            return Ok(ContextBundle::default());
        }

        let previous_chapters = self
            .summaries()
            .range(1..chapter)
            .map(|(_, s)| s.clone())
            .collect();

        let mut relevant: Vec<&ContextPoint> = self
            .points()
            .iter()
            .filter(|p| p.chapter() < chapter)
            .collect();
        relevant.sort_by(|a, b| b.rank().cmp(&a.rank()));

        let cap = self.config().max_context_items;
        let of_kind = |kind: PointKind| -> Vec<String> {
            relevant
                .iter()
                .filter(|p| p.kind() == kind)
                .take(cap)
                .map(|p| p.content().to_string())
                .collect()
        };

        Ok(ContextBundle {
            previous_chapters,
            key_events: of_kind(PointKind::Event),
            character_developments: of_kind(PointKind::CharacterDevelopment),
            open_hooks: of_kind(PointKind::Hook),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::context::Importance;
    use crate::schema::OneOrMany;
    use crate::story::Chapter;

    fn chapter(title: &str, events: &[&str], hooks: &[&str]) -> Chapter {
        Chapter {
            title: title.into(),
            summary: format!("{title} happens."),
            key_events: events.iter().map(|s| s.to_string()).collect(),
            next_chapter_hooks: hooks.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn chapter_one_is_always_empty() {
        let mut store = ContextStore::default();
        store
            .record("stray", 1, PointKind::Event, Importance::High)
            .unwrap();
        let bundle = store.context_for_chapter(1).unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn chapter_zero_is_an_error() {
        let store = ContextStore::default();
        assert_eq!(
            store.context_for_chapter(0),
            Err(ContextError::InvalidChapter(0))
        );
    }

    #[test]
    fn only_earlier_chapters_are_visible() {
        let mut store = ContextStore::default();
        store
            .update_with_chapter(&chapter("One", &["e1"], &["h1"]), 1)
            .unwrap();
        store
            .update_with_chapter(&chapter("Two", &["e2"], &["h2"]), 2)
            .unwrap();
        store
            .update_with_chapter(&chapter("Three", &["e3"], &[]), 3)
            .unwrap();

        let bundle = store.context_for_chapter(3).unwrap();
        let titles: Vec<&str> = bundle
            .previous_chapters
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles, vec!["One", "Two"]);
        // Same weight, so the later chapter ranks first.
        assert_eq!(bundle.key_events, vec!["e2", "e1"]);
        assert_eq!(bundle.open_hooks, vec!["h2", "h1"]);
        assert!(bundle.character_developments.is_empty());
    }

    #[test]
    fn heavier_points_rank_first() {
        let mut store = ContextStore::default();
        let ch1 = chapter("One", &["An important vow"], &[]);
        let ch2 = chapter("Two", &["A quiet walk"], &[]);
        store.update_with_chapter(&ch1, 1).unwrap();
        store.update_with_chapter(&ch2, 2).unwrap();
        let bundle = store.context_for_chapter(3).unwrap();
        assert_eq!(bundle.key_events, vec!["An important vow", "A quiet walk"]);
    }

    #[test]
    fn lists_are_capped() {
        let config = ContextConfig::default().with_max_context_items(2);
        let mut store = ContextStore::new(config).unwrap();
        let ch = Chapter {
            key_events: vec!["a".into(), "b".into(), "c".into()],
            character_development: OneOrMany::Many(vec!["d1".into(), "d2".into(), "d3".into()]),
            ..Default::default()
        };
        store.update_with_chapter(&ch, 1).unwrap();
        let bundle = store.context_for_chapter(2).unwrap();
        assert_eq!(bundle.key_events, vec!["a", "b"]);
        assert_eq!(bundle.character_developments, vec!["d1", "d2"]);
    }

    #[test]
    fn missing_summaries_are_skipped() {
        let mut store = ContextStore::default();
        store
            .update_with_chapter(&chapter("Three", &[], &[]), 3)
            .unwrap();
        let bundle = store.context_for_chapter(5).unwrap();
        assert_eq!(bundle.previous_chapters.len(), 1);
        assert_eq!(bundle.previous_chapters[0].title, "Three");
    }

    #[test]
    fn retrieval_does_not_mutate() {
        let mut store = ContextStore::default();
        for i in 0..10 {
            store
                .record(format!("p{i}"), 1, PointKind::Event, Importance::Low)
                .unwrap();
        }
        let before: Vec<String> = store.points().iter().map(|p| p.content().into()).collect();
        let first = store.context_for_chapter(4).unwrap();
        let second = store.context_for_chapter(4).unwrap();
        let after: Vec<String> = store.points().iter().map(|p| p.content().into()).collect();
        assert_eq!(first, second);
        assert_eq!(before, after);
    }

    #[test]
    fn serializes_with_expected_keys() {
        let json = serde_json::to_value(ContextBundle::default()).unwrap();
        for key in [
            "previous_chapters",
            "key_events",
            "character_developments",
            "open_hooks",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
