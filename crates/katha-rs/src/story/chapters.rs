//! Chapter generation.

use super::characters::{Character, SupportingCharacter};
use super::foundation::{ChapterOutline, StoryOutline};
use super::{StageClient, StorySettings};
use crate::context::ContextBundle;
use crate::genre::{self, GenreEmphasis};
use crate::prompts::PromptStage;
use crate::schema::{FieldSpec, OneOrMany, ResponseSchema, parse_response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Content of a chapter whose generation failed.
pub const FALLBACK_CONTENT: &str = "Error generating chapter content.";

/// Content of a parsed chapter answer that left `content` out.
pub const MISSING_CONTENT: &str = "Chapter content not available.";

pub const MISSING_SUMMARY: &str = "Summary not available.";

/// A generated chapter.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Chapter {
    pub chapter_number: u32,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub key_events: Vec<String>,
    pub character_development: OneOrMany,
    pub cultural_elements_used: Vec<String>,
    pub genre_elements_used: Vec<String>,
    pub next_chapter_hooks: Vec<String>,
}

impl Chapter {
    /// Whether this is the record substituted for a failed generation.
    pub fn is_fallback(&self) -> bool {
        self.content == FALLBACK_CONTENT
    }
}

pub fn chapter_schema() -> ResponseSchema {
    ResponseSchema::new("chapter")
        .with(FieldSpec::text("title", "Chapter title"))
        .with(FieldSpec::text("content", "Full chapter content").or(MISSING_CONTENT))
        .with(FieldSpec::text("summary", "Brief summary of the chapter").or(MISSING_SUMMARY))
        .with(FieldSpec::list("key_events", "List of key events in the chapter"))
        .with(FieldSpec::text_or_list(
            "character_development",
            "How characters developed in this chapter",
        ))
        .with(FieldSpec::list(
            "cultural_elements_used",
            "Cultural elements incorporated in this chapter",
        ))
        .with(FieldSpec::list(
            "genre_elements_used",
            "Genre-specific elements used in this chapter",
        ))
        .with(FieldSpec::list(
            "next_chapter_hooks",
            "Elements that set up the next chapter",
        ))
}

/// Stub for chapter `number`, matched on `chapter_number`.
pub fn stub_for(outline: &StoryOutline, number: u32) -> ChapterOutline {
    outline
        .chapters
        .iter()
        .find(|stub| stub.chapter_number == number)
        .cloned()
        .unwrap_or_else(|| ChapterOutline::missing(number))
}

/// Chapter recorded when generation fails.
pub fn fallback_chapter(stub: &ChapterOutline, number: u32, total: u32, genres: &[String]) -> Chapter {
    Chapter {
        chapter_number: number,
        title: non_empty_or(&stub.title, || format!("Chapter {number}")),
        content: FALLBACK_CONTENT.into(),
        summary: non_empty_or(&stub.summary, || MISSING_SUMMARY.into()),
        key_events: Vec::new(),
        character_development: OneOrMany::One("No character development tracked.".into()),
        cultural_elements_used: Vec::new(),
        genre_elements_used: genre::default_genre_elements(number, total, genres),
        next_chapter_hooks: Vec::new(),
    }
}

fn non_empty_or(value: &str, default: impl FnOnce() -> String) -> String {
    if value.trim().is_empty() {
        default()
    } else {
        value.to_string()
    }
}

/// Everything the chapter prompt is built from.
#[derive(Clone, Copy)]
pub struct ChapterRequest<'a> {
    pub number: u32,
    pub total: u32,
    pub outline: &'a StoryOutline,
    pub main_characters: &'a [Character],
    pub supporting_characters: &'a [SupportingCharacter],
    pub context: &'a ContextBundle,
    pub emphasis: &'a GenreEmphasis,
    pub settings: &'a StorySettings,
}

/// Generate chapter `request.number`. Never fails: an answer carrying no
/// JSON object yields [`fallback_chapter`], missing fields are defaulted.
///
/// A parsed chapter gets its number set, an empty title replaced with the
/// stub title, and a trajectory hint for the next chapter appended to its
/// hooks.
pub async fn generate_chapter(client: &StageClient<'_>, request: ChapterRequest<'_>) -> Chapter {
    let ChapterRequest {
        number,
        total,
        outline,
        settings,
        ..
    } = request;
    let stub = stub_for(outline, number);
    let schema = chapter_schema();

    let mut vars = settings
        .prompt_vars()
        .text("chapter_num", number.to_string())
        .json("chapter_outline", &stub)
        .json("story_outline", outline)
        .json("main_characters", request.main_characters)
        .json("supporting_characters", request.supporting_characters)
        .json("genre_guidance", request.emphasis)
        .text("format_instructions", schema.format_instructions());
    vars = if request.context.is_empty() {
        vars.text("previous_context", "This is the first chapter.")
    } else {
        vars.json("previous_context", request.context)
    };
    debug!(
        "Chapter {number}: {} previous summaries, {} events, {} hooks in context",
        request.context.previous_chapters.len(),
        request.context.key_events.len(),
        request.context.open_hooks.len()
    );

    let raw = client.request(PromptStage::ChapterGeneration, &vars).await;
    let chapter = match parse_response::<Chapter>(&schema, raw) {
        Some(mut chapter) => {
            chapter.chapter_number = number;
            if chapter.title.trim().is_empty() {
                chapter.title = non_empty_or(&stub.title, || format!("Chapter {number}"));
            }
            chapter
                .next_chapter_hooks
                .push(genre::trajectory(number + 1, total, &settings.genres));
            chapter
        }
        None => fallback_chapter(&stub, number, total, &settings.genres),
    };
    info!(
        "Chapter {number}/{total} ready: {:?} ({} chars)",
        chapter.title,
        chapter.content.len()
    );
    chapter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStore;
    use crate::generator::FnGenerator;
    use crate::prompts::PromptTemplates;
    use crate::story::testing::settings;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn outline() -> StoryOutline {
        StoryOutline {
            title: "The Monsoon House".into(),
            chapters: vec![
                ChapterOutline {
                    chapter_number: 1,
                    title: "Rain".into(),
                    summary: "The rains arrive.".into(),
                    ..Default::default()
                },
                ChapterOutline {
                    chapter_number: 2,
                    title: "Flood".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn stub_lookup_by_number() {
        let outline = outline();
        assert_eq!(stub_for(&outline, 2).title, "Flood");
        assert_eq!(stub_for(&outline, 9).chapter_number, 9);
    }

    #[test]
    fn fallback_uses_stub_then_defaults() {
        let genres = vec!["Romance".to_string()];
        let chapter = fallback_chapter(&stub_for(&outline(), 2), 2, 2, &genres);
        assert_eq!(chapter.title, "Flood");
        assert_eq!(chapter.summary, "Summary not available.");
        assert_eq!(chapter.content, "Error generating chapter content.");
        assert_eq!(chapter.genre_elements_used, vec!["Romantic resolution or commitment (Romance)"]);
        assert_eq!(
            chapter.character_development.items(),
            vec!["No character development tracked."]
        );
    }

    #[tokio::test]
    async fn parsed_chapter_gets_number_and_trajectory() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&prompts);
        let generator = FnGenerator::new(move |_, prompt| {
            seen.lock().unwrap().push(prompt);
            async {
                Ok(r#"{"content": "It rained.", "summary": "Rain.",
                       "key_events": "The roof leaks", "character_development": "Meera grows bold"}"#
                    .to_string())
            }
        });
        let templates = PromptTemplates::new();
        let client = StageClient::new(&generator, &templates, Duration::from_secs(1));
        let s = settings(&["Romance", "Mystery"]);
        let outline = outline();
        let emphasis = GenreEmphasis::for_chapter(1, 2, &s.genres).unwrap();
        let context = ContextBundle::default();

        let chapter = generate_chapter(
            &client,
            ChapterRequest {
                number: 1,
                total: 2,
                outline: &outline,
                main_characters: &[],
                supporting_characters: &[],
                context: &context,
                emphasis: &emphasis,
                settings: &s,
            },
        )
        .await;

        assert_eq!(chapter.chapter_number, 1);
        assert_eq!(chapter.title, "Rain");
        assert_eq!(chapter.key_events, vec!["The roof leaks"]);
        assert_eq!(chapter.character_development, OneOrMany::One("Meera grows bold".into()));
        assert_eq!(
            chapter.next_chapter_hooks.last().map(String::as_str),
            Some(genre::trajectory(2, 2, &s.genres).as_str())
        );
        let prompt = prompts.lock().unwrap().remove(0);
        assert!(prompt.contains("This is the first chapter."));
        assert!(prompt.contains("Write Chapter 1"));
    }

    #[tokio::test]
    async fn not_json_yields_fallback_chapter() {
        let generator = FnGenerator::new(|_, _| async { Ok("not json".to_string()) });
        let templates = PromptTemplates::new();
        let client = StageClient::new(&generator, &templates, Duration::from_secs(1));
        let s = settings(&["Drama"]);
        let outline = outline();
        let emphasis = GenreEmphasis::for_chapter(2, 2, &s.genres).unwrap();
        let context = ContextBundle::default();

        let chapter = generate_chapter(
            &client,
            ChapterRequest {
                number: 2,
                total: 2,
                outline: &outline,
                main_characters: &[],
                supporting_characters: &[],
                context: &context,
                emphasis: &emphasis,
                settings: &s,
            },
        )
        .await;

        assert_eq!(chapter.chapter_number, 2);
        assert!(chapter.is_fallback());
        assert!(chapter.next_chapter_hooks.is_empty());
    }

    async fn chapter_from(answer: &'static str, number: u32) -> Chapter {
        let generator = FnGenerator::new(move |_, _| async move { Ok(answer.to_string()) });
        let templates = PromptTemplates::new();
        let client = StageClient::new(&generator, &templates, Duration::from_secs(1));
        let s = settings(&["Mystery"]);
        let outline = outline();
        let emphasis = GenreEmphasis::for_chapter(number, 2, &s.genres).unwrap();
        let context = ContextBundle::default();
        generate_chapter(
            &client,
            ChapterRequest {
                number,
                total: 2,
                outline: &outline,
                main_characters: &[],
                supporting_characters: &[],
                context: &context,
                emphasis: &emphasis,
                settings: &s,
            },
        )
        .await
    }

    #[tokio::test]
    async fn answer_without_content_keeps_its_continuity() {
        let chapter = chapter_from(
            r#"{"title": "Rain", "summary": "S1", "key_events": ["An important letter"],
                "next_chapter_hooks": ["Who?"]}"#,
            1,
        )
        .await;
        assert!(!chapter.is_fallback());
        assert_eq!(chapter.content, MISSING_CONTENT);
        assert_eq!(chapter.summary, "S1");
        assert_eq!(chapter.key_events, vec!["An important letter"]);

        let mut store = ContextStore::default();
        store.update_with_chapter(&chapter, 1).unwrap();
        let bundle = store.context_for_chapter(2).unwrap();
        assert_eq!(bundle.previous_chapters[0].summary, "S1");
        assert_eq!(bundle.key_events, vec!["An important letter"]);
        assert!(bundle.open_hooks.iter().any(|h| h == "Who?"));
    }

    #[tokio::test]
    async fn missing_summary_gets_placeholder() {
        let chapter = chapter_from(r#"{"content": "text"}"#, 2).await;
        assert!(!chapter.is_fallback());
        assert_eq!(chapter.content, "text");
        assert_eq!(chapter.summary, MISSING_SUMMARY);
        assert_eq!(chapter.title, "Flood");
        assert!(chapter.key_events.is_empty());
    }
}
