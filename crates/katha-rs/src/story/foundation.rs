//! Story outline and chapter stubs.
//!
//! The foundation stage runs two prompts: one for the story as a whole and
//! one for the chapter-by-chapter outline. Whatever the model answers, the
//! resulting [`StoryOutline`] holds exactly the requested number of
//! [`ChapterOutline`] stubs, numbered and filled in.

use super::{StageClient, StorySettings};
use crate::prompts::PromptStage;
use crate::schema::{FieldSpec, OneOrMany, ResponseSchema, parse_or_fallback, parse_response};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Records ────────────────────────────────────────────────────────

/// The story as a whole.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct StoryOutline {
    pub title: String,
    pub theme: String,
    pub setting: String,
    pub synopsis: String,
    pub narrative_arc: String,
    pub genre_elements: String,
    pub narrative_tone: String,
    pub social_context: String,
    pub chapters: Vec<ChapterOutline>,
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre_blend: Option<GenreBlend>,
}

/// Plan for a single chapter.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ChapterOutline {
    pub chapter_number: u32,
    pub title: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub characters_involved: Vec<String>,
    pub setting_details: String,
    pub cultural_elements: Vec<String>,
    pub genre_elements: OneOrMany,
    pub narrative_progression: String,
}

impl ChapterOutline {
    /// Stub used when the outline has no entry for `number`.
    pub fn missing(number: u32) -> Self {
        Self {
            chapter_number: number,
            title: format!("Chapter {number}"),
            summary: "No summary available.".into(),
            ..Default::default()
        }
    }

    /// Stub used to pad a short outline.
    pub fn placeholder(number: u32, settings: &StorySettings) -> Self {
        Self {
            chapter_number: number,
            title: format!("Chapter {number}"),
            summary: "To be determined".into(),
            genre_elements: OneOrMany::One(default_genre_elements(settings)),
            narrative_progression: default_progression(settings),
            ..Default::default()
        }
    }
}

/// How a multi-genre story should weave its genres together.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct GenreBlend {
    pub primary_genre: String,
    #[serde(default)]
    pub secondary_genres: Vec<String>,
    #[serde(default)]
    pub blending_strategy: String,
}

#[derive(Deserialize)]
struct ChapterStubs {
    chapters: Vec<ChapterOutline>,
}

#[derive(Deserialize)]
struct BlendAnswer {
    blending_strategy: String,
}

// ── Schemas ────────────────────────────────────────────────────────

pub fn outline_schema() -> ResponseSchema {
    ResponseSchema::new("foundation")
        .with(FieldSpec::text("title", "The title of the story").or("Untitled Story"))
        .with(FieldSpec::text("theme", "The main theme or themes of the story").or("Undefined"))
        .with(
            FieldSpec::text(
                "setting",
                "Detailed description of the setting including location, social context, and cultural elements",
            )
            .or("To be determined"),
        )
        .with(FieldSpec::text("synopsis", "A brief synopsis of the overall story").or("To be determined"))
        .with(
            FieldSpec::text(
                "narrative_arc",
                "Description of the main narrative arc with beginning, middle, and end",
            )
            .or("To be determined"),
        )
        .with(
            FieldSpec::text(
                "genre_elements",
                "Description of how the selected genres are incorporated into the story",
            )
            .or("To be determined"),
        )
        .with(FieldSpec::text("narrative_tone", "The overall tone and mood of the narrative"))
        .with(
            FieldSpec::text("social_context", "Broader social and cultural context of the story")
                .or("To be determined"),
        )
}

fn stub_schema() -> ResponseSchema {
    ResponseSchema::new("chapter_stub")
        .with(FieldSpec::integer("chapter_number", "The chapter number"))
        .with(FieldSpec::text("title", "The title of the chapter"))
        .with(
            FieldSpec::text("summary", "A summary of the main events in the chapter")
                .or("To be determined"),
        )
        .with(FieldSpec::list("key_points", "Key plot points in bullet form"))
        .with(FieldSpec::list(
            "characters_involved",
            "Characters involved in this chapter",
        ))
        .with(FieldSpec::text(
            "setting_details",
            "Specific details about the setting for this chapter",
        ))
        .with(FieldSpec::list(
            "cultural_elements",
            "Cultural elements to incorporate in this chapter",
        ))
        .with(FieldSpec::text_or_list(
            "genre_elements",
            "Specific genre elements to incorporate in this chapter",
        ))
        .with(FieldSpec::text(
            "narrative_progression",
            "How this chapter moves the story forward",
        ))
}

pub fn chapter_outline_schema() -> ResponseSchema {
    ResponseSchema::new("chapter_outline").with(
        FieldSpec::records("chapters", "Array of chapter outlines", stub_schema()).required(),
    )
}

fn blend_schema() -> ResponseSchema {
    ResponseSchema::new("genre_blend").with(
        FieldSpec::text(
            "blending_strategy",
            "Which elements of each genre to highlight and how they complement each other",
        )
        .required(),
    )
}

// ── Defaults ───────────────────────────────────────────────────────

fn default_genre_elements(settings: &StorySettings) -> String {
    format!("Incorporating elements of {}", settings.genres_text())
}

fn default_progression(settings: &StorySettings) -> String {
    format!("Moving forward with {} pace", settings.narrative_pacing)
}

/// Outline used when the foundation answer is unusable.
pub fn fallback_outline(plot_concept: &str, settings: &StorySettings) -> StoryOutline {
    StoryOutline {
        title: "Untitled Story".into(),
        theme: "Undefined".into(),
        setting: format!("Set in {}", settings.region),
        synopsis: plot_concept.to_string(),
        narrative_arc: "Beginning, middle, and end structure".into(),
        genre_elements: format!("A blend of {}", settings.genres_text()),
        narrative_tone: settings.narrative_tone.clone(),
        social_context: format!("Contemporary context of {}", settings.region),
        ..Default::default()
    }
}

/// Bring model-provided stubs to exactly `count` entries.
///
/// Extra stubs are dropped, missing ones are padded with placeholders. A stub
/// without a chapter number takes its 1-based position; missing titles,
/// genre elements and progression notes get defaults.
pub fn fit_chapter_outlines(
    mut stubs: Vec<ChapterOutline>,
    count: u32,
    settings: &StorySettings,
) -> Vec<ChapterOutline> {
    stubs.truncate(count as usize);
    for (position, stub) in (1..).zip(stubs.iter_mut()) {
        if stub.chapter_number == 0 {
            stub.chapter_number = position;
        }
        if stub.title.trim().is_empty() {
            stub.title = format!("Chapter {}", stub.chapter_number);
        }
        if stub.genre_elements.items().is_empty() {
            stub.genre_elements = OneOrMany::One(default_genre_elements(settings));
        }
        if stub.narrative_progression.trim().is_empty() {
            stub.narrative_progression = default_progression(settings);
        }
    }
    while stubs.len() < count as usize {
        let number = stubs.len() as u32 + 1;
        stubs.push(ChapterOutline::placeholder(number, settings));
    }
    stubs
}

// ── Generation ─────────────────────────────────────────────────────

/// Generate the story outline and its `chapter_count` chapter stubs.
///
/// A non-empty `title_override` replaces the generated title before the
/// chapter outline is requested.
pub async fn generate_outline(
    client: &StageClient<'_>,
    plot_concept: &str,
    title_override: Option<&str>,
    settings: &StorySettings,
    chapter_count: u32,
) -> StoryOutline {
    let schema = outline_schema();
    let vars = settings
        .prompt_vars()
        .text("plot_concept", plot_concept)
        .text("format_instructions", schema.format_instructions());
    let raw = client.request(PromptStage::Foundation, &vars).await;
    let mut outline = parse_or_fallback(&schema, raw, || fallback_outline(plot_concept, settings));

    if outline.narrative_tone.trim().is_empty() {
        outline.narrative_tone = settings.narrative_tone.clone();
    }
    if let Some(title) = title_override.map(str::trim).filter(|t| !t.is_empty()) {
        outline.title = title.to_string();
    }
    outline.genres = settings.genres.clone();
    outline.chapters.clear();
    info!("Story outline ready: \"{}\"", outline.title);

    let schema = chapter_outline_schema();
    let vars = settings
        .prompt_vars()
        .text("plot_concept", plot_concept)
        .json("story_outline", &outline)
        .text("num_chapters", chapter_count.to_string())
        .text("format_instructions", schema.format_instructions());
    let raw = client.request(PromptStage::ChapterOutline, &vars).await;
    let stubs = parse_response::<ChapterStubs>(&schema, raw)
        .map(|s| s.chapters)
        .unwrap_or_default();
    if stubs.len() != chapter_count as usize {
        warn!(
            "Chapter outline has {} stub(s), expected {chapter_count}; fitting",
            stubs.len()
        );
    }
    outline.chapters = fit_chapter_outlines(stubs, chapter_count, settings);
    outline
}

/// Guidance for blending several genres.
///
/// A single genre needs no model call. A plain-text answer is accepted as
/// the strategy itself.
pub async fn blend_genres(client: &StageClient<'_>, settings: &StorySettings) -> GenreBlend {
    let primary = settings
        .genres
        .first()
        .cloned()
        .unwrap_or_else(|| "Drama".to_string());
    if settings.genres.len() <= 1 {
        return GenreBlend {
            primary_genre: primary,
            ..Default::default()
        };
    }
    let secondary: Vec<String> = settings.genres.iter().skip(1).cloned().collect();

    let schema = blend_schema();
    let vars = settings
        .prompt_vars()
        .text("format_instructions", schema.format_instructions());
    let blending_strategy = match client.request(PromptStage::GenreBlend, &vars).await {
        Ok(text) => match schema.parse::<BlendAnswer>(&text) {
            Ok(answer) => answer.blending_strategy,
            Err(_) => text.trim().to_string(),
        },
        Err(e) => {
            warn!("genre_blend generation failed, using default strategy: {e}");
            format!(
                "Lead with {primary} and weave in elements of {}.",
                secondary.join(", ")
            )
        }
    };

    GenreBlend {
        primary_genre: primary,
        secondary_genres: secondary,
        blending_strategy,
    }
}
