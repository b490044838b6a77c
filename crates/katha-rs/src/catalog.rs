//! Genre, tone, pacing and region catalogs, and model-backed suggestions of
//! which of them suit a plot concept.

use crate::prompts::{PromptStage, PromptVars};
use crate::schema::extract_json_value;
use crate::story::StageClient;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

// ── Catalogs ───────────────────────────────────────────────────────

pub const GENRES: [&str; 40] = [
    "Drama",
    "Romance",
    "Adventure",
    "Mystery",
    "Historical Fiction",
    "Fantasy",
    "Mythology",
    "Folklore",
    "Family Saga",
    "Coming of Age",
    "Social Commentary",
    "Political",
    "Comedy",
    "Thriller",
    "Magical Realism",
    "Epic",
    "Devotional",
    "Philosophical",
    "Satire",
    "Fable",
    "Horror",
    "Supernatural",
    "Science Fiction",
    "Dystopian",
    "Utopian",
    "Action",
    "War",
    "Inspirational",
    "Biographical",
    "Psychological",
    "Crime",
    "Spiritual",
    "Travelogue",
    "Epistolary",
    "Poetic Narrative",
    "Rural",
    "Urban",
    "Diaspora",
    "Revolutionary",
    "Postcolonial",
];

pub const TONES: [&str; 8] = [
    "Dramatic",
    "Humorous",
    "Suspenseful",
    "Inspirational",
    "Mysterious",
    "Emotional",
    "Philosophical",
    "Introspective",
];

pub const PACING: [&str; 6] = [
    "Slow-burning",
    "Fast-paced",
    "Episodic",
    "Continuous",
    "Non-linear",
    "Cyclical",
];

pub const REGIONS: [&str; 5] = [
    "North India",
    "South India",
    "East India",
    "West India",
    "Central India",
];

pub const DEFAULT_REGION: &str = "North India";

/// Resolve user input such as `"south"` or `"South India"` to a catalog
/// region, defaulting to [`DEFAULT_REGION`].
pub fn resolve_region(input: &str) -> &'static str {
    let wanted = input.trim().to_lowercase();
    let wanted = wanted.strip_suffix(" india").unwrap_or(&wanted).trim();
    REGIONS
        .iter()
        .find(|region| {
            region
                .split_whitespace()
                .next()
                .is_some_and(|w| w.eq_ignore_ascii_case(wanted))
        })
        .copied()
        .unwrap_or(DEFAULT_REGION)
}

/// Exact catalog entry for `name`, ignoring case and surrounding space.
pub fn canonical<'a>(catalog: &[&'a str], name: &str) -> Option<&'a str> {
    let name = name.trim();
    catalog
        .iter()
        .find(|entry| entry.eq_ignore_ascii_case(name))
        .copied()
}

// ── Suggestions ────────────────────────────────────────────────────

/// One suggested catalog entry and why it fits.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Suggestion {
    /// Must match a catalog entry exactly.
    pub name: String,
    /// One or two sentences.
    pub reason: String,
}

impl Suggestion {
    fn new(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Suggested genres, tones and pacing for a plot concept.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct StoryElementSuggestions {
    pub suggested_genres: Vec<Suggestion>,
    pub suggested_tones: Vec<Suggestion>,
    pub suggested_pacing: Vec<Suggestion>,
}

impl Default for StoryElementSuggestions {
    fn default() -> Self {
        Self {
            suggested_genres: vec![
                Suggestion::new("Drama", "A versatile genre that works well for most stories."),
                Suggestion::new(
                    "Family Saga",
                    "Explores relationships and dynamics within families.",
                ),
                Suggestion::new(
                    "Social Commentary",
                    "Examines societal issues and human experiences.",
                ),
            ],
            suggested_tones: vec![
                Suggestion::new("Dramatic", "Creates emotional impact and depth."),
                Suggestion::new(
                    "Emotional",
                    "Connects with audiences through feelings and experiences.",
                ),
                Suggestion::new("Philosophical", "Explores deeper meanings and questions."),
            ],
            suggested_pacing: vec![
                Suggestion::new(
                    "Slow-burning",
                    "Allows for character development and building tension.",
                ),
                Suggestion::new("Episodic", "Presents story in distinct segments or chapters."),
                Suggestion::new("Continuous", "Maintains a steady flow of narrative events."),
            ],
        }
    }
}

/// Concepts shorter than this get the default suggestions without a call.
pub const MIN_CONCEPT_LEN: usize = 10;

/// Ask the model which catalog entries suit `plot_concept`.
///
/// Names outside the catalogs are dropped; a category left empty gets its
/// first catalog entry. An unusable answer yields the defaults.
pub async fn suggest_story_elements(
    client: &StageClient<'_>,
    plot_concept: &str,
) -> StoryElementSuggestions {
    if plot_concept.trim().chars().count() < MIN_CONCEPT_LEN {
        return StoryElementSuggestions::default();
    }
    let schema = serde_json::to_string_pretty(&crate::json_schema_for::<StoryElementSuggestions>())
        .unwrap_or_default();
    let vars = PromptVars::new()
        .text("available_genres", GENRES.join(", "))
        .text("available_tones", TONES.join(", "))
        .text("available_pacing", PACING.join(", "))
        .text("plot_concept", plot_concept)
        .text("format_instructions", schema);

    let parsed = match client.request(PromptStage::ElementSuggestions, &vars).await {
        Ok(text) => extract_json_value(&text).map_err(|e| e.to_string()),
        Err(e) => Err(e),
    };
    match parsed {
        Ok(value) => {
            let suggestions = validate_suggestions(&value);
            info!(
                "Suggested {} genre(s), {} tone(s), {} pacing style(s)",
                suggestions.suggested_genres.len(),
                suggestions.suggested_tones.len(),
                suggestions.suggested_pacing.len()
            );
            suggestions
        }
        Err(e) => {
            warn!("element_suggestions unusable, using defaults: {e}");
            StoryElementSuggestions::default()
        }
    }
}

/// Keep only entries naming a catalog item.
pub fn validate_suggestions(value: &Value) -> StoryElementSuggestions {
    StoryElementSuggestions {
        suggested_genres: valid_entries(value.get("suggested_genres"), &GENRES),
        suggested_tones: valid_entries(value.get("suggested_tones"), &TONES),
        suggested_pacing: valid_entries(value.get("suggested_pacing"), &PACING),
    }
}

fn valid_entries(entries: Option<&Value>, catalog: &[&str]) -> Vec<Suggestion> {
    let valid: Vec<Suggestion> = entries
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let name = canonical(catalog, entry.get("name")?.as_str()?)?;
            let reason = entry
                .get("reason")
                .and_then(Value::as_str)
                .filter(|r| !r.trim().is_empty())
                .unwrap_or("Good match for your story concept.");
            Some(Suggestion::new(name, reason))
        })
        .collect();
    if valid.is_empty() {
        vec![Suggestion::new(catalog[0], "Default option.")]
    } else {
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FnGenerator;
    use crate::prompts::PromptTemplates;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn regions_resolve_with_default() {
        assert_eq!(resolve_region("south"), "South India");
        assert_eq!(resolve_region(" Central India "), "Central India");
        assert_eq!(resolve_region("Atlantis"), DEFAULT_REGION);
    }

    #[test]
    fn suggestions_are_filtered_against_catalogs() {
        let value = json!({
            "suggested_genres": [
                {"name": "mystery", "reason": "Hidden letters."},
                {"name": "Space Opera", "reason": "Not in the list."},
                "Drama",
                {"name": "Family Saga"}
            ],
            "suggested_tones": [{"name": "Whimsical"}],
        });
        let s = validate_suggestions(&value);
        assert_eq!(
            s.suggested_genres,
            vec![
                Suggestion::new("Mystery", "Hidden letters."),
                Suggestion::new("Family Saga", "Good match for your story concept."),
            ]
        );
        assert_eq!(s.suggested_tones, vec![Suggestion::new("Dramatic", "Default option.")]);
        assert_eq!(s.suggested_pacing, vec![Suggestion::new("Slow-burning", "Default option.")]);
    }

    #[tokio::test]
    async fn short_concept_skips_the_model() {
        let generator = FnGenerator::new(|_, _| async { Err("should not be called".to_string()) });
        let templates = PromptTemplates::new();
        let client = StageClient::new(&generator, &templates, Duration::from_secs(1));
        let s = suggest_story_elements(&client, "a cat").await;
        assert_eq!(s, StoryElementSuggestions::default());
        assert_eq!(client.usage().calls(), 0);
    }

    #[tokio::test]
    async fn prompt_lists_catalogs_and_schema() {
        let generator = FnGenerator::new(|_, prompt| async move {
            assert!(prompt.contains("Magical Realism, Epic"));
            assert!(prompt.contains("\"suggested_pacing\""));
            Ok(r#"{"suggested_genres": [{"name": "Epic", "reason": "Scale."}]}"#.to_string())
        });
        let templates = PromptTemplates::new();
        let client = StageClient::new(&generator, &templates, Duration::from_secs(1));
        let s = suggest_story_elements(&client, "Two brothers split a river kingdom").await;
        assert_eq!(s.suggested_genres[0].name, "Epic");
        assert_eq!(s.suggested_tones[0].reason, "Default option.");
    }
}
