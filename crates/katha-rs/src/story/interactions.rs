//! Interactive branching: decision points within a chapter and the story
//! branches that follow each choice.
//!
//! An [`InteractiveSession`] keeps the story context the branch prompts need
//! and a history of which choice was taken at each decision point, with the
//! genre emphasis that choice carried. Branches for every choice of a
//! decision point can be pre-generated concurrently with
//! [`InteractiveSession::generate_branches`]; only
//! [`InteractiveSession::generate_branch`] records a decision.

use super::chapters::Chapter;
use super::characters::Character;
use super::foundation::StoryOutline;
use super::{StageClient, StorySettings};
use crate::prompts::PromptStage;
use crate::schema::{FieldSpec, ResponseSchema, parse_response};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

// ── Records ────────────────────────────────────────────────────────

/// One option at a decision point.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Choice {
    pub choice_id: String,
    pub description: String,
    pub immediate_outcome: String,
    pub genre_emphasis: String,
}

/// A moment in a chapter where the reader picks how the story continues.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DecisionPoint {
    pub point_id: String,
    pub description: String,
    pub context: String,
    pub choices: Vec<Choice>,
    pub genre_impacts: String,
}

impl DecisionPoint {
    pub fn choice(&self, choice_id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.choice_id == choice_id)
    }
}

/// The continuation written for one choice.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Branch {
    pub choice_id: String,
    pub decision_point_id: String,
    pub title: String,
    pub content: String,
    pub consequences: String,
    pub follow_up_hooks: Vec<String>,
    pub character_impacts: String,
    pub cultural_elements: Vec<String>,
    pub genre_elements: Vec<String>,
    pub genre_shift: String,
    pub narrative_tone_progression: String,
}

/// The choice taken at a decision point.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GenreDecision {
    pub choice_id: String,
    pub genre_emphasis: String,
    pub genre_shift: String,
}

#[derive(Deserialize)]
struct DecisionPoints {
    decision_points: Vec<DecisionPoint>,
}

// ── Schemas ────────────────────────────────────────────────────────

fn choice_schema() -> ResponseSchema {
    ResponseSchema::new("choice")
        .with(FieldSpec::text("choice_id", "Unique identifier for this choice"))
        .with(FieldSpec::text("description", "Description of the choice"))
        .with(FieldSpec::text(
            "immediate_outcome",
            "Immediate consequence of this choice",
        ))
        .with(FieldSpec::text(
            "genre_emphasis",
            "Which genre(s) this choice emphasizes",
        ))
}

fn decision_point_schema() -> ResponseSchema {
    ResponseSchema::new("decision_point")
        .with(FieldSpec::text("point_id", "Unique identifier for this decision point"))
        .with(FieldSpec::text(
            "description",
            "Description of the decision moment",
        ))
        .with(FieldSpec::text("context", "Narrative context of the decision"))
        .with(FieldSpec::records(
            "choices",
            "Two or three choices available at this point",
            choice_schema(),
        ))
        .with(FieldSpec::text(
            "genre_impacts",
            "How this decision could affect each genre",
        ))
}

pub fn decision_points_schema() -> ResponseSchema {
    ResponseSchema::new("decision_points").with(
        FieldSpec::records(
            "decision_points",
            "Array of decision points with choices",
            decision_point_schema(),
        )
        .required(),
    )
}

pub fn branch_schema() -> ResponseSchema {
    ResponseSchema::new("branch")
        .with(FieldSpec::text("title", "Title for this story branch"))
        .with(
            FieldSpec::text("content", "Full content of the story branch")
                .or("Branch content not available."),
        )
        .with(
            FieldSpec::text("consequences", "Major consequences of the choice")
                .or("Consequences to be determined."),
        )
        .with(FieldSpec::list(
            "follow_up_hooks",
            "Potential story hooks for future development",
        ))
        .with(
            FieldSpec::text("character_impacts", "How characters are affected by this choice")
                .or("Character impacts to be determined."),
        )
        .with(FieldSpec::list(
            "cultural_elements",
            "Cultural elements featured in this branch",
        ))
        .with(FieldSpec::list(
            "genre_elements",
            "Genre-specific elements in this branch",
        ))
        .with(FieldSpec::text(
            "genre_shift",
            "How this branch shifts the genre balance",
        ))
        .with(FieldSpec::text(
            "narrative_tone_progression",
            "How the narrative tone develops in this branch",
        ))
}

// ── Session ────────────────────────────────────────────────────────

/// Branching state for one story.
pub struct InteractiveSession {
    outline: StoryOutline,
    main_characters: Vec<Character>,
    settings: StorySettings,
    history: BTreeMap<String, GenreDecision>,
}

impl InteractiveSession {
    pub fn new(
        outline: StoryOutline,
        main_characters: Vec<Character>,
        settings: StorySettings,
    ) -> Self {
        Self {
            outline,
            main_characters,
            settings,
            history: BTreeMap::new(),
        }
    }

    /// Decisions taken so far, keyed by decision point id.
    pub fn history(&self) -> &BTreeMap<String, GenreDecision> {
        &self.history
    }

    fn total_chapters(&self) -> u32 {
        self.outline.chapters.len() as u32
    }

    /// Generate `count` decision points for `chapter`.
    ///
    /// Missing ids, genre impacts and choice emphasis are filled in. An
    /// unusable answer yields a single two-choice decision point.
    pub async fn generate_decision_points(
        &self,
        client: &StageClient<'_>,
        chapter: &Chapter,
        count: u32,
    ) -> Vec<DecisionPoint> {
        let n = chapter.chapter_number;
        let genres = &self.settings.genres;
        let schema = decision_points_schema();
        let vars = self
            .settings
            .prompt_vars()
            .text("num_decisions", count.to_string())
            .json("chapter_content", chapter)
            .text("format_instructions", schema.format_instructions());
        let raw = client.request(PromptStage::DecisionPoints, &vars).await;

        let mut points = parse_response::<DecisionPoints>(&schema, raw)
            .map(|p| p.decision_points)
            .unwrap_or_default();
        if points.is_empty() {
            warn!("No decision points for chapter {n}, using fallback");
            return vec![fallback_decision_point(n, self.total_chapters(), genres)];
        }

        for (j, point) in (1..).zip(points.iter_mut()) {
            if point.point_id.trim().is_empty() {
                point.point_id = format!("dp_{n}_{j}");
            }
            if point.genre_impacts.trim().is_empty() {
                point.genre_impacts = genre_impacts(n, self.total_chapters(), genres);
            }
            if point.choices.is_empty() {
                point.choices = fallback_choices(n, j, genres);
            }
            for (k, choice) in (1..).zip(point.choices.iter_mut()) {
                if choice.choice_id.trim().is_empty() {
                    choice.choice_id = format!("c_{n}_{j}_{k}");
                }
                if choice.genre_emphasis.trim().is_empty() {
                    choice.genre_emphasis = choice_genre_emphasis(choice, n, genres);
                }
            }
        }
        info!("{} decision point(s) ready for chapter {n}", points.len());
        points
    }

    /// Generate the branch for `choice_id` and record the decision.
    ///
    /// Fails only when `choice_id` is not a choice of `point`; an unusable
    /// answer yields a fallback branch.
    pub async fn generate_branch(
        &mut self,
        client: &StageClient<'_>,
        chapter: &Chapter,
        point: &DecisionPoint,
        choice_id: &str,
    ) -> Result<Branch, String> {
        let choice = point.choice(choice_id).ok_or_else(|| {
            format!(
                "choice {choice_id} not found in decision point {}",
                point.point_id
            )
        })?;
        let (branch, decision) = self.branch_for(client, chapter, point, choice).await;
        self.history.insert(point.point_id.clone(), decision);
        Ok(branch)
    }

    /// Generate branches for every choice of `point` concurrently, without
    /// recording a decision.
    pub async fn generate_branches(
        &self,
        client: &StageClient<'_>,
        chapter: &Chapter,
        point: &DecisionPoint,
    ) -> Vec<Branch> {
        let branches = point
            .choices
            .iter()
            .map(|choice| self.branch_for(client, chapter, point, choice));
        join_all(branches)
            .await
            .into_iter()
            .map(|(branch, _)| branch)
            .collect()
    }

    async fn branch_for(
        &self,
        client: &StageClient<'_>,
        chapter: &Chapter,
        point: &DecisionPoint,
        choice: &Choice,
    ) -> (Branch, GenreDecision) {
        let genres = &self.settings.genres;
        let emphasis = if choice.genre_emphasis.trim().is_empty() {
            self.settings.genres_text()
        } else {
            choice.genre_emphasis.clone()
        };
        let schema = branch_schema();
        let vars = self
            .settings
            .prompt_vars()
            .json("chapter_content", chapter)
            .json("decision_point", point)
            .json("selected_choice", choice)
            .json("story_outline", &self.outline)
            .json("main_characters", &self.main_characters)
            .text("genre_emphasis", emphasis.as_str())
            .text("format_instructions", schema.format_instructions());
        let raw = client.request(PromptStage::BranchGeneration, &vars).await;

        match parse_response::<Branch>(&schema, raw) {
            Some(mut branch) => {
                branch.choice_id = choice.choice_id.clone();
                branch.decision_point_id = point.point_id.clone();
                if branch.title.trim().is_empty() {
                    branch.title = format!("Branch from choice {}", choice.choice_id);
                }
                if branch.genre_elements.is_empty() {
                    branch.genre_elements = derive_genre_elements(&choice.genre_emphasis, genres);
                }
                let genre_shift = if branch.genre_shift.trim().is_empty() {
                    "No significant genre shift".to_string()
                } else {
                    branch.genre_shift.clone()
                };
                let decision = GenreDecision {
                    choice_id: choice.choice_id.clone(),
                    genre_emphasis: emphasis,
                    genre_shift,
                };
                (branch, decision)
            }
            None => {
                let branch = fallback_branch(point, choice, &self.settings);
                let emphasis = if choice.genre_emphasis.trim().is_empty() {
                    genres.first().cloned().unwrap_or_else(|| "Drama".into())
                } else {
                    choice.genre_emphasis.clone()
                };
                let decision = GenreDecision {
                    choice_id: choice.choice_id.clone(),
                    genre_emphasis: emphasis,
                    genre_shift: branch.genre_shift.clone(),
                };
                (branch, decision)
            }
        }
    }
}

// ── Fallbacks ──────────────────────────────────────────────────────

fn fallback_choices(chapter: u32, point: u32, genres: &[String]) -> Vec<Choice> {
    let emphasis = |k: usize| {
        if genres.is_empty() {
            "Drama".to_string()
        } else {
            genres[(k - 1) % genres.len()].clone()
        }
    };
    vec![
        Choice {
            choice_id: format!("c_{chapter}_{point}_1"),
            description: "First option".into(),
            immediate_outcome: "The story continues with this choice".into(),
            genre_emphasis: emphasis(1),
        },
        Choice {
            choice_id: format!("c_{chapter}_{point}_2"),
            description: "Second option".into(),
            immediate_outcome: "The story takes a different path".into(),
            genre_emphasis: emphasis(2),
        },
    ]
}

pub fn fallback_decision_point(chapter: u32, total: u32, genres: &[String]) -> DecisionPoint {
    DecisionPoint {
        point_id: format!("dp_{chapter}_1"),
        description: "A decision point based on the chapter events".into(),
        context: "At a critical moment in the story".into(),
        choices: fallback_choices(chapter, 1, genres),
        genre_impacts: genre_impacts(chapter, total, genres),
    }
}

pub fn fallback_branch(point: &DecisionPoint, choice: &Choice, settings: &StorySettings) -> Branch {
    let id = &choice.choice_id;
    Branch {
        choice_id: id.clone(),
        decision_point_id: point.point_id.clone(),
        title: format!("Branch from choice {id}"),
        content: format!("The story continues based on choice {id}."),
        consequences: "The story continues with consequences of this choice.".into(),
        follow_up_hooks: vec!["The story continues...".into()],
        character_impacts: "Characters are affected by this choice.".into(),
        cultural_elements: Vec::new(),
        genre_elements: default_genre_elements(&choice.genre_emphasis, &settings.genres),
        genre_shift: default_genre_shift(&choice.genre_emphasis, &settings.genres),
        narrative_tone_progression: format!("Maintaining {} tone", settings.narrative_tone),
    }
}

// ── Genre heuristics ───────────────────────────────────────────────

/// How a decision at chapter `chapter` of `total` may affect each genre,
/// worded for the early, middle or late story. At most three impacts.
pub fn genre_impacts(chapter: u32, total: u32, genres: &[String]) -> String {
    if genres.is_empty() {
        return "This decision point will impact the story's direction.".into();
    }
    let position = if total > 0 {
        f64::from(chapter) / f64::from(total)
    } else {
        0.5
    };
    genres
        .iter()
        .take(3)
        .map(|genre| {
            let lower = genre.to_lowercase();
            let keyed = |romance: &str, mystery: &str, adventure: &str| {
                if lower.contains("romance") {
                    Some(romance.to_string())
                } else if lower.contains("mystery") {
                    Some(mystery.to_string())
                } else if lower.contains("adventure") {
                    Some(adventure.to_string())
                } else {
                    None
                }
            };
            if position < 0.3 {
                keyed(
                    "This decision could establish the romantic dynamics",
                    "This decision could introduce key mystery elements",
                    "This decision could set the journey's direction",
                )
                .unwrap_or_else(|| format!("This decision impacts {genre} elements"))
            } else if position < 0.7 {
                keyed(
                    "This decision could complicate or deepen relationships",
                    "This decision could reveal important clues or create misdirection",
                    "This decision could present a significant challenge or discovery",
                )
                .unwrap_or_else(|| format!("This decision advances {genre} elements"))
            } else {
                keyed(
                    "This decision could lead toward romantic resolution",
                    "This decision could lead toward solving the mystery",
                    "This decision could lead toward the journey's conclusion",
                )
                .unwrap_or_else(|| format!("This decision resolves {genre} elements"))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

const GENRE_KEYWORDS: [(&str, &[&str]); 5] = [
    (
        "romance",
        &["love", "relationship", "emotion", "heart", "feeling", "together", "romantic"],
    ),
    (
        "mystery",
        &["secret", "clue", "investigate", "discover", "reveal", "solve", "truth", "suspicion"],
    ),
    (
        "adventure",
        &["journey", "quest", "challenge", "danger", "explore", "risk", "brave", "venture"],
    ),
    (
        "historical",
        &["tradition", "heritage", "past", "ancestry", "legacy", "history", "era"],
    ),
    (
        "drama",
        &["conflict", "emotion", "tense", "family", "struggle", "pain", "overcome"],
    ),
];

/// Genres a choice leans toward, from keywords in its description and
/// outcome. Without a keyword hit the genre rotates with the chapter and the
/// choice's trailing number. At most two genres.
pub fn choice_genre_emphasis(choice: &Choice, chapter: u32, genres: &[String]) -> String {
    if genres.is_empty() {
        return "No specific genre emphasis".into();
    }
    let text = format!(
        "{} {}",
        choice.description.to_lowercase(),
        choice.immediate_outcome.to_lowercase()
    );
    let mut emphasized: Vec<&str> = genres
        .iter()
        .filter(|genre| {
            let lower = genre.to_lowercase();
            GENRE_KEYWORDS
                .iter()
                .find(|(key, _)| lower.contains(key))
                .is_some_and(|(_, words)| words.iter().any(|w| text.contains(w)))
        })
        .map(String::as_str)
        .collect();

    if emphasized.is_empty() {
        let choice_num: usize = choice
            .choice_id
            .rsplit('_')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        emphasized.push(&genres[(chapter as usize + choice_num) % genres.len()]);
    }
    emphasized.truncate(2);
    emphasized.join(", ")
}

/// Genre elements of a branch whose answer named none, one per emphasized
/// genre.
pub fn derive_genre_elements(emphasis: &str, genres: &[String]) -> Vec<String> {
    if genres.is_empty() {
        return vec!["Generic story elements".into()];
    }
    let emphasis = if emphasis.trim().is_empty() {
        genres[0].as_str()
    } else {
        emphasis
    };
    emphasis
        .split(',')
        .map(str::trim)
        .map(|genre| {
            let lower = genre.to_lowercase();
            if lower.contains("romance") {
                format!("Romantic development between characters ({genre})")
            } else if lower.contains("mystery") {
                format!("Mystery progression with new revelations ({genre})")
            } else if lower.contains("adventure") {
                format!("Adventure elements with challenges and exploration ({genre})")
            } else if lower.contains("historical") {
                format!("Historical elements highlighting period authenticity ({genre})")
            } else if lower.contains("drama") {
                format!("Dramatic elements focusing on emotional conflicts ({genre})")
            } else {
                format!("{genre} elements appropriate to the story")
            }
        })
        .collect()
}

/// Genre elements of a fallback branch.
pub fn default_genre_elements(emphasis: &str, genres: &[String]) -> Vec<String> {
    if genres.is_empty() {
        return vec!["Generic story elements".into()];
    }
    let emphasis = if emphasis.trim().is_empty() {
        genres[0].to_lowercase()
    } else {
        emphasis.to_lowercase()
    };
    let pair = |a: &str, b: &str| vec![a.to_string(), b.to_string()];
    if emphasis.contains("romance") {
        pair(
            "Development of romantic relationships",
            "Emotional connection between characters",
        )
    } else if emphasis.contains("mystery") {
        pair(
            "Clues related to the central mystery",
            "Increasing suspense and questions",
        )
    } else if emphasis.contains("adventure") {
        pair(
            "Journey progression and challenges",
            "Exploration of new environments",
        )
    } else if emphasis.contains("historical") {
        pair(
            "Period-authentic scenarios and challenges",
            "Cultural and historical context integration",
        )
    } else {
        genres
            .iter()
            .take(2)
            .map(|g| format!("{g} elements appropriate to the story"))
            .collect()
    }
}

/// Genre shift of a fallback branch.
pub fn default_genre_shift(emphasis: &str, genres: &[String]) -> String {
    if genres.len() <= 1 {
        return "No significant genre shift".into();
    }
    let primary = emphasis
        .split(',')
        .map(str::trim)
        .find(|g| !g.is_empty())
        .unwrap_or(genres[0].as_str());
    match genres
        .iter()
        .find(|g| g.to_lowercase() != primary.to_lowercase())
    {
        Some(secondary) => format!(
            "This choice shifts the narrative toward {primary} with elements of {secondary}"
        ),
        None => format!("This choice maintains focus on {primary} elements"),
    }
}
