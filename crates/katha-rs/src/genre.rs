//! Genre emphasis: which genre leads each chapter, and where each genre's
//! arc stands.
//!
//! Everything here is a pure function of `(chapter, total_chapters, genres)`.
//! Nothing accumulates between chapters, so regenerating a chapter yields the
//! same guidance.

use serde::{Deserialize, Serialize};

/// Number of stages in every arc template.
pub const ARC_STAGES: usize = 5;

// ── Phase ──────────────────────────────────────────────────────────

/// Coarse position of a chapter in the story.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NarrativePhase {
    Introduction,
    Complication,
    Resolution,
}

impl NarrativePhase {
    /// Phase for chapter `chapter` of `total`: the first quarter introduces,
    /// up to three quarters complicates (inclusive), the rest resolves.
    pub fn at(chapter: u32, total: u32) -> Self {
        let (c, t) = (u64::from(chapter), u64::from(total));
        if 4 * c <= t {
            NarrativePhase::Introduction
        } else if 4 * c <= 3 * t {
            NarrativePhase::Complication
        } else {
            NarrativePhase::Resolution
        }
    }

    /// What the chapter should be doing with its genre elements.
    pub fn focus(self) -> &'static str {
        match self {
            NarrativePhase::Introduction => "establishing",
            NarrativePhase::Complication => "developing",
            NarrativePhase::Resolution => "resolving",
        }
    }

    /// Name used when describing fallback genre elements.
    fn element_phase(self) -> &'static str {
        match self {
            NarrativePhase::Introduction => "introduction",
            NarrativePhase::Complication => "development",
            NarrativePhase::Resolution => "resolution",
        }
    }
}

// ── Arc templates ──────────────────────────────────────────────────

/// Stage template family, picked by keyword from the genre name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArcKind {
    Romance,
    Mystery,
    Adventure,
    Historical,
    Fantasy,
    Generic,
}

impl ArcKind {
    pub fn of(genre: &str) -> Self {
        let g = genre.to_lowercase();
        if g.contains("romance") {
            ArcKind::Romance
        } else if g.contains("mystery") {
            ArcKind::Mystery
        } else if g.contains("adventure") {
            ArcKind::Adventure
        } else if g.contains("historical") || g.contains("period") {
            ArcKind::Historical
        } else if g.contains("fantasy") || g.contains("mytholog") {
            ArcKind::Fantasy
        } else {
            ArcKind::Generic
        }
    }

    pub fn stages(self) -> [&'static str; ARC_STAGES] {
        match self {
            ArcKind::Romance => [
                "Initial meeting",
                "Attraction",
                "Obstacles",
                "Growth",
                "Resolution",
            ],
            ArcKind::Mystery => [
                "Initial problem",
                "Clues",
                "Red herrings",
                "Revelations",
                "Solution",
            ],
            ArcKind::Adventure => [
                "Call to adventure",
                "Challenges",
                "Trials",
                "Climactic challenge",
                "Return",
            ],
            ArcKind::Historical => [
                "Setting establishment",
                "Period tensions",
                "Historical events",
                "Character adaptation",
                "Resolution",
            ],
            ArcKind::Fantasy => [
                "World rules",
                "Magic introduction",
                "Powers development",
                "Magical conflict",
                "Magical resolution",
            ],
            ArcKind::Generic => [
                "Introduction",
                "Development",
                "Complication",
                "Climax",
                "Resolution",
            ],
        }
    }
}

/// Arc stage index for chapter `chapter` of `total`: `floor(position × 5)`,
/// capped at the last stage.
pub fn stage_index(chapter: u32, total: u32) -> usize {
    if total == 0 {
        return 0;
    }
    let idx = (u64::from(chapter) * ARC_STAGES as u64) / u64::from(total);
    (idx as usize).min(ARC_STAGES - 1)
}

// ── Emphasis ───────────────────────────────────────────────────────

/// Role of a genre in a given chapter.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Emphasis {
    Primary,
    Secondary,
    Background,
}

/// One genre's arc position for a chapter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GenreArcStage {
    pub genre: String,
    pub current_stage: String,
    pub emphasis: Emphasis,
}

/// Genre guidance passed to the chapter prompt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GenreEmphasis {
    /// `"i/N"`.
    pub chapter_position: String,
    pub narrative_phase: NarrativePhase,
    pub focus: String,
    pub primary_genre: String,
    pub secondary_genre: String,
    pub genre_stages: Vec<GenreArcStage>,
    pub blend_recommendation: String,
}

impl GenreEmphasis {
    /// Compute the guidance for chapter `chapter` of `total`.
    ///
    /// Genres rotate: chapter `i` leads with `genres[(i-1) mod g]` and
    /// supports with the next one.
    pub fn for_chapter(chapter: u32, total: u32, genres: &[String]) -> Result<Self, String> {
        if chapter == 0 || total == 0 {
            return Err(format!(
                "genre emphasis needs a positive chapter and total, got {chapter}/{total}"
            ));
        }
        if genres.is_empty() {
            return Err("genre emphasis needs at least one genre".into());
        }

        let primary_idx = (chapter as usize - 1) % genres.len();
        let secondary_idx = (primary_idx + 1) % genres.len();
        let primary = &genres[primary_idx];
        let secondary = &genres[secondary_idx];
        let phase = NarrativePhase::at(chapter, total);
        let stage = stage_index(chapter, total);

        let genre_stages = genres
            .iter()
            .map(|genre| GenreArcStage {
                genre: genre.clone(),
                current_stage: ArcKind::of(genre).stages()[stage].to_string(),
                emphasis: if genre == primary {
                    Emphasis::Primary
                } else if genre == secondary {
                    Emphasis::Secondary
                } else {
                    Emphasis::Background
                },
            })
            .collect();

        Ok(Self {
            chapter_position: format!("{chapter}/{total}"),
            narrative_phase: phase,
            focus: phase.focus().to_string(),
            primary_genre: primary.clone(),
            secondary_genre: secondary.clone(),
            genre_stages,
            blend_recommendation: format!(
                "This chapter should primarily emphasize {primary} elements while \
                 incorporating supporting elements from {secondary}."
            ),
        })
    }
}

/// Hint about where the genres head in chapter `next` of `total`.
pub fn trajectory(next: u32, total: u32, genres: &[String]) -> String {
    if next > total || genres.is_empty() {
        return "This is the conclusion - all genre elements should be resolved.".to_string();
    }
    let primary = &genres[(next.max(1) as usize - 1) % genres.len()];
    let current = stage_index(next.saturating_sub(1), total);
    let next_stage = ArcKind::of(primary).stages()[(current + 1).min(ARC_STAGES - 1)];
    format!("Next chapter should advance the {primary} elements toward {next_stage}.")
}

/// Genre elements recorded for a chapter whose generation failed.
pub fn default_genre_elements(chapter: u32, total: u32, genres: &[String]) -> Vec<String> {
    let phase = NarrativePhase::at(chapter, total.max(1));
    genres
        .iter()
        .map(|genre| match (ArcKind::of(genre), phase) {
            (ArcKind::Romance, NarrativePhase::Introduction) => {
                "Initial attraction between characters (Romance)".to_string()
            }
            (ArcKind::Romance, NarrativePhase::Complication) => {
                "Relationship complications and growth (Romance)".to_string()
            }
            (ArcKind::Romance, NarrativePhase::Resolution) => {
                "Romantic resolution or commitment (Romance)".to_string()
            }
            (ArcKind::Mystery, NarrativePhase::Introduction) => {
                "Mystery setup and initial clues (Mystery)".to_string()
            }
            (ArcKind::Mystery, NarrativePhase::Complication) => {
                "Investigation progress and red herrings (Mystery)".to_string()
            }
            (ArcKind::Mystery, NarrativePhase::Resolution) => {
                "Mystery revelation and resolution (Mystery)".to_string()
            }
            (ArcKind::Adventure, NarrativePhase::Introduction) => {
                "Journey beginning and initial challenges (Adventure)".to_string()
            }
            (ArcKind::Adventure, NarrativePhase::Complication) => {
                "Overcoming obstacles and character growth (Adventure)".to_string()
            }
            (ArcKind::Adventure, NarrativePhase::Resolution) => {
                "Final challenge and triumphant return (Adventure)".to_string()
            }
            _ => format!(
                "{genre} elements appropriate for the {} phase",
                phase.element_phase()
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genres(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn phases_over_four_chapters() {
        let g = genres(&["Romance", "Mystery"]);
        let phases: Vec<(NarrativePhase, String)> = (1..=4)
            .map(|i| {
                let e = GenreEmphasis::for_chapter(i, 4, &g).unwrap();
                (e.narrative_phase, e.focus)
            })
            .collect();
        assert_eq!(phases[0].0, NarrativePhase::Introduction);
        assert_eq!(phases[0].1, "establishing");
        assert_eq!(phases[1].0, NarrativePhase::Complication);
        // 3/4 sits on the inclusive upper bound of the middle band.
        assert_eq!(phases[2].0, NarrativePhase::Complication);
        assert_eq!(phases[2].1, "developing");
        assert_eq!(phases[3].0, NarrativePhase::Resolution);
        assert_eq!(phases[3].1, "resolving");
    }

    #[test]
    fn genres_rotate() {
        let g = genres(&["Romance", "Mystery"]);
        let e1 = GenreEmphasis::for_chapter(1, 4, &g).unwrap();
        let e2 = GenreEmphasis::for_chapter(2, 4, &g).unwrap();
        let e3 = GenreEmphasis::for_chapter(3, 4, &g).unwrap();
        assert_eq!((e1.primary_genre.as_str(), e1.secondary_genre.as_str()), ("Romance", "Mystery"));
        assert_eq!((e2.primary_genre.as_str(), e2.secondary_genre.as_str()), ("Mystery", "Romance"));
        assert_eq!(e3.primary_genre, "Romance");
        assert_eq!(e1.chapter_position, "1/4");
        assert_eq!(
            e1.blend_recommendation,
            "This chapter should primarily emphasize Romance elements while incorporating \
             supporting elements from Mystery."
        );
    }

    #[test]
    fn single_genre_is_both_primary_and_secondary() {
        let g = genres(&["Drama"]);
        let e = GenreEmphasis::for_chapter(2, 3, &g).unwrap();
        assert_eq!(e.primary_genre, "Drama");
        assert_eq!(e.secondary_genre, "Drama");
        assert_eq!(e.genre_stages[0].emphasis, Emphasis::Primary);
    }

    #[test]
    fn arc_stage_snapshot() {
        let g = genres(&["Romance", "Mystery", "Adventure", "Mythology"]);
        let e = GenreEmphasis::for_chapter(2, 5, &g).unwrap();
        // position 0.4 -> stage 2 for every template
        let stages: Vec<&str> = e
            .genre_stages
            .iter()
            .map(|s| s.current_stage.as_str())
            .collect();
        assert_eq!(
            stages,
            vec!["Obstacles", "Red herrings", "Trials", "Powers development"]
        );
        assert_eq!(e.genre_stages[0].emphasis, Emphasis::Background);
        assert_eq!(e.genre_stages[1].emphasis, Emphasis::Primary);
        assert_eq!(e.genre_stages[2].emphasis, Emphasis::Secondary);
    }

    #[test]
    fn last_chapter_caps_stage() {
        assert_eq!(stage_index(10, 10), 4);
        assert_eq!(stage_index(1, 10), 0);
        assert_eq!(stage_index(0, 10), 0);
    }

    #[test]
    fn arc_kind_keywords() {
        assert_eq!(ArcKind::of("Historical Fiction"), ArcKind::Historical);
        assert_eq!(ArcKind::of("Period Drama"), ArcKind::Historical);
        assert_eq!(ArcKind::of("Mythology"), ArcKind::Fantasy);
        assert_eq!(ArcKind::of("Comedy"), ArcKind::Generic);
    }

    #[test]
    fn invalid_inputs_rejected() {
        assert!(GenreEmphasis::for_chapter(0, 4, &genres(&["Drama"])).is_err());
        assert!(GenreEmphasis::for_chapter(1, 0, &genres(&["Drama"])).is_err());
        assert!(GenreEmphasis::for_chapter(1, 4, &[]).is_err());
    }

    #[test]
    fn trajectory_steps_one_stage_ahead() {
        let g = genres(&["Romance", "Mystery"]);
        // After chapter 1 of 5 (stage 1), chapter 2 leads with Mystery.
        assert_eq!(
            trajectory(2, 5, &g),
            "Next chapter should advance the Mystery elements toward Red herrings."
        );
        assert_eq!(
            trajectory(5, 5, &g),
            "Next chapter should advance the Romance elements toward Resolution."
        );
        assert_eq!(
            trajectory(6, 5, &g),
            "This is the conclusion - all genre elements should be resolved."
        );
    }

    #[test]
    fn default_elements_by_phase() {
        let g = genres(&["Romance", "Comedy"]);
        assert_eq!(
            default_genre_elements(1, 4, &g),
            vec![
                "Initial attraction between characters (Romance)".to_string(),
                "Comedy elements appropriate for the introduction phase".to_string(),
            ]
        );
        assert_eq!(
            default_genre_elements(3, 4, &g)[1],
            "Comedy elements appropriate for the development phase"
        );
        assert_eq!(
            default_genre_elements(4, 4, &g)[0],
            "Romantic resolution or commitment (Romance)"
        );
    }
}
