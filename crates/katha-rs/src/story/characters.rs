//! Main and supporting characters.
//!
//! The model writes the cast; keyword heuristics then fill the genre-facing
//! fields it left out (archetypes, traits, supporting roles and purposes) and
//! always assign the narrative role and emotional landscape, so every
//! character carries them regardless of what the model answered.

use super::foundation::StoryOutline;
use super::{StageClient, StorySettings};
use crate::prompts::PromptStage;
use crate::schema::{FieldSpec, ResponseSchema, parse_response};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Records ────────────────────────────────────────────────────────

/// A main character.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Character {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub background: String,
    pub appearance: String,
    pub personality: String,
    pub motivations: String,
    pub goals: String,
    pub conflicts: String,
    pub character_arc: String,
    pub cultural_traits: String,
    pub speech_pattern: String,
    pub relationships: String,
    pub genre_archetypes: String,
    pub genre_traits: String,
    pub socio_economic_context: String,
    pub professional_background: String,
    pub narrative_role: String,
    pub emotional_landscape: String,
}

/// A supporting character.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SupportingCharacter {
    pub name: String,
    pub role: String,
    pub relationship_to_main_characters: String,
    pub brief_description: String,
    pub cultural_background: String,
    pub plot_influence: String,
    pub genre_role: String,
    pub genre_purpose: String,
    pub socio_economic_context: String,
    pub professional_background: String,
    pub narrative_role: String,
    pub emotional_landscape: String,
}

#[derive(Deserialize)]
struct MainCast {
    characters: Vec<Character>,
}

#[derive(Deserialize)]
struct SupportingCast {
    supporting_characters: Vec<SupportingCharacter>,
}

// ── Schemas ────────────────────────────────────────────────────────

fn character_schema() -> ResponseSchema {
    ResponseSchema::new("character")
        .with(FieldSpec::text("name", "Full name of the character").or("Unknown"))
        .with(FieldSpec::text("age", "Age of the character").or("Unknown"))
        .with(FieldSpec::text("gender", "Gender of the character").or("Unknown"))
        .with(
            FieldSpec::text(
                "background",
                "Detailed background including birthplace, family, and cultural context",
            )
            .or("To be determined"),
        )
        .with(FieldSpec::text("appearance", "Physical appearance description").or("To be determined"))
        .with(
            FieldSpec::text("personality", "Personality traits and characteristics")
                .or("To be determined"),
        )
        .with(FieldSpec::text("motivations", "Primary motivations and desires").or("To be determined"))
        .with(FieldSpec::text("goals", "Personal and narrative goals").or("To be determined"))
        .with(FieldSpec::text("conflicts", "Internal and external conflicts").or("To be determined"))
        .with(
            FieldSpec::text("character_arc", "How the character changes throughout the story")
                .or("To be determined"),
        )
        .with(
            FieldSpec::text(
                "cultural_traits",
                "Specific cultural traits relevant to their background",
            )
            .or("To be determined"),
        )
        .with(
            FieldSpec::text(
                "speech_pattern",
                "Distinctive way of speaking, including regional expressions",
            )
            .or("Standard"),
        )
        .with(
            FieldSpec::text("relationships", "Relationships with other characters")
                .or("To be determined"),
        )
        .with(FieldSpec::text(
            "genre_archetypes",
            "Character archetypes from the selected genres that this character embodies",
        ))
        .with(FieldSpec::text(
            "genre_traits",
            "Specific traits or qualities that reflect the story's genres",
        ))
        .with(
            FieldSpec::text(
                "socio_economic_context",
                "Social and economic background within the setting",
            )
            .or("To be determined"),
        )
        .with(
            FieldSpec::text(
                "professional_background",
                "Career, profession, or primary occupation",
            )
            .or("To be determined"),
        )
}

pub fn main_cast_schema() -> ResponseSchema {
    ResponseSchema::new("main_characters").with(
        FieldSpec::records("characters", "Array of character profiles", character_schema())
            .required(),
    )
}

fn supporting_schema() -> ResponseSchema {
    ResponseSchema::new("supporting_character")
        .with(FieldSpec::text("name", "Full name of the character").or("Unknown"))
        .with(FieldSpec::text("role", "Role in the story").or("Minor character"))
        .with(
            FieldSpec::text(
                "relationship_to_main_characters",
                "Relationship to the main characters",
            )
            .or("Acquaintance"),
        )
        .with(
            FieldSpec::text("brief_description", "Brief background and personality")
                .or("To be determined"),
        )
        .with(FieldSpec::text(
            "cultural_background",
            "Cultural background specific to the region",
        ))
        .with(FieldSpec::text("plot_influence", "How they influence the plot").or("To be determined"))
        .with(FieldSpec::text("genre_role", "Genre-specific function they serve"))
        .with(FieldSpec::text(
            "genre_purpose",
            "How they contribute to the story's genre elements",
        ))
        .with(
            FieldSpec::text("socio_economic_context", "Social and economic background")
                .or("To be determined"),
        )
        .with(
            FieldSpec::text("professional_background", "Profession or primary occupation")
                .or("To be determined"),
        )
}

pub fn supporting_cast_schema() -> ResponseSchema {
    ResponseSchema::new("supporting_characters").with(
        FieldSpec::records(
            "supporting_characters",
            "Array of supporting character profiles",
            supporting_schema(),
        )
        .required(),
    )
}

// ── Generation ─────────────────────────────────────────────────────

/// Generate `count` main characters.
///
/// An unusable or empty answer yields `count` placeholder characters.
pub async fn generate_main_characters(
    client: &StageClient<'_>,
    outline: &StoryOutline,
    settings: &StorySettings,
    count: u32,
) -> Vec<Character> {
    let schema = main_cast_schema();
    let vars = settings
        .prompt_vars()
        .json("story_outline", outline)
        .text("num_characters", count.to_string())
        .text("format_instructions", schema.format_instructions());
    let raw = client.request(PromptStage::MainCharacters, &vars).await;

    let cast = match parse_response::<MainCast>(&schema, raw) {
        Some(cast) if !cast.characters.is_empty() => cast
            .characters
            .into_iter()
            .map(|c| enrich_main(c, settings))
            .collect(),
        Some(_) => {
            warn!("main_characters response had no characters, using fallback");
            fallback_main_characters(settings, count)
        }
        None => fallback_main_characters(settings, count),
    };
    info!("{} main character(s) ready", cast.len());
    cast
}

/// Generate `count` supporting characters around `main_characters`.
pub async fn generate_supporting_characters(
    client: &StageClient<'_>,
    outline: &StoryOutline,
    main_characters: &[Character],
    settings: &StorySettings,
    count: u32,
) -> Vec<SupportingCharacter> {
    let schema = supporting_cast_schema();
    let vars = settings
        .prompt_vars()
        .json("story_outline", outline)
        .json("main_characters", main_characters)
        .text("num_characters", count.to_string())
        .text("format_instructions", schema.format_instructions());
    let raw = client.request(PromptStage::SupportingCharacters, &vars).await;

    let cast = match parse_response::<SupportingCast>(&schema, raw) {
        Some(cast) if !cast.supporting_characters.is_empty() => cast
            .supporting_characters
            .into_iter()
            .map(|c| enrich_supporting(c, settings, &outline.theme))
            .collect(),
        Some(_) => {
            warn!("supporting_characters response had no characters, using fallback");
            fallback_supporting_characters(settings, count)
        }
        None => fallback_supporting_characters(settings, count),
    };
    info!("{} supporting character(s) ready", cast.len());
    cast
}

fn enrich_main(mut c: Character, settings: &StorySettings) -> Character {
    let genres = &settings.genres;
    if c.genre_archetypes.trim().is_empty() {
        c.genre_archetypes = genre_archetypes(&c.personality, &c.motivations, &c.conflicts, genres);
    }
    if c.genre_traits.trim().is_empty() {
        c.genre_traits = genre_traits(genres);
    }
    c.narrative_role = narrative_role(&c.personality, genres, 0);
    c.emotional_landscape =
        emotional_landscape(&c.personality, &c.conflicts, &settings.narrative_tone);
    c
}

fn enrich_supporting(
    mut c: SupportingCharacter,
    settings: &StorySettings,
    theme: &str,
) -> SupportingCharacter {
    let genres = &settings.genres;
    if c.cultural_background.trim().is_empty() {
        c.cultural_background = format!("From {}", settings.region);
    }
    if c.genre_role.trim().is_empty() {
        c.genre_role = supporting_genre_role(&c.role, &c.brief_description, genres);
    }
    if c.genre_purpose.trim().is_empty() {
        c.genre_purpose =
            supporting_genre_purpose(&c.role, &c.relationship_to_main_characters, genres, theme);
    }
    c.narrative_role = narrative_role("", genres, 1);
    c.emotional_landscape = emotional_landscape("", "", &settings.narrative_tone);
    c
}

// ── Fallbacks ──────────────────────────────────────────────────────

pub fn fallback_main_characters(settings: &StorySettings, count: u32) -> Vec<Character> {
    let tbd = || "To be determined".to_string();
    (0..count as usize)
        .map(|i| Character {
            name: format!("Character {}", i + 1),
            age: "Unknown".into(),
            gender: "Unknown".into(),
            background: format!("From {}", settings.region),
            appearance: tbd(),
            personality: tbd(),
            motivations: tbd(),
            goals: tbd(),
            conflicts: tbd(),
            character_arc: tbd(),
            cultural_traits: format!("Typical of {}", settings.region),
            speech_pattern: "Standard".into(),
            relationships: tbd(),
            genre_archetypes: default_genre_archetypes(&settings.genres, i),
            genre_traits: default_genre_traits(&settings.genres),
            socio_economic_context: tbd(),
            professional_background: tbd(),
            narrative_role: narrative_role("", &settings.genres, i),
            emotional_landscape: emotional_landscape("", "", &settings.narrative_tone),
        })
        .collect()
}

pub fn fallback_supporting_characters(
    settings: &StorySettings,
    count: u32,
) -> Vec<SupportingCharacter> {
    (0..count as usize)
        .map(|i| SupportingCharacter {
            name: format!("Supporting Character {}", i + 1),
            role: "Minor character".into(),
            relationship_to_main_characters: "Acquaintance".into(),
            brief_description: "To be determined".into(),
            cultural_background: format!("From {}", settings.region),
            plot_influence: "To be determined".into(),
            genre_role: default_supporting_genre_role(&settings.genres, i),
            genre_purpose: default_supporting_genre_purpose(&settings.genres),
            socio_economic_context: "To be determined".into(),
            professional_background: "To be determined".into(),
            narrative_role: narrative_role("", &settings.genres, i),
            emotional_landscape: emotional_landscape("", "", &settings.narrative_tone),
        })
        .collect()
}

// ── Heuristics ─────────────────────────────────────────────────────

fn primary_genre(genres: &[String]) -> String {
    genres
        .first()
        .map(|g| g.to_lowercase())
        .unwrap_or_else(|| "drama".to_string())
}

/// Capitalize the first letter of every word.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Role in the narrative structure, keyed on the primary genre and
/// personality keywords.
pub fn narrative_role(personality: &str, genres: &[String], index: usize) -> String {
    const ROLE_MAP: [(&str, [(&str, &str); 2], &str); 4] = [
        (
            "romance",
            [("passionate", "Romantic Lead"), ("reserved", "Love Interest")],
            "Romantic Catalyst",
        ),
        (
            "mystery",
            [("curious", "Detective/Investigator"), ("secretive", "Key Suspect")],
            "Mystery Participant",
        ),
        (
            "adventure",
            [("brave", "Hero/Protagonist"), ("wise", "Mentor/Guide")],
            "Journey Companion",
        ),
        (
            "drama",
            [("emotional", "Emotional Anchor"), ("conflicted", "Internal Conflict Driver")],
            "Story Catalyst",
        ),
    ];
    const DEFAULT_ROLES: [&str; 5] = [
        "Primary Narrative Driver",
        "Supporting Narrative Element",
        "Contextual Character",
        "Thematic Representation",
        "Narrative Catalyst",
    ];

    if genres.is_empty() {
        return "Undefined narrative role".into();
    }
    let primary = primary_genre(genres);
    let personality = personality.to_lowercase();
    for (genre, traits, default) in ROLE_MAP {
        if primary.contains(genre) {
            return traits
                .iter()
                .find(|(trait_word, _)| personality.contains(trait_word))
                .map_or(default, |(_, role)| *role)
                .to_string();
        }
    }
    DEFAULT_ROLES[index % DEFAULT_ROLES.len()].to_string()
}

/// Emotional depth derived from the narrative tone, sharpened by the first
/// matching personality or conflict keyword.
pub fn emotional_landscape(personality: &str, conflicts: &str, tone: &str) -> String {
    let base = match tone {
        "Dramatic" => "Deeply layered emotional landscape with intense internal conflicts",
        "Humorous" => "Emotionally lighthearted with comedic undertones",
        "Suspenseful" => "Emotionally tense with underlying anxiety and anticipation",
        "Inspirational" => "Emotionally resilient with hope and personal growth",
        "Mysterious" => "Emotionally guarded with hidden depths",
        "Emotional" => "Rich, nuanced emotional experiences",
        "Philosophical" => "Emotionally contemplative with intellectual depth",
        "Introspective" => "Deeply self-aware with complex inner world",
        _ => "Balanced emotional landscape",
    };
    const INDICATORS: [(&str, &str); 4] = [
        ("passionate", "Intense emotional experiences"),
        ("reserved", "Subtle, restrained emotional expression"),
        ("conflicted", "Internal emotional turmoil"),
        ("resilient", "Emotionally strong and adaptive"),
    ];
    let personality = personality.to_lowercase();
    let conflicts = conflicts.to_lowercase();
    match INDICATORS
        .iter()
        .find(|(word, _)| personality.contains(word) || conflicts.contains(word))
    {
        Some((_, desc)) => format!("{base} with {desc}"),
        None => base.to_string(),
    }
}

/// Genre archetypes suggested by personality, motivation and conflict
/// keywords.
pub fn genre_archetypes(
    personality: &str,
    motivations: &str,
    conflicts: &str,
    genres: &[String],
) -> String {
    if genres.is_empty() {
        return "Standard character archetype".into();
    }
    let personality = personality.to_lowercase();
    let motivations = motivations.to_lowercase();
    let conflicts = conflicts.to_lowercase();

    let mut archetypes = Vec::new();
    for genre in genres.iter().map(|g| g.to_lowercase()) {
        let found = if genre.contains("romance") {
            if personality.contains("passionate") || motivations.contains("love") {
                Some("Romantic Lead")
            } else if personality.contains("jealous") || conflicts.contains("rival") {
                Some("Romantic Rival")
            } else {
                None
            }
        } else if genre.contains("adventure") {
            if personality.contains("brave") || motivations.contains("explore") {
                Some("Hero/Adventurer")
            } else if personality.contains("wise") || motivations.contains("guide") {
                Some("Mentor")
            } else {
                None
            }
        } else if genre.contains("mystery") {
            if personality.contains("curious") || motivations.contains("truth") {
                Some("Detective/Truth Seeker")
            } else if personality.contains("secretive") || motivations.contains("hidden") {
                Some("Mysterious Figure")
            } else {
                None
            }
        } else {
            None
        };
        archetypes.extend(found);
    }

    if archetypes.is_empty() {
        let primary = primary_genre(genres);
        archetypes.push(if primary.contains("romance") {
            "Romantic Character"
        } else if primary.contains("adventure") {
            "Adventurous Soul"
        } else if primary.contains("mystery") {
            "Enigmatic Individual"
        } else if primary.contains("historical") {
            "Historical Figure"
        } else if primary.contains("fantasy") {
            "Magical Character"
        } else {
            "Cultural Archetype"
        });
    }
    archetypes.join(", ")
}

/// One characteristic trait per recognised genre.
pub fn genre_traits(genres: &[String]) -> String {
    if genres.is_empty() {
        return "Standard character traits".into();
    }
    let traits: Vec<&str> = genres
        .iter()
        .map(|g| g.to_lowercase())
        .filter_map(|genre| {
            [
                ("romance", "Emotionally complex"),
                ("adventure", "Resourceful and brave"),
                ("mystery", "Observant and analytical"),
                ("historical", "Connected to cultural traditions"),
                ("fantasy", "Believes in the supernatural"),
                ("comedy", "Has a keen sense of humor"),
                ("thriller", "Alert to danger"),
                ("drama", "Emotionally expressive"),
            ]
            .into_iter()
            .find(|(key, _)| genre.contains(key))
            .map(|(_, t)| t)
        })
        .collect();
    if traits.is_empty() {
        "Culturally authentic traits".into()
    } else {
        traits.join(", ")
    }
}

/// Archetype for the `index`-th placeholder main character.
pub fn default_genre_archetypes(genres: &[String], index: usize) -> String {
    if genres.is_empty() {
        return "Standard character archetype".into();
    }
    let primary = primary_genre(genres);
    let titled = title_case(&primary);
    match index {
        0 if primary.contains("romance") => "Romantic Protagonist".into(),
        0 if primary.contains("adventure") => "Hero's Journey Archetype".into(),
        0 => format!("{titled} Protagonist"),
        1 => format!("Supporting {titled} Character"),
        _ if primary.contains("romance") => "Love Interest or Confidant".into(),
        _ if primary.contains("mystery") => "Suspect or Helper".into(),
        _ => format!("Important {titled} Character"),
    }
}

/// Traits for placeholder main characters, from the first two genres.
pub fn default_genre_traits(genres: &[String]) -> String {
    if genres.is_empty() {
        return "Standard character traits".into();
    }
    genres
        .iter()
        .take(2)
        .map(|g| {
            let genre = g.to_lowercase();
            if genre.contains("romance") {
                "Romantically inclined".to_string()
            } else if genre.contains("adventure") {
                "Seeks excitement".to_string()
            } else if genre.contains("mystery") {
                "Curious and questioning".to_string()
            } else if genre.contains("historical") {
                "Historically authentic".to_string()
            } else if genre.contains("fantasy") {
                "Magical or mythical qualities".to_string()
            } else if genre.contains("drama") {
                "Emotionally driven".to_string()
            } else {
                format!("{} characteristics", title_case(&genre))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Genre function of a supporting character, from role and description
/// keywords, else from the primary genre.
pub fn supporting_genre_role(role: &str, description: &str, genres: &[String]) -> String {
    if genres.is_empty() {
        return "Standard supporting role".into();
    }
    let role = role.to_lowercase();
    let description = description.to_lowercase();
    if role.contains("mentor") || role.contains("guide") || description.contains("teach") {
        return "Mentor/Guide".into();
    }
    if role.contains("friend") || role.contains("ally") || description.contains("help") {
        return "Ally/Helper".into();
    }
    if role.contains("oppos") || role.contains("enemy") || role.contains("antagonist") {
        return "Antagonist/Obstacle".into();
    }
    if role.contains("family") || role.contains("relative") || description.contains("parent") {
        return "Family Member".into();
    }

    let primary = primary_genre(genres);
    if primary.contains("romance") {
        "Romantic Facilitator or Obstacle".into()
    } else if primary.contains("mystery") {
        "Information Provider or Red Herring".into()
    } else if primary.contains("adventure") {
        "Quest Companion or Challenger".into()
    } else {
        format!("{} Supporting Character", title_case(&primary))
    }
}

/// Genre role for the `index`-th placeholder supporting character.
pub fn default_supporting_genre_role(genres: &[String], index: usize) -> String {
    if genres.is_empty() {
        return "Minor character".into();
    }
    match index % 5 {
        0 => "Mentor or Guide",
        1 => "Ally or Helper",
        2 => "Comic Relief or Emotional Support",
        3 => "Minor Antagonist or Obstacle",
        _ => "Background Character with Cultural Significance",
    }
    .into()
}

/// What a supporting character does for the genres, falling back to the
/// story theme.
pub fn supporting_genre_purpose(
    role: &str,
    relationship: &str,
    genres: &[String],
    theme: &str,
) -> String {
    if genres.is_empty() {
        return "Standard narrative purpose".into();
    }
    let role = role.to_lowercase();
    let relationship = relationship.to_lowercase();

    let mut purposes = Vec::new();
    for genre in genres.iter().map(|g| g.to_lowercase()) {
        let found = if genre.contains("romance") {
            if role.contains("friend") || relationship.contains("confidant") {
                Some("Provides emotional support or romantic advice")
            } else if role.contains("rival") || relationship.contains("compet") {
                Some("Creates romantic tension or obstacles")
            } else {
                None
            }
        } else if genre.contains("mystery") {
            if role.contains("witness") || relationship.contains("inform") {
                Some("Provides clues or information")
            } else if role.contains("suspect") {
                Some("Misdirects the investigation")
            } else {
                None
            }
        } else if genre.contains("adventure") {
            if role.contains("ally") || relationship.contains("companion") {
                Some("Assists in the quest or journey")
            } else if role.contains("expert") || relationship.contains("know") {
                Some("Provides specialized knowledge")
            } else {
                None
            }
        } else {
            None
        };
        purposes.extend(found);
    }

    if purposes.is_empty() {
        let theme = theme.to_lowercase();
        purposes.push(if theme.contains("family") {
            "Strengthens family themes"
        } else if theme.contains("tradition") {
            "Represents cultural traditions"
        } else if theme.contains("change") {
            "Highlights societal changes"
        } else {
            "Enhances cultural authenticity"
        });
    }
    purposes.join("; ")
}

/// Purpose for placeholder supporting characters, from the first two genres.
pub fn default_supporting_genre_purpose(genres: &[String]) -> String {
    if genres.is_empty() {
        return "Minor role in the narrative".into();
    }
    genres
        .iter()
        .take(2)
        .map(|g| {
            let genre = g.to_lowercase();
            if genre.contains("romance") {
                "Influences the romantic storyline".to_string()
            } else if genre.contains("mystery") {
                "Connects to the central mystery".to_string()
            } else if genre.contains("adventure") {
                "Assists or challenges during the journey".to_string()
            } else if genre.contains("historical") {
                "Provides historical context".to_string()
            } else if genre.contains("fantasy") {
                "Connects to magical or mythical elements".to_string()
            } else {
                format!("Serves typical {genre} narrative functions")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FnGenerator;
    use crate::prompts::PromptTemplates;
    use crate::story::testing::settings;
    use std::time::Duration;

    fn genres(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn narrative_role_follows_primary_genre() {
        let g = genres(&["Romance", "Mystery"]);
        assert_eq!(narrative_role("Passionate and loud", &g, 0), "Romantic Lead");
        assert_eq!(narrative_role("calm", &g, 0), "Romantic Catalyst");
        assert_eq!(narrative_role("", &genres(&["Satire"]), 3), "Thematic Representation");
        assert_eq!(narrative_role("", &genres(&["Satire"]), 7), "Contextual Character");
        assert_eq!(narrative_role("", &[], 0), "Undefined narrative role");
    }

    #[test]
    fn emotional_landscape_uses_first_indicator() {
        assert_eq!(
            emotional_landscape("reserved yet passionate", "", "Humorous"),
            "Emotionally lighthearted with comedic undertones with Intense emotional experiences"
        );
        assert_eq!(
            emotional_landscape("", "deeply conflicted", "Unknown tone"),
            "Balanced emotional landscape with Internal emotional turmoil"
        );
    }

    #[test]
    fn archetypes_from_keywords_then_primary_genre() {
        let g = genres(&["Mystery", "Adventure"]);
        assert_eq!(
            genre_archetypes("curious", "explore the hills", "", &g),
            "Detective/Truth Seeker, Hero/Adventurer"
        );
        assert_eq!(genre_archetypes("quiet", "", "", &g), "Enigmatic Individual");
        assert_eq!(
            genre_archetypes("", "", "", &genres(&["Satire"])),
            "Cultural Archetype"
        );
    }

    #[test]
    fn traits_cover_each_genre() {
        assert_eq!(
            genre_traits(&genres(&["Comedy", "Thriller", "Satire"])),
            "Has a keen sense of humor, Alert to danger"
        );
        assert_eq!(genre_traits(&genres(&["Satire"])), "Culturally authentic traits");
        assert_eq!(
            default_genre_traits(&genres(&["Science Fiction", "Romance", "Drama"])),
            "Science Fiction characteristics, Romantically inclined"
        );
    }

    #[test]
    fn default_archetypes_by_index() {
        let g = genres(&["family saga"]);
        assert_eq!(default_genre_archetypes(&g, 0), "Family Saga Protagonist");
        assert_eq!(default_genre_archetypes(&g, 1), "Supporting Family Saga Character");
        assert_eq!(default_genre_archetypes(&g, 2), "Important Family Saga Character");
        assert_eq!(
            default_genre_archetypes(&genres(&["Romance"]), 0),
            "Romantic Protagonist"
        );
    }

    #[test]
    fn supporting_roles_and_purposes() {
        let g = genres(&["Mystery"]);
        assert_eq!(supporting_genre_role("Old mentor", "", &g), "Mentor/Guide");
        assert_eq!(
            supporting_genre_role("shopkeeper", "", &g),
            "Information Provider or Red Herring"
        );
        assert_eq!(default_supporting_genre_role(&g, 7), "Comic Relief or Emotional Support");
        assert_eq!(
            supporting_genre_purpose("key witness", "", &g, ""),
            "Provides clues or information"
        );
        assert_eq!(
            supporting_genre_purpose("cook", "", &g, "Family and loss"),
            "Strengthens family themes"
        );
        assert_eq!(
            default_supporting_genre_purpose(&genres(&["Drama", "Mystery"])),
            "Serves typical drama narrative functions; Connects to the central mystery"
        );
    }

    #[tokio::test]
    async fn parsed_cast_is_enriched() {
        let generator = FnGenerator::new(|stage, _| async move {
            Ok(match stage {
                PromptStage::MainCharacters => r#"```json
{"characters": [{"name": "Meera", "age": 34, "personality": "curious and resilient",
  "genre_archetypes": "", "relationships": ["Ravi", "Amma"]}]}
```"#
                    .to_string(),
                _ => r#"{"supporting_characters": [{"name": "Ravi", "role": "childhood friend"}]}"#
                    .to_string(),
            })
        });
        let templates = PromptTemplates::new();
        let client = StageClient::new(&generator, &templates, Duration::from_secs(1));
        let s = settings(&["Mystery", "Drama"]);
        let outline = StoryOutline::default();

        let main = generate_main_characters(&client, &outline, &s, 3).await;
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].age, "34");
        assert_eq!(main[0].relationships, "Ravi, Amma");
        assert_eq!(main[0].gender, "Unknown");
        assert_eq!(main[0].genre_archetypes, "Detective/Truth Seeker");
        assert_eq!(main[0].genre_traits, "Observant and analytical, Emotionally expressive");
        assert_eq!(main[0].narrative_role, "Detective/Investigator");
        assert!(main[0].emotional_landscape.ends_with("with Emotionally strong and adaptive"));

        let supporting = generate_supporting_characters(&client, &outline, &main, &s, 5).await;
        assert_eq!(supporting.len(), 1);
        assert_eq!(supporting[0].genre_role, "Ally/Helper");
        assert_eq!(supporting[0].cultural_background, "From Kerala");
        assert_eq!(supporting[0].narrative_role, "Mystery Participant");
    }

    #[tokio::test]
    async fn unusable_cast_falls_back_to_placeholders() {
        let generator = FnGenerator::new(|_, _| async { Err("HTTP 500".to_string()) });
        let templates = PromptTemplates::new();
        let client = StageClient::new(&generator, &templates, Duration::from_secs(1));
        let s = settings(&["Satire"]);
        let outline = StoryOutline::default();

        let main = generate_main_characters(&client, &outline, &s, 2).await;
        assert_eq!(main.len(), 2);
        assert_eq!(main[1].name, "Character 2");
        assert_eq!(main[1].cultural_traits, "Typical of Kerala");
        assert_eq!(main[1].narrative_role, "Supporting Narrative Element");

        let supporting = generate_supporting_characters(&client, &outline, &main, &s, 3).await;
        assert_eq!(supporting.len(), 3);
        assert_eq!(supporting[2].name, "Supporting Character 3");
        assert_eq!(supporting[2].genre_role, "Comic Relief or Emotional Support");
        assert_eq!(supporting[0].relationship_to_main_characters, "Acquaintance");
    }
}
