//! Whole-story exports: a reading copy in Markdown and a narration script.

use super::StoryStorage;
use crate::story::{Chapter, Character, StoryMetadata, StoryOutline};
use std::fmt::Write;
use tracing::info;

const RULE: &str = "==================================================";

fn file_stem(outline: &StoryOutline) -> String {
    let title = if outline.title.trim().is_empty() {
        "Untitled Story"
    } else {
        outline.title.as_str()
    };
    title.replace(' ', "_")
}

fn load_chapters(storage: &dyn StoryStorage) -> Result<Vec<Chapter>, String> {
    let mut chapters = Vec::new();
    for number in storage.chapter_numbers()? {
        if let Some(mut chapter) = storage.load_chapter(number)? {
            chapter.chapter_number = number;
            chapters.push(chapter);
        }
    }
    Ok(chapters)
}

/// Render the full story as Markdown. Chapters appear in the given order.
pub fn render_full_story(
    outline: &StoryOutline,
    metadata: Option<&StoryMetadata>,
    chapters: &[Chapter],
    interactive: bool,
) -> String {
    let mut out = String::new();
    let _ = write!(out, "# {}\n\n", outline.title);
    let _ = write!(out, "*{}*\n\n", outline.setting);
    let _ = write!(out, "**Theme**: {}\n\n", outline.theme);
    if let Some(metadata) = metadata {
        let settings = &metadata.settings;
        let _ = write!(out, "**Genres**: {}\n\n", settings.genres_text());
        let _ = write!(
            out,
            "**Narrative Style**: Tone: {}, Pacing: {}\n\n",
            settings.narrative_tone, settings.narrative_pacing
        );
    }
    let _ = write!(out, "{}\n\n---\n\n", outline.synopsis);

    for chapter in chapters {
        let _ = write!(
            out,
            "## Chapter {}: {}\n\n{}\n\n",
            chapter.chapter_number, chapter.title, chapter.content
        );
        if interactive {
            out.push_str("\n*Decision points would appear here in the interactive version.*\n\n");
        }
        out.push_str("---\n\n");
    }
    out
}

/// Render a narration script with speaker and pause cues.
///
/// Paragraphs containing a quotation mark are cued as dialogue, the rest as
/// narration.
pub fn render_audiobook_script(
    outline: &StoryOutline,
    metadata: Option<&StoryMetadata>,
    main_characters: &[Character],
    chapters: &[Chapter],
) -> String {
    let mut out = String::new();
    let _ = write!(out, "AUDIOBOOK SCRIPT: {}\n{RULE}\n\n", outline.title);

    out.push_str("NARRATION NOTES:\n");
    let genres = metadata
        .map(|m| m.settings.genres_text())
        .unwrap_or_default();
    let _ = writeln!(out, "- This story combines elements of {genres}");
    if let Some(metadata) = metadata {
        let settings = &metadata.settings;
        let _ = writeln!(out, "- Set in {}", settings.region);
        let _ = writeln!(out, "- Narrative Tone: {}", settings.narrative_tone);
        let _ = writeln!(out, "- Narrative Pacing: {}", settings.narrative_pacing);
    }
    out.push_str("- Pronunciation guide included with character names\n\n");
    let _ = write!(out, "{RULE}\n\n");

    out.push_str("INTRODUCTION:\n");
    let _ = write!(out, "[NARRATOR, CALM VOICE] {}.\n\n", outline.title);
    out.push_str("[PAUSE 2s]\n\n");
    let _ = write!(out, "[NARRATOR] {}\n\n{RULE}\n\n", outline.synopsis);

    if !main_characters.is_empty() {
        out.push_str("CHARACTER PRONUNCIATION GUIDE:\n");
        for character in main_characters {
            let _ = writeln!(out, "- {}: [Standard pronunciation]", character.name);
        }
        out.push('\n');
    }

    for chapter in chapters {
        let n = chapter.chapter_number;
        let _ = write!(out, "CHAPTER {n}: {}\n{RULE}\n\n", chapter.title);
        let _ = write!(out, "[NARRATOR] Chapter {n}. {}\n\n", chapter.title);
        out.push_str("[PAUSE 1s]\n\n");
        for para in chapter.content.split("\n\n").filter(|p| !p.trim().is_empty()) {
            let cue = if para.contains(['"', '\u{201c}', '\u{201d}']) {
                "DIALOGUE"
            } else {
                "NARRATOR"
            };
            let _ = write!(out, "[{cue}] {para}\n\n");
        }
        let _ = write!(out, "[PAUSE 2s]\n\n{RULE}\n\n");
    }
    out
}

/// Export the saved story as `<Title>_full.md`, returning its location.
///
/// Chapters are ordered by number.
pub fn export_full_story(storage: &dyn StoryStorage, interactive: bool) -> Result<String, String> {
    let outline = storage
        .load_outline()?
        .ok_or("no story outline saved; nothing to export")?;
    let metadata = storage.load_metadata()?;
    let chapters = load_chapters(storage)?;
    let text = render_full_story(&outline, metadata.as_ref(), &chapters, interactive);
    let location = storage.write_export(&format!("{}_full.md", file_stem(&outline)), &text)?;
    info!("Exported {} chapter(s) to {location}", chapters.len());
    Ok(location)
}

/// Export the saved story as `<Title>_audiobook.txt`, returning its location.
pub fn export_audiobook_script(storage: &dyn StoryStorage) -> Result<String, String> {
    let outline = storage
        .load_outline()?
        .ok_or("no story outline saved; nothing to export")?;
    let metadata = storage.load_metadata()?;
    let cast = storage.load_characters()?.unwrap_or_default();
    let chapters = load_chapters(storage)?;
    let text = render_audiobook_script(
        &outline,
        metadata.as_ref(),
        &cast.main_characters,
        &chapters,
    );
    let location =
        storage.write_export(&format!("{}_audiobook.txt", file_stem(&outline)), &text)?;
    info!("Exported audiobook script to {location}");
    Ok(location)
}
