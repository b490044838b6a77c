//! Story persistence.
//!
//! [`StoryStorage`] is the seam the pipeline saves through. Saves are
//! idempotent overwrites; loaders return `Ok(None)` when the artifact was
//! never saved.
//!
//! [`FileStorage`] lays a story out on disk as:
//!
//! ```text
//! <story_dir>/
//!   story_outline.json
//!   characters.json
//!   metadata.json
//!   chapters/chapter_1.json
//!   chapters/chapter_1.md
//!   branches/<decision_point>/<choice>.json
//!   branches/<decision_point>/<choice>.md
//! ```
//!
//! JSON files are written atomically (temp file + rename). The Markdown
//! files are reading copies and are never loaded back.

mod export;

pub use export::{
    export_audiobook_script, export_full_story, render_audiobook_script, render_full_story,
};

use crate::story::{Branch, Chapter, Character, StoryMetadata, StoryOutline, SupportingCharacter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Main and supporting characters, persisted together.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Cast {
    pub main_characters: Vec<Character>,
    pub supporting_characters: Vec<SupportingCharacter>,
}

/// Where a story's artifacts are kept.
pub trait StoryStorage: Send + Sync {
    fn save_outline(&self, outline: &StoryOutline) -> Result<(), String>;
    fn load_outline(&self) -> Result<Option<StoryOutline>, String>;

    fn save_characters(&self, cast: &Cast) -> Result<(), String>;
    fn load_characters(&self) -> Result<Option<Cast>, String>;

    fn save_metadata(&self, metadata: &StoryMetadata) -> Result<(), String>;
    fn load_metadata(&self) -> Result<Option<StoryMetadata>, String>;

    fn save_chapter(&self, chapter: &Chapter, number: u32) -> Result<(), String>;
    fn load_chapter(&self, number: u32) -> Result<Option<Chapter>, String>;
    /// Numbers of all saved chapters, ascending.
    fn chapter_numbers(&self) -> Result<Vec<u32>, String>;

    fn save_branch(
        &self,
        branch: &Branch,
        decision_point_id: &str,
        choice_id: &str,
    ) -> Result<(), String>;
    fn load_branch(&self, decision_point_id: &str, choice_id: &str)
    -> Result<Option<Branch>, String>;

    /// Store an export document named `file_name`, returning where it went.
    fn write_export(&self, file_name: &str, contents: &str) -> Result<String, String>;
}

/// Directory name for a story: alphanumerics and spaces kept, everything
/// else replaced by `_`, trimmed, spaces turned into `_`.
pub fn story_dir_name(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                '_'
            }
        })
        .collect();
    sanitized.trim().replace(' ', "_")
}

fn chapter_markdown(chapter: &Chapter) -> String {
    format!("# {}\n\n{}", chapter.title, chapter.content)
}

fn branch_markdown(branch: &Branch, choice_id: &str) -> String {
    let title = if branch.title.trim().is_empty() {
        format!("Branch for {choice_id}")
    } else {
        branch.title.clone()
    };
    format!("# {title}\n\n{}", branch.content)
}

// ── FileStorage ────────────────────────────────────────────────────

/// [`StoryStorage`] backed by one directory per story.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) the story directory `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, String> {
        let dir = dir.into();
        std::fs::create_dir_all(dir.join("chapters"))
            .map_err(|e| format!("Failed to create story dir {}: {e}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open the directory for the story titled `title` under `root`.
    pub fn for_story(root: &Path, title: &str) -> Result<Self, String> {
        Self::new(root.join(story_dir_name(title)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chapter_path(&self, number: u32, ext: &str) -> PathBuf {
        self.dir.join("chapters").join(format!("chapter_{number}.{ext}"))
    }

    fn branch_dir(&self, decision_point_id: &str) -> PathBuf {
        self.dir.join("branches").join(story_dir_name(decision_point_id))
    }

    fn branch_path(&self, decision_point_id: &str, choice_id: &str, ext: &str) -> PathBuf {
        self.branch_dir(decision_point_id)
            .join(format!("{}.{ext}", story_dir_name(choice_id)))
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), String> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| format!("Failed to serialize {}: {e}", path.display()))?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| format!("Failed to write {}: {e}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .map_err(|e| format!("Failed to rename {}: {e}", tmp_path.display()))?;
        debug!("Saved {}", path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, String> {
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let value = serde_json::from_str(&json)
            .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;
        Ok(Some(value))
    }

    fn write_text(&self, path: &Path, text: &str) -> Result<(), String> {
        std::fs::write(path, text).map_err(|e| format!("Failed to write {}: {e}", path.display()))
    }
}

impl StoryStorage for FileStorage {
    fn save_outline(&self, outline: &StoryOutline) -> Result<(), String> {
        self.write_json(&self.dir.join("story_outline.json"), outline)
    }

    fn load_outline(&self) -> Result<Option<StoryOutline>, String> {
        self.read_json(&self.dir.join("story_outline.json"))
    }

    fn save_characters(&self, cast: &Cast) -> Result<(), String> {
        self.write_json(&self.dir.join("characters.json"), cast)
    }

    fn load_characters(&self) -> Result<Option<Cast>, String> {
        self.read_json(&self.dir.join("characters.json"))
    }

    fn save_metadata(&self, metadata: &StoryMetadata) -> Result<(), String> {
        self.write_json(&self.dir.join("metadata.json"), metadata)
    }

    fn load_metadata(&self) -> Result<Option<StoryMetadata>, String> {
        self.read_json(&self.dir.join("metadata.json"))
    }

    fn save_chapter(&self, chapter: &Chapter, number: u32) -> Result<(), String> {
        std::fs::create_dir_all(self.dir.join("chapters"))
            .map_err(|e| format!("Failed to create chapters dir: {e}"))?;
        self.write_json(&self.chapter_path(number, "json"), chapter)?;
        self.write_text(&self.chapter_path(number, "md"), &chapter_markdown(chapter))
    }

    fn load_chapter(&self, number: u32) -> Result<Option<Chapter>, String> {
        self.read_json(&self.chapter_path(number, "json"))
    }

    fn chapter_numbers(&self) -> Result<Vec<u32>, String> {
        let dir = self.dir.join("chapters");
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries =
            std::fs::read_dir(&dir).map_err(|e| format!("Failed to read chapters dir: {e}"))?;

        let mut numbers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read entry: {e}"))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(number) = name
                .strip_prefix("chapter_")
                .and_then(|s| s.strip_suffix(".json"))
            {
                match number.parse::<u32>() {
                    Ok(n) => numbers.push(n),
                    Err(_) => warn!("Skipping unexpected chapter file {name}"),
                }
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }

    fn save_branch(
        &self,
        branch: &Branch,
        decision_point_id: &str,
        choice_id: &str,
    ) -> Result<(), String> {
        let dir = self.branch_dir(decision_point_id);
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create branch dir {}: {e}", dir.display()))?;
        self.write_json(&self.branch_path(decision_point_id, choice_id, "json"), branch)?;
        self.write_text(
            &self.branch_path(decision_point_id, choice_id, "md"),
            &branch_markdown(branch, choice_id),
        )
    }

    fn load_branch(
        &self,
        decision_point_id: &str,
        choice_id: &str,
    ) -> Result<Option<Branch>, String> {
        self.read_json(&self.branch_path(decision_point_id, choice_id, "json"))
    }

    fn write_export(&self, file_name: &str, contents: &str) -> Result<String, String> {
        let path = self.dir.join(file_name);
        self.write_text(&path, contents)?;
        Ok(path.display().to_string())
    }
}

// ── MemoryStorage ──────────────────────────────────────────────────

#[derive(Default)]
struct MemoryState {
    outline: Option<StoryOutline>,
    cast: Option<Cast>,
    metadata: Option<StoryMetadata>,
    chapters: BTreeMap<u32, Chapter>,
    branches: BTreeMap<(String, String), Branch>,
    exports: BTreeMap<String, String>,
}

/// [`StoryStorage`] held in memory.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, String> {
        self.state
            .lock()
            .map_err(|_| "memory storage lock poisoned".to_string())
    }

    /// Contents of a document stored with [`StoryStorage::write_export`].
    pub fn export(&self, file_name: &str) -> Option<String> {
        self.state().ok()?.exports.get(file_name).cloned()
    }
}

impl StoryStorage for MemoryStorage {
    fn save_outline(&self, outline: &StoryOutline) -> Result<(), String> {
        self.state()?.outline = Some(outline.clone());
        Ok(())
    }

    fn load_outline(&self) -> Result<Option<StoryOutline>, String> {
        Ok(self.state()?.outline.clone())
    }

    fn save_characters(&self, cast: &Cast) -> Result<(), String> {
        self.state()?.cast = Some(cast.clone());
        Ok(())
    }

    fn load_characters(&self) -> Result<Option<Cast>, String> {
        Ok(self.state()?.cast.clone())
    }

    fn save_metadata(&self, metadata: &StoryMetadata) -> Result<(), String> {
        self.state()?.metadata = Some(metadata.clone());
        Ok(())
    }

    fn load_metadata(&self) -> Result<Option<StoryMetadata>, String> {
        Ok(self.state()?.metadata.clone())
    }

    fn save_chapter(&self, chapter: &Chapter, number: u32) -> Result<(), String> {
        self.state()?.chapters.insert(number, chapter.clone());
        Ok(())
    }

    fn load_chapter(&self, number: u32) -> Result<Option<Chapter>, String> {
        Ok(self.state()?.chapters.get(&number).cloned())
    }

    fn chapter_numbers(&self) -> Result<Vec<u32>, String> {
        Ok(self.state()?.chapters.keys().copied().collect())
    }

    fn save_branch(
        &self,
        branch: &Branch,
        decision_point_id: &str,
        choice_id: &str,
    ) -> Result<(), String> {
        self.state()?.branches.insert(
            (decision_point_id.to_string(), choice_id.to_string()),
            branch.clone(),
        );
        Ok(())
    }

    fn load_branch(
        &self,
        decision_point_id: &str,
        choice_id: &str,
    ) -> Result<Option<Branch>, String> {
        let key = (decision_point_id.to_string(), choice_id.to_string());
        Ok(self.state()?.branches.get(&key).cloned())
    }

    fn write_export(&self, file_name: &str, contents: &str) -> Result<String, String> {
        self.state()?
            .exports
            .insert(file_name.to_string(), contents.to_string());
        Ok(file_name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OneOrMany;

    fn chapter(title: &str) -> Chapter {
        Chapter {
            chapter_number: 1,
            title: title.into(),
            content: "Rain on the tin roof.".into(),
            character_development: OneOrMany::One("Meera decides to stay.".into()),
            ..Default::default()
        }
    }

    #[test]
    fn dir_names_are_sanitized() {
        assert_eq!(story_dir_name("The Monsoon House"), "The_Monsoon_House");
        assert_eq!(story_dir_name("  Rain: A Story! "), "Rain__A_Story_");
        assert_eq!(story_dir_name("Dil/Se"), "Dil_Se");
    }

    #[test]
    fn file_storage_layout_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::for_story(dir.path(), "The Monsoon House").unwrap();
        let root = dir.path().join("The_Monsoon_House");
        assert_eq!(storage.dir(), root);

        storage.save_chapter(&chapter("Rain"), 1).unwrap();
        storage.save_chapter(&chapter("Flood"), 10).unwrap();
        storage.save_chapter(&chapter("Mud"), 2).unwrap();
        assert_eq!(storage.load_chapter(1).unwrap().unwrap().title, "Rain");
        assert_eq!(storage.chapter_numbers().unwrap(), vec![1, 2, 10]);
        assert_eq!(
            std::fs::read_to_string(root.join("chapters/chapter_1.md")).unwrap(),
            "# Rain\n\nRain on the tin roof."
        );
        assert!(!root.join("chapters/chapter_1.json.tmp").exists());
        assert!(storage.load_chapter(3).unwrap().is_none());
        assert!(storage.load_outline().unwrap().is_none());
    }

    #[test]
    fn overwrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        storage.save_chapter(&chapter("First"), 1).unwrap();
        storage.save_chapter(&chapter("Second"), 1).unwrap();
        storage.save_chapter(&chapter("Second"), 1).unwrap();
        assert_eq!(storage.load_chapter(1).unwrap().unwrap().title, "Second");
        assert_eq!(storage.chapter_numbers().unwrap(), vec![1]);
    }

    #[test]
    fn branches_are_nested_by_decision_point() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let branch = Branch {
            content: "The letter burns.".into(),
            ..Default::default()
        };
        storage.save_branch(&branch, "dp_1_1", "c_1_1_2").unwrap();

        let md = std::fs::read_to_string(dir.path().join("branches/dp_1_1/c_1_1_2.md")).unwrap();
        assert_eq!(md, "# Branch for c_1_1_2\n\nThe letter burns.");
        assert_eq!(
            storage.load_branch("dp_1_1", "c_1_1_2").unwrap(),
            Some(branch)
        );
        assert!(storage.load_branch("dp_1_1", "c_1_1_1").unwrap().is_none());
    }

    #[test]
    fn corrupt_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("characters.json"), "{not json").unwrap();
        let err = storage.load_characters().unwrap_err();
        assert!(err.contains("Failed to parse"));
    }

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        let cast = Cast {
            main_characters: vec![Character {
                name: "Meera".into(),
                ..Default::default()
            }],
            supporting_characters: Vec::new(),
        };
        storage.save_characters(&cast).unwrap();
        storage.save_chapter(&chapter("Two"), 2).unwrap();
        storage.save_chapter(&chapter("One"), 1).unwrap();
        assert_eq!(storage.load_characters().unwrap(), Some(cast));
        assert_eq!(storage.chapter_numbers().unwrap(), vec![1, 2]);
        storage.write_export("x.md", "body").unwrap();
        assert_eq!(storage.export("x.md").as_deref(), Some("body"));
    }
}
