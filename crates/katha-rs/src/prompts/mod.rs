//! Stage prompt templates.
//!
//! Prompt text is configuration: every [`PromptStage`] has a default
//! template, and any of them can be replaced from a JSON file mapping the
//! stage's snake_case name to template text.
//!
//! Templates use `{name}` placeholders filled from [`PromptVars`]. `{{` and
//! `}}` render as literal braces; a brace that does not open a placeholder is
//! kept as-is, so JSON examples inside a template survive rendering.
//! Substituted values are never rescanned.

mod defaults;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

// ── Stages ─────────────────────────────────────────────────────────

/// A generation stage with its own prompt template.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PromptStage {
    Foundation,
    ChapterOutline,
    MainCharacters,
    SupportingCharacters,
    ChapterGeneration,
    DecisionPoints,
    BranchGeneration,
    ElementSuggestions,
    GenreBlend,
}

impl PromptStage {
    pub const ALL: [PromptStage; 9] = [
        PromptStage::Foundation,
        PromptStage::ChapterOutline,
        PromptStage::MainCharacters,
        PromptStage::SupportingCharacters,
        PromptStage::ChapterGeneration,
        PromptStage::DecisionPoints,
        PromptStage::BranchGeneration,
        PromptStage::ElementSuggestions,
        PromptStage::GenreBlend,
    ];

    /// Snake_case name, as used in override files and usage reports.
    pub fn name(self) -> &'static str {
        match self {
            PromptStage::Foundation => "foundation",
            PromptStage::ChapterOutline => "chapter_outline",
            PromptStage::MainCharacters => "main_characters",
            PromptStage::SupportingCharacters => "supporting_characters",
            PromptStage::ChapterGeneration => "chapter_generation",
            PromptStage::DecisionPoints => "decision_points",
            PromptStage::BranchGeneration => "branch_generation",
            PromptStage::ElementSuggestions => "element_suggestions",
            PromptStage::GenreBlend => "genre_blend",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    fn default_template(self) -> &'static str {
        match self {
            PromptStage::Foundation => defaults::FOUNDATION,
            PromptStage::ChapterOutline => defaults::CHAPTER_OUTLINE,
            PromptStage::MainCharacters => defaults::MAIN_CHARACTERS,
            PromptStage::SupportingCharacters => defaults::SUPPORTING_CHARACTERS,
            PromptStage::ChapterGeneration => defaults::CHAPTER_GENERATION,
            PromptStage::DecisionPoints => defaults::DECISION_POINTS,
            PromptStage::BranchGeneration => defaults::BRANCH_GENERATION,
            PromptStage::ElementSuggestions => defaults::ELEMENT_SUGGESTIONS,
            PromptStage::GenreBlend => defaults::GENRE_BLEND,
        }
    }
}

impl std::fmt::Display for PromptStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Variables ──────────────────────────────────────────────────────

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    values: BTreeMap<String, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain text value.
    pub fn text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Set a list value, comma-joined.
    pub fn list(self, key: &str, items: &[String]) -> Self {
        let joined = items.join(", ");
        self.text(key, joined)
    }

    /// Set a structured value, pretty-printed as JSON.
    pub fn json<T: Serialize + ?Sized>(self, key: &str, value: &T) -> Self {
        let encoded = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            warn!("could not encode prompt variable {key}: {e}");
            String::new()
        });
        self.text(key, encoded)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

// ── Rendering ──────────────────────────────────────────────────────

/// Fill `{name}` placeholders in `template` from `vars`.
///
/// Fails on a placeholder with no value.
pub fn render(template: &str, vars: &PromptVars) -> Result<String, String> {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        let (before, tail) = rest.split_at(pos);
        out.push_str(before);
        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
            continue;
        }
        if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
            continue;
        }
        if let Some(inner) = tail.strip_prefix('{') {
            let (ident, after) = inner.split_at(ident_len(inner));
            if !ident.is_empty()
                && let Some(after) = after.strip_prefix('}')
            {
                let value = vars
                    .get(ident)
                    .ok_or_else(|| format!("missing prompt variable `{ident}`"))?;
                out.push_str(value);
                rest = after;
                continue;
            }
        }
        // A lone brace; both brace characters are one byte.
        let (brace, after) = tail.split_at(1);
        out.push_str(brace);
        rest = after;
    }
    out.push_str(rest);
    Ok(out)
}

fn ident_len(s: &str) -> usize {
    s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len())
}

/// Names of all placeholders in `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        let (_, tail) = rest.split_at(pos);
        if let Some(after) = tail.strip_prefix("{{") {
            rest = after;
            continue;
        }
        let inner = tail.strip_prefix('{').unwrap_or(tail);
        let (ident, after) = inner.split_at(ident_len(inner));
        if !ident.is_empty() && after.starts_with('}') && !names.iter().any(|n| n == ident) {
            names.push(ident.to_string());
        }
        rest = inner;
    }
    names
}

// ── Templates ──────────────────────────────────────────────────────

/// The template set used by a run.
#[derive(Debug, Clone, Default)]
pub struct PromptTemplates {
    overrides: HashMap<PromptStage, String>,
}

impl PromptTemplates {
    /// Built-in templates for every stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the template for one stage (builder pattern).
    pub fn with_override(mut self, stage: PromptStage, template: impl Into<String>) -> Self {
        self.overrides.insert(stage, template.into());
        self
    }

    /// Load overrides from a JSON object of `{"stage_name": "template"}`.
    ///
    /// Unknown stage names are rejected. An override that drops a placeholder
    /// present in the built-in template is accepted with a warning.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read prompt overrides {}: {e}", path.display()))?;
        let raw: BTreeMap<String, String> = serde_json::from_str(&text)
            .map_err(|e| format!("invalid prompt overrides {}: {e}", path.display()))?;

        let mut templates = Self::new();
        for (name, template) in raw {
            let stage = PromptStage::from_name(&name)
                .ok_or_else(|| format!("unknown prompt stage `{name}` in {}", path.display()))?;
            let given = placeholders(&template);
            for expected in placeholders(stage.default_template()) {
                if !given.contains(&expected) {
                    warn!("prompt override for {stage} does not use {{{expected}}}");
                }
            }
            debug!("Loaded prompt override for {stage} ({} chars)", template.len());
            templates = templates.with_override(stage, template);
        }
        Ok(templates)
    }

    pub fn get(&self, stage: PromptStage) -> &str {
        self.overrides
            .get(&stage)
            .map(String::as_str)
            .unwrap_or_else(|| stage.default_template())
    }

    /// Render the template for `stage`.
    pub fn render(&self, stage: PromptStage, vars: &PromptVars) -> Result<String, String> {
        render(self.get(stage), vars).map_err(|e| format!("{stage} prompt: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_placeholders_and_escapes() {
        let vars = PromptVars::new().text("region", "Kerala").text("n", "3");
        let out = render("Set in {region}; {{literal}} {n} chapters", &vars).unwrap();
        assert_eq!(out, "Set in Kerala; {literal} 3 chapters");
    }

    #[test]
    fn json_braces_pass_through() {
        let vars = PromptVars::new().text("x", "1");
        let out = render(r#"Example: {"a": {x}}"#, &vars).unwrap();
        assert_eq!(out, r#"Example: {"a": 1}"#);
    }

    #[test]
    fn values_are_not_rescanned() {
        let vars = PromptVars::new()
            .text("a", "{b}")
            .text("b", "oops");
        assert_eq!(render("{a}", &vars).unwrap(), "{b}");
    }

    #[test]
    fn missing_variable_is_an_error() {
        let err = render("Hello {name}", &PromptVars::new()).unwrap_err();
        assert!(err.contains("name"));
    }

    #[test]
    fn list_and_json_values() {
        let vars = PromptVars::new()
            .list("genres", &["Mystery".to_string(), "Drama".to_string()])
            .json("outline", &serde_json::json!({"title": "T"}));
        assert_eq!(vars.get("genres"), Some("Mystery, Drama"));
        assert!(vars.get("outline").unwrap().contains("\"title\": \"T\""));
    }

    #[test]
    fn placeholder_scan() {
        let names = placeholders("{a} {{b}} {c} {a} {\"d\"}");
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn every_default_template_mentions_format_or_schema() {
        for stage in PromptStage::ALL {
            let names = placeholders(stage.default_template());
            assert!(
                names.iter().any(|n| n == "format_instructions"),
                "{stage} template has no format instructions"
            );
            assert_eq!(PromptStage::from_name(stage.name()), Some(stage));
        }
    }

    #[test]
    fn overrides_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        std::fs::write(
            &path,
            r#"{"foundation": "Outline {plot_concept}. {format_instructions}"}"#,
        )
        .unwrap();
        let templates = PromptTemplates::from_file(&path).unwrap();
        let vars = PromptVars::new()
            .text("plot_concept", "a heist")
            .text("format_instructions", "JSON please");
        assert_eq!(
            templates.render(PromptStage::Foundation, &vars).unwrap(),
            "Outline a heist. JSON please"
        );
        assert_eq!(
            templates.get(PromptStage::ChapterOutline),
            PromptStage::ChapterOutline.default_template()
        );
    }

    #[test]
    fn unknown_override_stage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        std::fs::write(&path, r#"{"epilogue": "x"}"#).unwrap();
        let err = PromptTemplates::from_file(&path).unwrap_err();
        assert!(err.contains("epilogue"));
    }
}
