//! The generation pipeline.
//!
//! A run moves through fixed stages:
//!
//! ```text
//! Idle → FoundationGenerated → MainCharactersGenerated
//!      → SupportingCharactersGenerated → ChapterLoop { next } → Complete
//! ```
//!
//! [`StoryPipeline::start`] runs everything up to the chapter loop and
//! persists the foundation. The returned [`StorySession`] then generates
//! chapters strictly in order, one [`StorySession::run_chapter`] call at a
//! time; [`StoryPipeline::run`] drives a whole story in one call.
//!
//! Chapter `i` is generated from the context the session's
//! [`ContextStore`] holds for chapters `1..i`, is persisted, and is then
//! folded into the store. Nothing inside a run aborts the chapter loop:
//! unusable model output becomes a fallback record, and storage failures are
//! logged and collected in [`StoryRun::storage_failures`].

use crate::api::tracing::{UsageTracker, generate_trace_id};
use crate::catalog::{self, StoryElementSuggestions};
use crate::config::{DEFAULT_CHAPTERS, DEFAULT_LANGUAGE, StoryConfig};
use crate::context::{ContextBundle, ContextStore};
use crate::events::{NoopHandler, ProgressEvent, ProgressHandler};
use crate::generator::Generator;
use crate::genre::GenreEmphasis;
use crate::prompts::PromptTemplates;
use crate::storage::{Cast, FileStorage, MemoryStorage, StoryStorage};
use crate::story::chapters::generate_chapter;
use crate::story::characters::{generate_main_characters, generate_supporting_characters};
use crate::story::foundation::{blend_genres, generate_outline};
use crate::story::{
    Branch, Chapter, ChapterRequest, Character, DecisionPoint, GenreDecision,
    InteractiveSession, StageClient, StoryMetadata, StoryOutline, StorySettings,
    SupportingCharacter,
};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

// ── Request ────────────────────────────────────────────────────────

/// What story to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRequest {
    pub plot_concept: String,
    /// Replaces the generated title when non-empty.
    pub title_override: Option<String>,
    pub region: String,
    pub narrative_tone: String,
    pub narrative_pacing: String,
    pub genres: Vec<String>,
    pub chapter_count: u32,
    pub language: String,
}

impl StoryRequest {
    /// A request with the default region, tone, pacing, chapter count and
    /// language, and no genres yet.
    pub fn new(plot_concept: impl Into<String>) -> Self {
        Self {
            plot_concept: plot_concept.into(),
            title_override: None,
            region: catalog::DEFAULT_REGION.to_string(),
            narrative_tone: catalog::TONES[0].to_string(),
            narrative_pacing: catalog::PACING[0].to_string(),
            genres: Vec::new(),
            chapter_count: DEFAULT_CHAPTERS,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title_override = Some(title.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.narrative_tone = tone.into();
        self
    }

    pub fn with_pacing(mut self, pacing: impl Into<String>) -> Self {
        self.narrative_pacing = pacing.into();
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_chapters(mut self, count: u32) -> Self {
        self.chapter_count = count;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Check the request and normalize its genres: trimmed, blanks dropped,
    /// duplicates removed keeping the first occurrence.
    pub fn validate(mut self) -> Result<Self, String> {
        if self.plot_concept.trim().is_empty() {
            return Err("plot concept must not be empty".into());
        }
        if self.chapter_count == 0 {
            return Err("a story needs at least one chapter".into());
        }
        let mut genres: Vec<String> = Vec::with_capacity(self.genres.len());
        for genre in self.genres.iter().map(|g| g.trim()) {
            if !genre.is_empty() && !genres.iter().any(|g| g == genre) {
                genres.push(genre.to_string());
            }
        }
        if genres.is_empty() {
            return Err("at least one genre is required".into());
        }
        self.genres = genres;
        Ok(self)
    }

    pub fn settings(&self) -> StorySettings {
        StorySettings {
            region: self.region.clone(),
            narrative_tone: self.narrative_tone.clone(),
            narrative_pacing: self.narrative_pacing.clone(),
            genres: self.genres.clone(),
            language: self.language.clone(),
        }
    }
}

// ── State and results ──────────────────────────────────────────────

/// Where a run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    FoundationGenerated,
    MainCharactersGenerated,
    SupportingCharactersGenerated,
    /// Chapters before `next` are done.
    ChapterLoop { next: u32 },
    Complete,
}

/// Everything a finished (or stopped) run produced.
#[derive(Debug, Clone)]
pub struct StoryRun {
    pub trace_id: String,
    pub outline: StoryOutline,
    pub main_characters: Vec<Character>,
    pub supporting_characters: Vec<SupportingCharacter>,
    pub chapters: Vec<Chapter>,
    pub metadata: StoryMetadata,
    /// One entry per artifact that could not be persisted.
    pub storage_failures: Vec<String>,
    pub usage: UsageTracker,
}

/// Result of branching a saved chapter.
#[derive(Debug, Clone)]
pub struct BranchRun {
    pub decision_points: Vec<DecisionPoint>,
    pub branches: Vec<Branch>,
    pub history: BTreeMap<String, GenreDecision>,
    pub storage_failures: Vec<String>,
    pub usage: UsageTracker,
}

enum StorageSlot<'a> {
    Borrowed(&'a dyn StoryStorage),
    File(FileStorage),
    Memory(MemoryStorage),
}

impl StorageSlot<'_> {
    fn get(&self) -> &dyn StoryStorage {
        match self {
            StorageSlot::Borrowed(s) => *s,
            StorageSlot::File(s) => s,
            StorageSlot::Memory(s) => s,
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

/// Drives story generation against a [`Generator`].
///
/// Without [`with_storage`](Self::with_storage), each story is saved under
/// `config.output_dir` in a directory named after its title.
pub struct StoryPipeline<'a> {
    generator: &'a dyn Generator,
    config: StoryConfig,
    templates: PromptTemplates,
    handler: &'a dyn ProgressHandler,
    storage: Option<&'a dyn StoryStorage>,
}

impl<'a> StoryPipeline<'a> {
    /// Validate `config` and load its prompt overrides.
    pub fn new(generator: &'a dyn Generator, config: StoryConfig) -> Result<Self, String> {
        config.validate()?;
        let templates = match &config.prompt_overrides {
            Some(path) => PromptTemplates::from_file(path)?,
            None => PromptTemplates::new(),
        };
        Ok(Self {
            generator,
            config,
            templates,
            handler: &NoopHandler,
            storage: None,
        })
    }

    pub fn with_progress_handler(mut self, handler: &'a dyn ProgressHandler) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_storage(mut self, storage: &'a dyn StoryStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    fn client(&self) -> StageClient<'_> {
        StageClient::new(
            self.generator,
            &self.templates,
            self.config.generation_timeout,
        )
    }

    /// Generate a complete story.
    pub async fn run(&self, request: StoryRequest) -> Result<StoryRun, String> {
        let mut session = self.start(request).await?;
        session.run_to_end().await?;
        Ok(session.finish())
    }

    /// Generate and persist the foundation: outline, chapter stubs, genre
    /// blend, main and supporting characters, metadata.
    pub async fn start(&self, request: StoryRequest) -> Result<StorySession<'_>, String> {
        let request = request.validate()?;
        let settings = request.settings();
        let trace_id = generate_trace_id();
        let client = self.client();
        let total = request.chapter_count;
        let mut state = PipelineState::Idle;

        self.handler.on_progress(&ProgressEvent::Started {
            trace_id: &trace_id,
            plot_concept: &request.plot_concept,
            chapters: total,
        });

        let mut outline = generate_outline(
            &client,
            &request.plot_concept,
            request.title_override.as_deref(),
            &settings,
            total,
        )
        .await;
        if settings.genres.len() > 1 {
            outline.genre_blend = Some(blend_genres(&client, &settings).await);
        }
        state = advance(state, PipelineState::FoundationGenerated);
        self.handler.on_progress(&ProgressEvent::OutlineReady {
            title: &outline.title,
            chapters: outline.chapters.len(),
        });

        let main_characters = generate_main_characters(
            &client,
            &outline,
            &settings,
            self.config.main_characters,
        )
        .await;
        state = advance(state, PipelineState::MainCharactersGenerated);
        self.handler.on_progress(&ProgressEvent::MainCharactersReady {
            count: main_characters.len(),
        });

        let supporting_characters = generate_supporting_characters(
            &client,
            &outline,
            &main_characters,
            &settings,
            self.config.supporting_characters,
        )
        .await;
        state = advance(state, PipelineState::SupportingCharactersGenerated);
        self.handler.on_progress(&ProgressEvent::SupportingCharactersReady {
            count: supporting_characters.len(),
        });

        let metadata = StoryMetadata {
            title: outline.title.clone(),
            plot_concept: request.plot_concept.clone(),
            settings: settings.clone(),
            chapter_count: total,
            trace_id: trace_id.clone(),
            created_at: Utc::now(),
        };

        let mut storage_failures = Vec::new();
        let storage = match self.storage {
            Some(storage) => StorageSlot::Borrowed(storage),
            None => match FileStorage::for_story(&self.config.output_dir, &outline.title) {
                Ok(storage) => {
                    info!("Saving story to {}", storage.dir().display());
                    StorageSlot::File(storage)
                }
                Err(e) => {
                    error!("{e}; keeping the story in memory only");
                    storage_failures.push(format!("story directory: {e}"));
                    StorageSlot::Memory(MemoryStorage::new())
                }
            },
        };

        let mut session = StorySession {
            pipeline: self,
            client,
            storage,
            store: ContextStore::new(self.config.context).map_err(|e| e.to_string())?,
            state: advance(state, PipelineState::ChapterLoop { next: 1 }),
            request,
            settings,
            outline,
            main_characters,
            supporting_characters,
            chapters: Vec::new(),
            metadata,
            storage_failures,
        };
        session.save_foundation();
        Ok(session)
    }

    /// Story element suggestions for `plot_concept`.
    pub async fn suggest(&self, plot_concept: &str) -> StoryElementSuggestions {
        catalog::suggest_story_elements(&self.client(), plot_concept).await
    }

    /// Generate decision points for saved chapter `chapter_number` and the
    /// branches that follow them, saving each branch.
    ///
    /// With `choice_id`, only that choice's branch is generated and recorded
    /// as the decision taken; otherwise every choice of every decision point
    /// gets a branch.
    pub async fn branch_chapter(
        &self,
        storage: &dyn StoryStorage,
        chapter_number: u32,
        choice_id: Option<&str>,
    ) -> Result<BranchRun, String> {
        let metadata = storage
            .load_metadata()?
            .ok_or("story metadata not found; was the story generated?")?;
        let outline = storage.load_outline()?.unwrap_or_default();
        let cast = storage.load_characters()?.unwrap_or_default();
        let mut chapter = storage
            .load_chapter(chapter_number)?
            .ok_or_else(|| format!("chapter {chapter_number} not found"))?;
        chapter.chapter_number = chapter_number;

        let client = self.client();
        let mut session = InteractiveSession::new(outline, cast.main_characters, metadata.settings);
        let decision_points = session
            .generate_decision_points(&client, &chapter, self.config.decision_points)
            .await;

        let branches = match choice_id {
            Some(choice_id) => {
                let point = decision_points
                    .iter()
                    .find(|p| p.choice(choice_id).is_some())
                    .ok_or_else(|| {
                        let known: Vec<&str> = decision_points
                            .iter()
                            .flat_map(|p| p.choices.iter().map(|c| c.choice_id.as_str()))
                            .collect();
                        format!(
                            "choice {choice_id} not offered for chapter {chapter_number}; \
                             available: {}",
                            known.join(", ")
                        )
                    })?;
                vec![
                    session
                        .generate_branch(&client, &chapter, point, choice_id)
                        .await?,
                ]
            }
            None => {
                let mut all = Vec::new();
                for point in &decision_points {
                    all.extend(session.generate_branches(&client, &chapter, point).await);
                }
                all
            }
        };

        let mut storage_failures = Vec::new();
        for branch in &branches {
            if let Err(e) = storage.save_branch(branch, &branch.decision_point_id, &branch.choice_id)
            {
                let artifact = format!("branch {}/{}", branch.decision_point_id, branch.choice_id);
                self.handler.on_progress(&ProgressEvent::StorageFailed {
                    artifact: &artifact,
                    error: &e,
                });
                storage_failures.push(format!("{artifact}: {e}"));
            }
        }
        info!(
            "Chapter {chapter_number}: {} decision point(s), {} branch(es)",
            decision_points.len(),
            branches.len()
        );
        Ok(BranchRun {
            decision_points,
            branches,
            history: session.history().clone(),
            storage_failures,
            usage: client.usage(),
        })
    }
}

fn advance(from: PipelineState, to: PipelineState) -> PipelineState {
    tracing::debug!("Pipeline: {from:?} -> {to:?}");
    to
}

// ── Session ────────────────────────────────────────────────────────

/// A story in progress.
pub struct StorySession<'p> {
    pipeline: &'p StoryPipeline<'p>,
    client: StageClient<'p>,
    storage: StorageSlot<'p>,
    store: ContextStore,
    state: PipelineState,
    request: StoryRequest,
    settings: StorySettings,
    outline: StoryOutline,
    main_characters: Vec<Character>,
    supporting_characters: Vec<SupportingCharacter>,
    chapters: Vec<Chapter>,
    metadata: StoryMetadata,
    storage_failures: Vec<String>,
}

impl<'p> StorySession<'p> {
    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn outline(&self) -> &StoryOutline {
        &self.outline
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn context_store(&self) -> &ContextStore {
        &self.store
    }

    pub fn storage(&self) -> &dyn StoryStorage {
        self.storage.get()
    }

    fn persist(&mut self, artifact: &str, result: Result<(), String>) {
        if let Err(e) = result {
            self.pipeline
                .handler
                .on_progress(&ProgressEvent::StorageFailed {
                    artifact,
                    error: &e,
                });
            error!("Failed to save {artifact}: {e}");
            self.storage_failures.push(format!("{artifact}: {e}"));
        }
    }

    fn save_foundation(&mut self) {
        let storage = self.storage.get();
        let outline = storage.save_outline(&self.outline);
        let cast = storage.save_characters(&Cast {
            main_characters: self.main_characters.clone(),
            supporting_characters: self.supporting_characters.clone(),
        });
        let metadata = storage.save_metadata(&self.metadata);
        self.persist("story outline", outline);
        self.persist("characters", cast);
        self.persist("metadata", metadata);
        self.pipeline
            .handler
            .on_progress(&ProgressEvent::FoundationSaved);
    }

    /// Generate, persist and remember the next chapter.
    ///
    /// Returns `Ok(None)` once every chapter is done. Errors only on internal
    /// misuse of the context store, which leaves the session unchanged.
    pub async fn run_chapter(&mut self) -> Result<Option<&Chapter>, String> {
        let total = self.request.chapter_count;
        let number = match self.state {
            PipelineState::ChapterLoop { next } if next <= total => next,
            PipelineState::ChapterLoop { .. } => {
                self.state = advance(self.state, PipelineState::Complete);
                return Ok(None);
            }
            PipelineState::Complete => return Ok(None),
            other => return Err(format!("cannot generate chapters in state {other:?}")),
        };
        let handler = self.pipeline.handler;
        handler.on_progress(&ProgressEvent::ChapterStarted { number, total });

        let context = self.store.context_for_chapter(number).unwrap_or_else(|e| {
            warn!("No context for chapter {number}: {e}");
            ContextBundle::default()
        });
        let emphasis = GenreEmphasis::for_chapter(number, total, &self.settings.genres)?;
        let chapter = generate_chapter(
            &self.client,
            ChapterRequest {
                number,
                total,
                outline: &self.outline,
                main_characters: &self.main_characters,
                supporting_characters: &self.supporting_characters,
                context: &context,
                emphasis: &emphasis,
                settings: &self.settings,
            },
        )
        .await;

        let saved = self.storage.get().save_chapter(&chapter, number);
        self.persist(&format!("chapter {number}"), saved);
        self.store
            .update_with_chapter(&chapter, number)
            .map_err(|e| e.to_string())?;

        handler.on_progress(&ProgressEvent::ChapterCompleted {
            number,
            total,
            title: &chapter.title,
            fallback: chapter.is_fallback(),
        });
        self.state = advance(
            self.state,
            if number == total {
                PipelineState::Complete
            } else {
                PipelineState::ChapterLoop { next: number + 1 }
            },
        );
        self.chapters.push(chapter);
        Ok(self.chapters.last())
    }

    /// Generate chapters until chapter `last` (or the final chapter) is done.
    pub async fn run_until(&mut self, last: u32) -> Result<(), String> {
        while let PipelineState::ChapterLoop { next } = self.state {
            if next > last {
                break;
            }
            if self.run_chapter().await?.is_none() {
                break;
            }
        }
        Ok(())
    }

    pub async fn run_to_end(&mut self) -> Result<(), String> {
        self.run_until(self.request.chapter_count).await
    }

    /// Close the session and collect what it produced.
    pub fn finish(self) -> StoryRun {
        let usage = self.client.usage();
        self.pipeline.handler.on_progress(&ProgressEvent::Finished {
            chapters: self.chapters.len(),
            usage: &usage,
        });
        StoryRun {
            trace_id: self.metadata.trace_id.clone(),
            outline: self.outline,
            main_characters: self.main_characters,
            supporting_characters: self.supporting_characters,
            chapters: self.chapters,
            metadata: self.metadata,
            storage_failures: self.storage_failures,
            usage,
        }
    }
}
