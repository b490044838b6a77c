//! Progress reporting for a [`StoryPipeline`](crate::pipeline::StoryPipeline)
//! run.
//!
//! The pipeline reports each stage through [`ProgressEvent`] variants.
//! Handlers observe; they never influence control flow.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnProgressHandler`] | Quick closures, e.g. a progress bar |
//! | [`CompositeProgressHandler`] | Several handlers in order |

use crate::api::tracing::UsageTracker;
use tracing::{error, info};

// ── Events ─────────────────────────────────────────────────────────

/// Something that happened during a run.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    /// The run is starting.
    Started {
        trace_id: &'a str,
        plot_concept: &'a str,
        chapters: u32,
    },
    /// Outline and chapter stubs are ready.
    OutlineReady { title: &'a str, chapters: usize },
    MainCharactersReady { count: usize },
    SupportingCharactersReady { count: usize },
    /// Outline, characters and metadata were handed to storage.
    FoundationSaved,
    ChapterStarted { number: u32, total: u32 },
    ChapterCompleted {
        number: u32,
        total: u32,
        title: &'a str,
        /// The chapter is the fallback record, not model output.
        fallback: bool,
    },
    /// Persisting an artifact failed; the run continues.
    StorageFailed { artifact: &'a str, error: &'a str },
    Finished {
        chapters: usize,
        usage: &'a UsageTracker,
    },
}

impl ProgressEvent<'_> {
    /// Overall completion in `0.0..=1.0` for events that mark progress.
    ///
    /// The foundation stages take the first 40%, chapter `i` of `N` starts at
    /// `0.5 + (i - 1) * 0.5 / N`.
    pub fn fraction(&self) -> Option<f32> {
        match self {
            ProgressEvent::OutlineReady { .. } => Some(0.1),
            ProgressEvent::MainCharactersReady { .. } => Some(0.2),
            ProgressEvent::SupportingCharactersReady { .. } => Some(0.3),
            ProgressEvent::FoundationSaved => Some(0.4),
            ProgressEvent::ChapterStarted { number, total } if *total > 0 => {
                Some(0.5 + (number.saturating_sub(1)) as f32 * 0.5 / *total as f32)
            }
            ProgressEvent::Finished { .. } => Some(1.0),
            _ => None,
        }
    }
}

// ── Handlers ───────────────────────────────────────────────────────

/// Observer of pipeline progress.
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl ProgressHandler for NoopHandler {}

/// A progress handler backed by a closure.
///
/// ```
/// use katha_rs::events::{FnProgressHandler, ProgressEvent, ProgressHandler};
///
/// let handler = FnProgressHandler::new(|event| {
///     if let Some(f) = event.fraction() {
///         eprintln!("{:>3}%", (f * 100.0) as u32);
///     }
/// });
/// handler.on_progress(&ProgressEvent::FoundationSaved);
/// ```
pub struct FnProgressHandler<F>(F)
where
    F: Fn(&ProgressEvent<'_>) + Send + Sync;

impl<F> FnProgressHandler<F>
where
    F: Fn(&ProgressEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ProgressHandler for FnProgressHandler<F>
where
    F: Fn(&ProgressEvent<'_>) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches each event to several handlers in registration order.
#[derive(Default)]
pub struct CompositeProgressHandler {
    handlers: Vec<Box<dyn ProgressHandler>>,
}

impl CompositeProgressHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl ProgressHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl ProgressHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl ProgressHandler for CompositeProgressHandler {
    fn on_progress(&self, event: &ProgressEvent<'_>) {
        for handler in &self.handlers {
            handler.on_progress(event);
        }
    }
}

/// Logs every event via `tracing`.
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent<'_>) {
        let pct = event
            .fraction()
            .map(|f| format!("[{:>3}%] ", (f * 100.0).round() as u32))
            .unwrap_or_default();
        match event {
            ProgressEvent::Started {
                trace_id,
                plot_concept,
                chapters,
            } => {
                let preview: String = plot_concept.chars().take(80).collect();
                info!("[{trace_id}] Generating {chapters} chapter(s): {preview}");
            }
            ProgressEvent::OutlineReady { title, chapters } => {
                info!("{pct}Outline ready: \"{title}\" with {chapters} chapter stub(s)");
            }
            ProgressEvent::MainCharactersReady { count } => {
                info!("{pct}{count} main character(s)");
            }
            ProgressEvent::SupportingCharactersReady { count } => {
                info!("{pct}{count} supporting character(s)");
            }
            ProgressEvent::FoundationSaved => info!("{pct}Story foundation saved"),
            ProgressEvent::ChapterStarted { number, total } => {
                info!("{pct}Generating chapter {number}/{total}");
            }
            ProgressEvent::ChapterCompleted {
                number,
                total,
                title,
                fallback,
            } => {
                if *fallback {
                    info!("Chapter {number}/{total} used the fallback record");
                } else {
                    info!("Chapter {number}/{total} complete: \"{title}\"");
                }
            }
            ProgressEvent::StorageFailed { artifact, error } => {
                error!("Failed to save {artifact}: {error}");
            }
            ProgressEvent::Finished { chapters, usage } => {
                info!("{pct}Story complete: {chapters} chapter(s), {}", usage.summary());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn fractions() {
        assert_eq!(ProgressEvent::OutlineReady { title: "t", chapters: 4 }.fraction(), Some(0.1));
        assert_eq!(ProgressEvent::FoundationSaved.fraction(), Some(0.4));
        assert_eq!(
            ProgressEvent::ChapterStarted { number: 1, total: 4 }.fraction(),
            Some(0.5)
        );
        assert_eq!(
            ProgressEvent::ChapterStarted { number: 3, total: 4 }.fraction(),
            Some(0.75)
        );
        assert_eq!(
            ProgressEvent::StorageFailed { artifact: "x", error: "y" }.fraction(),
            None
        );
    }

    #[test]
    fn composite_dispatches_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&seen), Arc::clone(&seen));
        let handler = CompositeProgressHandler::new()
            .with(FnProgressHandler::new(move |_| a.lock().unwrap().push("a")))
            .with_if(false, NoopHandler)
            .with(FnProgressHandler::new(move |_| b.lock().unwrap().push("b")));
        handler.on_progress(&ProgressEvent::FoundationSaved);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }
}
