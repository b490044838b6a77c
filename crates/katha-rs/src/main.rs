//! Generate, branch and export multi-chapter stories from the command line.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # A five-chapter mystery, saved under output/<title>/
//! katha generate --concept "A lighthouse keeper finds a letter from 1952" \
//!   --genres Mystery,Drama --chapters 5 --region south --export
//!
//! # Which genres, tones and pacing suit a concept?
//! katha suggest --concept "Two brothers split a river kingdom"
//!
//! # Decision points and branches for chapter 3 of a saved story
//! katha branch --story-dir output/The_Monsoon_House --chapter 3
//!
//! # Re-export a saved story, with the narration script
//! katha export --story-dir output/The_Monsoon_House --audiobook
//! ```

use clap::{Args, Parser, Subcommand};
use katha_rs::OpenRouterClient;
use katha_rs::api::RetryConfig;
use katha_rs::catalog::{self, GENRES, PACING, TONES};
use katha_rs::config::{ContextConfig, DEFAULT_CHAPTERS, DEFAULT_LANGUAGE, DEFAULT_MODEL, StoryConfig};
use katha_rs::events::LoggingHandler;
use katha_rs::generator::OpenRouterGenerator;
use katha_rs::pipeline::{StoryPipeline, StoryRequest};
use katha_rs::storage::{FileStorage, export_audiobook_script, export_full_story};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Multi-chapter story generator.
///
/// Reads the API key from the OPENROUTER_KEY environment variable.
#[derive(Parser)]
#[command(name = "katha", version)]
struct Cli {
    /// Model used for every generation stage
    #[arg(long, global = true, default_value = DEFAULT_MODEL)]
    model: String,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a complete story
    Generate(GenerateArgs),
    /// Suggest genres, tones and pacing for a plot concept
    Suggest {
        /// The plot concept
        #[arg(long)]
        concept: String,
    },
    /// Generate decision points and branches for a saved chapter
    Branch {
        /// Directory of a generated story
        #[arg(long)]
        story_dir: PathBuf,

        /// Chapter to branch from
        #[arg(long)]
        chapter: u32,

        /// Only generate the branch for this choice id (e.g. c_3_1_2)
        #[arg(long)]
        choice: Option<String>,

        /// Decision points to generate
        #[arg(long, default_value_t = 1)]
        decision_points: u32,
    },
    /// Export a saved story as Markdown and optionally an audiobook script
    Export {
        /// Directory of a generated story
        #[arg(long)]
        story_dir: PathBuf,

        /// Mark decision point positions in the Markdown export
        #[arg(long)]
        interactive: bool,

        /// Also write the narration script
        #[arg(long)]
        audiobook: bool,
    },
}

#[derive(Args)]
struct GenerateArgs {
    // ── Story ──────────────────────────────────────────────────
    /// The plot concept
    #[arg(long)]
    concept: String,

    /// Use this title instead of the generated one
    #[arg(long)]
    title: Option<String>,

    /// Region (North, South, East, West or Central India)
    #[arg(long, default_value = catalog::DEFAULT_REGION)]
    region: String,

    /// Narrative tone
    #[arg(long, default_value = TONES[0])]
    tone: String,

    /// Narrative pacing
    #[arg(long, default_value = PACING[0])]
    pacing: String,

    /// Comma-separated genres
    #[arg(long, value_delimiter = ',', default_value = GENRES[0])]
    genres: Vec<String>,

    /// Number of chapters
    #[arg(long, default_value_t = DEFAULT_CHAPTERS)]
    chapters: u32,

    /// Language the story is written in
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    language: String,

    // ── Cast ───────────────────────────────────────────────────
    /// Main characters to create
    #[arg(long, default_value_t = 3)]
    main_characters: u32,

    /// Supporting characters to create
    #[arg(long, default_value_t = 5)]
    supporting_characters: u32,

    // ── Generation ─────────────────────────────────────────────
    /// Per-call timeout in seconds
    #[arg(long, default_value_t = 180)]
    timeout: u64,

    /// Retries for transient API failures
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Maximum tokens per response
    #[arg(long, default_value_t = 8192)]
    max_tokens: u32,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// JSON file overriding stage prompt templates
    #[arg(long)]
    prompts: Option<PathBuf>,

    /// Context points of each kind passed to a chapter
    #[arg(long, default_value_t = katha_rs::config::MAX_CONTEXT_ITEMS)]
    max_context_items: usize,

    // ── Output ─────────────────────────────────────────────────
    /// Root directory for generated stories
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Write the Markdown and audiobook exports when done
    #[arg(long)]
    export: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "katha_rs=debug,katha=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn generator(model: &str, config: &StoryConfig) -> Result<OpenRouterGenerator, String> {
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable is not set".to_string())?;
    let client =
        OpenRouterClient::with_headers(api_key, "https://crates.io/crates/katha-rs", "katha-rs")?;
    let config = config.clone().with_model(model);
    Ok(OpenRouterGenerator::new(client, &config))
}

async fn generate(model: &str, args: GenerateArgs) -> Result<(), String> {
    let mut config = StoryConfig::default()
        .with_model(model)
        .with_max_tokens(args.max_tokens)
        .with_temperature(args.temperature)
        .with_output_dir(args.output_dir)
        .with_cast(args.main_characters, args.supporting_characters)
        .with_generation_timeout(Duration::from_secs(args.timeout))
        .with_retry(RetryConfig::with_retries(args.retries))
        .with_context(ContextConfig::default().with_max_context_items(args.max_context_items));
    if let Some(path) = args.prompts {
        config = config.with_prompt_overrides(path);
    }

    for genre in &args.genres {
        if catalog::canonical(&GENRES, genre).is_none() {
            warn!("\"{genre}\" is not a catalog genre; using it as given");
        }
    }
    let mut request = StoryRequest::new(args.concept)
        .with_region(catalog::resolve_region(&args.region))
        .with_tone(args.tone)
        .with_pacing(args.pacing)
        .with_genres(args.genres)
        .with_chapters(args.chapters)
        .with_language(args.language);
    if let Some(title) = args.title {
        request = request.with_title(title);
    }

    let generator = generator(model, &config)?;
    let pipeline = StoryPipeline::new(&generator, config)?.with_progress_handler(&LoggingHandler);
    let mut session = pipeline.start(request).await?;
    session.run_to_end().await?;

    if args.export {
        let storage = session.storage();
        println!("{}", export_full_story(storage, false)?);
        println!("{}", export_audiobook_script(storage)?);
    }

    let run = session.finish();
    println!(
        "\"{}\": {} chapter(s), trace {}",
        run.outline.title,
        run.chapters.len(),
        run.trace_id
    );
    println!("{}", run.usage.summary());
    if !run.storage_failures.is_empty() {
        return Err(format!(
            "{} artifact(s) could not be saved: {}",
            run.storage_failures.len(),
            run.storage_failures.join("; ")
        ));
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Generate(args) => generate(&cli.model, args).await,
        Command::Suggest { concept } => {
            let config = StoryConfig::default().with_model(&cli.model);
            let generator = generator(&cli.model, &config)?;
            let suggestions = StoryPipeline::new(&generator, config)?
                .suggest(&concept)
                .await;
            let json = serde_json::to_string_pretty(&suggestions)
                .map_err(|e| format!("Failed to serialize suggestions: {e}"))?;
            println!("{json}");
            Ok(())
        }
        Command::Branch {
            story_dir,
            chapter,
            choice,
            decision_points,
        } => {
            let storage = FileStorage::new(story_dir)?;
            let config = StoryConfig::default()
                .with_model(&cli.model)
                .with_decision_points(decision_points);
            let generator = generator(&cli.model, &config)?;
            let run = StoryPipeline::new(&generator, config)?
                .with_progress_handler(&LoggingHandler)
                .branch_chapter(&storage, chapter, choice.as_deref())
                .await?;
            for point in &run.decision_points {
                println!("{}: {}", point.point_id, point.description);
                for option in &point.choices {
                    println!("  {}: {}", option.choice_id, option.description);
                }
            }
            for branch in &run.branches {
                println!("branch {} -> \"{}\"", branch.choice_id, branch.title);
            }
            println!("{}", run.usage.summary());
            Ok(())
        }
        Command::Export {
            story_dir,
            interactive,
            audiobook,
        } => {
            let storage = FileStorage::new(story_dir)?;
            println!("{}", export_full_story(&storage, interactive)?);
            if audiobook {
                println!("{}", export_audiobook_script(&storage)?);
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
