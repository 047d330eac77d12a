//! signfuse - Sign recognition demo driven by a scripted input timeline.

mod media;
mod script;
mod sim;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signfuse_catalog::Catalog;
use signfuse_engine::{Coordinator, EngineConfig, SourceKind, WorkerState};
use signfuse_playback::{PlaybackConfig, PlaybackController, PlaybackState};

use media::{ConsoleVoice, FileChunkOpener, TerminalSink};
use script::Script;
use sim::{ScriptedSpeech, ScriptedVision};

#[derive(Parser)]
#[command(name = "signfuse")]
#[command(about = "Sign recognition demo: scripted vision/speech input driving catalog playback")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against a scripted input timeline
    Run(RunArgs),
    /// Validate a catalog file and list its entries
    Check(CheckArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Catalog JSON file (label -> reference vector or media path)
    #[arg(long)]
    catalog: PathBuf,

    /// Directory of media clips matched to labels by file stem
    #[arg(long)]
    media_dir: Option<PathBuf>,

    /// Input timeline YAML
    #[arg(long)]
    script: PathBuf,

    /// Engine config YAML (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Playback frame rate in frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Catalog JSON file
    #[arg(long)]
    catalog: PathBuf,

    /// Directory of media clips matched to labels by file stem
    #[arg(long)]
    media_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    }

    match &cli.command {
        Commands::Run(args) => run(args),
        Commands::Check(args) => check(args),
    }
}

fn load_catalog(path: &PathBuf, media_dir: Option<&PathBuf>) -> Result<Catalog> {
    let mut catalog = Catalog::load(path)
        .with_context(|| format!("loading catalog from {}", path.display()))?;
    if let Some(dir) = media_dir {
        let attached = catalog
            .scan_media_dir(dir)
            .with_context(|| format!("scanning media dir {}", dir.display()))?;
        println!("attached {attached} media clip(s) from {}", dir.display());
    }
    Ok(catalog)
}

fn run(args: &RunArgs) -> Result<()> {
    let catalog = Arc::new(load_catalog(&args.catalog, args.media_dir.as_ref())?);

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config from {}", path.display()))?;
            serde_yaml::from_str::<EngineConfig>(&text)
                .with_context(|| format!("parsing config from {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    let script = Script::load(&args.script)
        .with_context(|| format!("loading script from {}", args.script.display()))?;
    println!(
        "loaded {} catalog entr(ies), {} scripted step(s)",
        catalog.len(),
        script.steps.len()
    );

    let playback = Arc::new(PlaybackController::new(
        Arc::new(FileChunkOpener::default()),
        Arc::new(TerminalSink),
        Arc::new(ConsoleVoice),
        PlaybackConfig::default().with_frame_rate(args.fps),
    ));

    let (vision, speech) = sim::split(script);
    let mut coordinator = Coordinator::new(
        catalog,
        Box::new(ScriptedVision::new(vision)),
        Box::new(ScriptedSpeech::new(speech)),
        playback.clone(),
        config,
    );

    coordinator.start(SourceKind::Vision)?;
    coordinator.start(SourceKind::Speech)?;

    // Run until both scripted streams are exhausted, then let any active
    // playback finish.
    loop {
        let vision_done = !matches!(
            coordinator.worker_state(SourceKind::Vision),
            Some(s) if s != WorkerState::Stopped
        );
        let speech_done = !matches!(
            coordinator.worker_state(SourceKind::Speech),
            Some(s) if s != WorkerState::Stopped
        );
        if vision_done && speech_done {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    // Both streams have ended; wait for queued events to be consumed, then
    // for the last playback session to finish.
    while coordinator.pending_events() > 0 {
        thread::sleep(Duration::from_millis(20));
    }
    while playback.state() != PlaybackState::Idle {
        thread::sleep(Duration::from_millis(20));
    }

    coordinator.shutdown();
    println!("script complete");
    Ok(())
}

fn check(args: &CheckArgs) -> Result<()> {
    let catalog = load_catalog(&args.catalog, args.media_dir.as_ref())?;

    println!("{} entr(ies):", catalog.len());
    for entry in catalog.entries() {
        println!("  {entry}");
    }

    let unplayable: Vec<&str> = catalog
        .entries()
        .filter(|e| e.media.is_none())
        .map(|e| e.name.as_str())
        .collect();
    if !unplayable.is_empty() {
        println!(
            "{} entr(ies) without media fall back to speech: {}",
            unplayable.len(),
            unplayable.join(", ")
        );
    }
    Ok(())
}
