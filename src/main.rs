use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use autoreply::host::MemoryTree;
use autoreply::locator::{find_input_surface, find_submit_control, find_typing_target};
use autoreply::scheduler::{self, MIN_INTERVAL_MS};
use autoreply::typing;
use autoreply::{Controller, EngineOptions, LogSink, Settings};

#[derive(Debug, Parser)]
#[command(name = "autoreply")]
#[command(about = "Humanized auto-reply engine driven against a UI tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the engine against a UI tree fixture until Ctrl+C
    Run {
        /// Settings file (JSON)
        #[arg(long, value_name = "PATH")]
        settings: PathBuf,

        /// UI tree fixture (JSON)
        #[arg(long, value_name = "PATH")]
        tree: PathBuf,

        /// Optional RNG seed (for debugging)
        #[arg(long)]
        seed: Option<u64>,

        /// Disable console trace of UI mutations
        #[arg(long)]
        no_trace: bool,
    },

    /// Show which surfaces the locator picks in a UI tree fixture
    Locate {
        /// UI tree fixture (JSON)
        #[arg(long, value_name = "PATH")]
        tree: PathBuf,

        /// Settings file whose locator profile to use (defaults built in)
        #[arg(long, value_name = "PATH")]
        settings: Option<PathBuf>,
    },

    /// Print the typing steps for a message (JSON)
    Preview {
        #[arg(long)]
        text: String,

        /// Probability of a typo per character (0.0-1.0)
        #[arg(long, default_value_t = autoreply::config::DEFAULT_TYPO_RATE)]
        typo_rate: f64,

        /// Set the whole text at once instead of typing it
        #[arg(long)]
        no_human: bool,

        /// Optional RNG seed (for debugging)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Sample inter-cycle delays for a base interval
    Delays {
        #[arg(long, default_value_t = autoreply::config::DEFAULT_INTERVAL_MS)]
        interval_ms: u64,

        #[arg(long, default_value_t = 1000)]
        samples: usize,

        /// Optional RNG seed (for debugging)
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("autoreply=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(settings: PathBuf, tree: PathBuf, seed: Option<u64>, trace: bool) -> Result<()> {
    let settings = Settings::load(&settings)?;
    let tree = MemoryTree::load(&tree)?.with_trace(trace);

    let controller = Controller::new(
        Arc::new(settings),
        Box::new(tree),
        Arc::new(LogSink),
        EngineOptions { seed },
    )
    .context("failed to spawn worker thread")?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("failed to install Ctrl+C handler")?;

    controller.start()?;
    eprintln!("Running. Press Ctrl+C to stop.");

    stop_rx
        .recv()
        .map_err(|_| anyhow!("Ctrl+C handler dropped"))?;

    let cycles = controller.cycles();
    controller.shutdown();
    eprintln!("Stopped after {cycles} cycles.");
    Ok(())
}

fn locate(tree: PathBuf, settings: Option<PathBuf>) -> Result<()> {
    let profile = match settings {
        Some(path) => Settings::load(&path)?.locator,
        None => Default::default(),
    };
    let snapshot = MemoryTree::load(&tree)?.snapshot();

    match find_input_surface(&snapshot, &profile) {
        Some(input) => {
            println!("input:  {input}");
            println!("typing: {}", find_typing_target(&snapshot, &profile, &input));
        }
        None => println!("input:  <none>"),
    }
    match find_submit_control(&snapshot, &profile) {
        Some(submit) => println!("submit: {submit}"),
        None => println!("submit: <none>"),
    }
    Ok(())
}

fn preview(text: String, typo_rate: f64, no_human: bool, seed: Option<u64>) -> Result<()> {
    if !(0.0..=1.0).contains(&typo_rate) {
        return Err(anyhow!("--typo-rate must be between 0.0 and 1.0"));
    }

    let mut rng = rng_from_seed(seed);
    let steps = typing::simulate(&text, !no_human, typo_rate, &mut rng);

    let stats = typing::stats(&steps);
    eprintln!(
        "Typed: {} mutations, {} corrections, ~{:.1} s",
        stats.mutations,
        stats.corrections,
        (stats.total_delay_ms as f64) / 1000.0
    );

    let json = serde_json::to_string_pretty(&steps).context("failed to serialize steps")?;
    println!("{json}");
    Ok(())
}

fn delays(interval_ms: u64, samples: usize, seed: Option<u64>) -> Result<()> {
    if interval_ms < MIN_INTERVAL_MS {
        return Err(anyhow!("--interval-ms must be at least {MIN_INTERVAL_MS}"));
    }

    let mut rng = rng_from_seed(seed);
    let summary = scheduler::summarize(interval_ms, samples, &mut rng);
    println!(
        "{} samples: min {} ms, mean {:.0} ms, max {} ms, {} distracted",
        summary.samples, summary.min_ms, summary.mean_ms, summary.max_ms, summary.distracted
    );
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            settings,
            tree,
            seed,
            no_trace,
        } => run(settings, tree, seed, !no_trace),
        Command::Locate { tree, settings } => locate(tree, settings),
        Command::Preview {
            text,
            typo_rate,
            no_human,
            seed,
        } => preview(text, typo_rate, no_human, seed),
        Command::Delays {
            interval_ms,
            samples,
            seed,
        } => delays(interval_ms, samples, seed),
    }
}
