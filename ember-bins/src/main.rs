//! ember - single-venue market-making engine.
//!
//! Loads the `KEY=VALUE` config, wires the paper gateway and a market-data
//! source, runs the engine until a signal arrives, and writes the session
//! summary on the way out. Exit code 0 on a clean shutdown, 1 on a fatal
//! initialization or unhandled error.

mod synthetic;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ember_core::config::EngineConfig;
use ember_core::engine::Engine;
use ember_core::gateway::{PaperFillConfig, PaperGateway};
use ember_core::journal::Journals;
use ember_core::store::NoopStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use synthetic::SyntheticSource;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ember", about = "Single-venue crypto market-making engine")]
struct Args {
    /// Path to the KEY=VALUE config file
    #[arg(short, long, default_value = "config/ember.conf")]
    config: PathBuf,

    /// Base price for the synthetic paper feed
    #[arg(long, default_value_t = 2000.0)]
    base_price: f64,

    /// Synthetic feed tick interval in milliseconds
    #[arg(long, default_value_t = 50)]
    feed_interval_ms: u64,

    /// Seed for the synthetic feed and fill simulator (random when absent)
    #[arg(long)]
    seed: Option<u64>,

    /// Stop automatically after this many seconds (run until signal when absent)
    #[arg(long)]
    run_seconds: Option<u64>,
}

fn init_tracing(log_level: &str, to_console: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_ascii_lowercase()));
    if to_console {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_thread_names(true))
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = if args.config.exists() {
        EngineConfig::from_file(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        eprintln!(
            "config {} not found, using defaults (paper mode)",
            args.config.display()
        );
        EngineConfig::default()
    };

    init_tracing(&cfg.log_level, cfg.log_to_console);

    if !cfg.paper_trading {
        // The live transport is a deployment collaborator; this binary only
        // ships the paper stack.
        bail!("PAPER_TRADING=false requires a live gateway; none is configured in this build");
    }

    let journals = if cfg.log_to_file {
        Arc::new(Journals::open(&cfg.log_dir).context("opening journal streams")?)
    } else {
        Arc::new(Journals::disabled())
    };

    let source = SyntheticSource::new(
        args.base_price,
        Duration::from_millis(args.feed_interval_ms),
        args.seed,
    );
    let gateway = match args.seed {
        Some(seed) => PaperGateway::with_seed(PaperFillConfig::default(), seed),
        None => PaperGateway::new(PaperFillConfig::default()),
    };

    let mut engine = Engine::new(
        cfg,
        Box::new(source),
        Box::new(gateway),
        Arc::new(NoopStore),
        journals,
    );

    // First SIGINT/SIGTERM requests a graceful shutdown; a second one within
    // the grace window forces an immediate exit.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        let signal_count = AtomicU32::new(0);
        ctrlc::set_handler(move || {
            let count = signal_count.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                warn!("shutdown requested; finishing the session");
                shutdown.store(true, Ordering::Release);
            } else {
                eprintln!("forced exit");
                std::process::exit(1);
            }
        })
        .context("installing signal handler")?;
    }

    engine.start().context("starting engine")?;
    info!("engine running; press Ctrl-C to stop");

    let deadline = args
        .run_seconds
        .map(|secs| std::time::Instant::now() + Duration::from_secs(secs));
    while engine.is_running() && !shutdown.load(Ordering::Acquire) {
        if deadline.is_some_and(|d| std::time::Instant::now() >= d) {
            info!("run time limit reached");
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let emergency = engine.emergency_stopped();
    engine.stop();

    if emergency {
        warn!("session ended by circuit breaker");
    }
    info!("goodbye");
    Ok(())
}
