//! # SensorBuf Simulator
//!
//! Runs a simulated multi-device sensor stream against a
//! [`BufferCoordinator`] and logs buffer statistics until Ctrl+C or the
//! configured duration elapses.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (4 devices at 100 Hz)
//! sensorbuf
//!
//! # From a config file, overriding the device count
//! sensorbuf --config config/sensorbuf.toml --sources 16
//!
//! # Ten second run, JSON logs, final stats as JSON on stdout
//! sensorbuf --duration-secs 10 --json --json-stats
//! ```

#![deny(warnings)]

use clap::Parser;
use sensorbuf::app_config::AppConfig;
use sensorbuf::simulator::{ProduceReport, Simulator};
use sensorbuf_common::config::{ConfigError, ConfigLoader};
use sensorbuf_common::consts::DEFAULT_CONFIG_PATH;
use sensorbuf_store::BufferCoordinator;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// SensorBuf - bounded buffering for high-frequency sensor streams
#[derive(Parser, Debug)]
#[command(name = "sensorbuf")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Simulated multi-device producer for the SensorBuf coordinator")]
#[command(long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Number of simulated devices (overrides config)
    #[arg(long)]
    sources: Option<usize>,

    /// Samples per second per device (overrides config)
    #[arg(long)]
    rate_hz: Option<f64>,

    /// Stop after this many seconds (overrides config)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Print final statistics as JSON on stdout
    #[arg(long)]
    json_stats: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Tracing may not be installed yet if config loading failed.
        eprintln!("SensorBuf failed: {e}");
        error!("SensorBuf failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;

    setup_tracing(&args, &config);

    info!(
        "SensorBuf v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );
    info!(
        sources = config.simulation.sources,
        rate_hz = config.simulation.rate_hz,
        capacity = config.buffer.per_source_capacity,
        window_seconds = config.buffer.window_seconds,
        "Simulation configured"
    );

    let coordinator = BufferCoordinator::new(config.buffer.clone())?;
    let mut simulator = Simulator::new(&config.simulation);

    let producer = produce(&coordinator, &mut simulator, &config);
    let deadline = async {
        match config.simulation.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = producer => {}
        _ = deadline => info!("Configured duration elapsed"),
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Received shutdown signal (Ctrl+C)"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        },
    }

    coordinator.shutdown();

    let stats = coordinator.global_stats();
    info!("Final statistics:");
    info!("  - Steps: {}", simulator.steps());
    info!("  - Sources: {}", stats.total_sources);
    info!("  - Retained samples: {}", stats.total_samples);
    info!("  - Memory estimate: {} bytes", stats.total_memory_bytes);
    info!("  - Average utilization: {:.1}%", stats.average_utilization * 100.0);
    info!("  - Dropped samples: {}", stats.total_dropped_samples);
    info!("  - Emergency compactions: {}", stats.emergency_compactions);
    info!("  - Cleanup runs: {}", stats.cleanup_runs);

    if args.json_stats {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    info!("SensorBuf shutdown complete");
    Ok(())
}

/// Drive the simulator at its sample rate, logging stats periodically.
async fn produce(coordinator: &BufferCoordinator, simulator: &mut Simulator, config: &AppConfig) {
    let period = Duration::from_secs_f64(config.simulation.sample_period_ms() / 1000.0);
    let mut sample_tick = interval(period);
    sample_tick.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut stats_tick = interval(Duration::from_millis(config.simulation.stats_interval_ms));
    stats_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut window = ProduceReport::default();

    loop {
        tokio::select! {
            _ = sample_tick.tick() => {
                window.merge(simulator.produce(coordinator));
            }
            _ = stats_tick.tick() => {
                let stats = coordinator.global_stats();
                info!(
                    produced = window.total(),
                    overwrote = window.overwrote,
                    rejected = window.rejected,
                    sources = stats.total_sources,
                    samples = stats.total_samples,
                    memory_bytes = stats.total_memory_bytes,
                    utilization = stats.average_utilization,
                    dropped = stats.total_dropped_samples,
                    busiest = stats.busiest_source().map_or("-", |s| s.source_id.as_str()),
                    compactions = stats.emergency_compactions,
                    "Buffer statistics"
                );
                window = ProduceReport::default();
            }
        }
    }
}

/// Load the config file (defaults when the default path is absent), apply
/// CLI overrides, validate.
fn load_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let mut config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound) if args.config == Path::new(DEFAULT_CONFIG_PATH) => {
            AppConfig::default()
        }
        Err(e) => return Err(e),
    };

    if let Some(sources) = args.sources {
        config.simulation.sources = sources;
    }
    if let Some(rate_hz) = args.rate_hz {
        config.simulation.rate_hz = rate_hz;
    }
    if args.duration_secs.is_some() {
        config.simulation.duration_secs = args.duration_secs;
    }

    config.validate()?;
    Ok(config)
}

fn setup_tracing(args: &Args, config: &AppConfig) {
    let level = if args.verbose {
        "debug"
    } else {
        config.shared.log_level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }
}
