//! bms-sim entry point: settings, topology build, and the control loop.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use bms_sim::config::{ConfigError, Settings};
use bms_sim::error::SimError;
use bms_sim::io::export_csv;
use bms_sim::sim::{LoopState, Scheduler};
use bms_sim::store::MemoryStore;
use bms_sim::topology::{GeoSeed, Topology, duplicate_buildings, duplicate_floors};

/// Building-monitoring control-loop simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Load settings from a TOML file
    #[arg(long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Built-in preset (baseline, campus, fast); baseline when neither is given
    #[arg(long)]
    preset: Option<String>,

    /// Directory holding geo/seed.json (built-in demo seed otherwise)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of building replicas
    #[arg(long)]
    buildings: Option<usize>,

    /// Override the number of floor replicas
    #[arg(long)]
    floors: Option<usize>,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Write the reading ledger to CSV on exit
    #[arg(long)]
    ledger_out: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = log_level.parse::<Level>().unwrap_or(Level::INFO);
        EnvFilter::default().add_directive(level.into())
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Loads the base settings and applies CLI overrides.
fn load_settings(args: &Args) -> Result<Settings, ConfigError> {
    let mut settings = match (&args.config, &args.preset) {
        (Some(path), _) => Settings::from_toml_file(path)?,
        (None, Some(name)) => Settings::from_preset(name)?,
        (None, None) => Settings::baseline(),
    };

    if let Some(dir) = &args.data_dir {
        settings.topology.data_dir = Some(dir.clone());
    }
    if let Some(seed) = args.seed {
        settings.simulation.seed = Some(seed);
    }
    if let Some(buildings) = args.buildings {
        settings.topology.buildings = buildings;
    }
    if let Some(floors) = args.floors {
        settings.topology.floors = floors;
    }
    Ok(settings)
}

/// Base topology from the data dir (or demo seed), replicated per settings.
fn build_topology(settings: &Settings) -> Result<Topology, SimError> {
    let seed = match &settings.topology.data_dir {
        Some(dir) => GeoSeed::from_dir(dir)?,
        None => GeoSeed::demo(),
    };
    let base = seed.into_topology()?;
    let stacked = duplicate_floors(&base, settings.topology.floors)?;
    Ok(duplicate_buildings(&stacked, settings.topology.buildings)?)
}

async fn run(args: &Args, settings: Settings) -> Result<bool, SimError> {
    let topology = build_topology(&settings)?;
    info!(
        buildings = topology.buildings.len(),
        floors = topology.floors.len(),
        rooms = topology.rooms.len(),
        points = topology.points.len(),
        "topology ready"
    );

    let store = Arc::new(MemoryStore::new());
    let scheduler = Scheduler::new(Arc::clone(&store), settings.simulation.clone());
    let handle = scheduler.start(&topology).await?;

    let max_ticks = args.max_ticks;
    let mut stats = handle.subscribe_stats();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received, stopping"),
        state = handle.wait_for_exit() => warn!(%state, "control loop exited on its own"),
        Ok(_) = stats.wait_for(|s| max_ticks.is_some_and(|max| s.ticks >= max)),
            if max_ticks.is_some() => {
            info!(max_ticks, "tick limit reached, stopping");
        }
    }

    handle.cancel();
    let outcome = handle.join().await;
    let totals = *stats.borrow();

    let mut ok = true;
    if let Some(path) = &args.ledger_out {
        match export_csv(&store.records().await, path) {
            Ok(()) => info!(path = %path.display(), "ledger exported"),
            Err(err) => {
                error!(path = %path.display(), error = %err, "ledger export failed");
                ok = false;
            }
        }
    }

    let state = match &outcome {
        Ok(state) => *state,
        Err(_) => LoopState::Failed,
    };
    info!(
        ticks = totals.ticks,
        records_written = totals.records_written,
        ledger_len = store.len().await,
        %state,
        "simulation finished"
    );
    outcome?;
    Ok(ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let errors = settings.validate();
    if !errors.is_empty() {
        eprintln!("Settings validation failed:");
        for err in &errors {
            eprintln!("  {err}");
        }
        return ExitCode::FAILURE;
    }

    match run(&args, settings).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
