//! Scenario runner for the fishery simulation.
//!
//! Loads a scenario, builds the fisher population under its regulation
//! regime and runs the scheduler until the scenario's bounds are reached.
//!
//! # Startup Sequence
//!
//! 1. Load the scenario from `FISHERY_SCENARIO` or `fishery-scenario.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the simulation (markets, scheduler, regulation, fishers)
//! 4. Run the simulation loop
//! 5. Log the yearly summaries and tear down

use std::path::{Path, PathBuf};

use anyhow::Context;
use fishery_core::SimulationConfig;
use fishery_core::config::LoggingConfig;
use fishery_engine::Simulation;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_SCENARIO: &str = "fishery-scenario.yaml";

fn main() -> anyhow::Result<()> {
    // 1. Load the scenario.
    let path = scenario_path();
    let (config, found) = load_config(&path)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("fishery-engine starting");
    if found {
        info!(path = %path.display(), "Scenario loaded");
    } else {
        info!(path = %path.display(), "Scenario file not found, using defaults");
    }
    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        steps_per_day = config.time.steps_per_day,
        max_years = config.simulation.max_years,
        max_steps = config.simulation.max_steps,
        "Configuration loaded"
    );

    // 3. Build the simulation.
    let mut simulation =
        Simulation::from_config(&config).context("failed to build the simulation")?;

    // 4. Run.
    let result = simulation
        .run(&config.simulation)
        .context("simulation run failed")?;

    // 5. Report.
    for summary in simulation.model().summaries() {
        let json = serde_json::to_string(summary).context("failed to serialize yearly summary")?;
        info!(year = summary.year, summary = %json, "Yearly summary");
    }
    simulation.teardown();
    info!(
        run_id = %simulation.run_id(),
        total_steps = result.total_steps,
        years_completed = result.years_completed,
        "fishery-engine finished"
    );
    Ok(())
}

fn scenario_path() -> PathBuf {
    std::env::var_os("FISHERY_SCENARIO").map_or_else(|| PathBuf::from(DEFAULT_SCENARIO), PathBuf::from)
}

/// Load the scenario, falling back to defaults when the file is missing.
/// Returns whether the file was found.
fn load_config(path: &Path) -> anyhow::Result<(SimulationConfig, bool)> {
    if path.exists() {
        Ok((SimulationConfig::from_file(path)?, true))
    } else {
        Ok((SimulationConfig::default(), false))
    }
}

/// `RUST_LOG` wins over the scenario's level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
