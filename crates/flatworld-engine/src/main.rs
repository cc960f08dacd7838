//! Demo binary for the Flatworld simulation.
//!
//! Wires a contagion simulation to the core: walkers wander a scene,
//! infected walkers spread the infection to neighbors and may die. The
//! manager ticks the scene on its own thread while this binary waits for
//! Ctrl-C or the configured run time.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`FLATWORLD_CONFIG`, else `flatworld-config.yaml`,
//!    else defaults)
//! 2. Initialize structured logging (tracing)
//! 3. Create the scene and add the walkers
//! 4. Start the manager with telemetry hooks
//! 5. Wait for Ctrl-C or the run timer
//! 6. Stop the manager and log the final status

mod contagion;
mod error;
mod telemetry;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flatworld_core::config::{LogFormat, LoggingConfig};
use flatworld_core::{Manager, Scene, SimRandom, SimulationConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::contagion::{Contagion, ContagionParams};
use crate::error::EngineError;
use crate::telemetry::TelemetryHooks;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "FLATWORLD_CONFIG";

/// Configuration file looked up in the working directory.
const DEFAULT_CONFIG_PATH: &str = "flatworld-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, scene construction or the manager
/// fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        source = %source.display(),
        width = config.scene.width,
        height = config.scene.height,
        max_ups = config.manager.max_ups,
        "flatworld-engine starting"
    );

    // 3. Create the scene and population.
    let scene = Arc::new(Scene::with_index_config(
        config.scene.width,
        config.scene.height,
        config.index,
    )?);
    let rng = config
        .demo
        .seed
        .map_or_else(SimRandom::from_entropy, SimRandom::new);
    let contagion = Arc::new(Contagion::new(ContagionParams::from(&config.demo), rng));
    contagion::populate(&scene, &contagion, config.demo.healthy, config.demo.infected);

    // 4. Start the manager.
    let hooks = TelemetryHooks::new(Arc::clone(&contagion), config.demo.report_every_ticks);
    let manager = Manager::with_hooks(Arc::clone(&scene), hooks)
        .with_ups_window(config.manager.ups_window);
    manager.start_simulation(config.manager.max_ups)?;

    // 5. Wait for shutdown.
    wait_for_shutdown(config.demo.run_seconds).await?;

    // 6. Stop and report.
    manager.stop_simulation()?;
    let status = manager.status();
    let uptime_seconds = status
        .started_at
        .map(|started| Utc::now().signed_duration_since(started).num_seconds());
    info!(
        age = status.age,
        population = status.population,
        ups = status.ups,
        uptime_seconds,
        seed = contagion.seed(),
        "flatworld-engine shutdown complete"
    );

    Ok(())
}

/// Load the configuration and report where it came from.
///
/// A path given through `FLATWORLD_CONFIG` must exist. Without it,
/// `flatworld-config.yaml` is used when present and defaults otherwise.
fn load_config() -> Result<(SimulationConfig, PathBuf), EngineError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        let path = PathBuf::from(path);
        let config = SimulationConfig::from_file(&path)?;
        return Ok((config, path));
    }

    let path = Path::new(DEFAULT_CONFIG_PATH);
    if path.exists() {
        Ok((SimulationConfig::from_file(path)?, path.to_path_buf()))
    } else {
        Ok((SimulationConfig::default(), PathBuf::from("<defaults>")))
    }
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Resolve on Ctrl-C, or after `run_seconds` when it is not 0.
async fn wait_for_shutdown(run_seconds: u64) -> Result<(), EngineError> {
    if run_seconds == 0 {
        tokio::signal::ctrl_c().await?;
        info!("Interrupt received");
        return Ok(());
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Interrupt received");
        }
        () = tokio::time::sleep(Duration::from_secs(run_seconds)) => {
            info!(run_seconds, "Run time elapsed");
        }
    }
    Ok(())
}
