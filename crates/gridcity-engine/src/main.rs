//! Tick scheduler binary for the Gridcity simulation.
//!
//! Wires configuration, the trick catalog, the `PostgreSQL` store and the
//! engine together, then ticks every map until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `gridcity-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Load the trick catalog
//! 4. Connect to `PostgreSQL` and run migrations
//! 5. Run the per-map tick scheduler until Ctrl-C

mod error;

use std::path::Path;
use std::sync::Arc;

use gridcity_core::config::LoggingConfig;
use gridcity_core::{Engine, SimConfig, TrickCatalog, run_scheduler};
use gridcity_db::{PgStore, PostgresConfig, PostgresPool};
use tokio::sync::watch;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "gridcity-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the scheduler fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration. Logging is not up yet, so report the source
    //    once it is.
    let (config, from_file) = load_config(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        from_file,
        tick_interval_ms = config.engine.tick_interval_ms,
        max_tick_commit_attempts = config.engine.max_tick_commit_attempts,
        maps = config.engine.maps.len(),
        "gridcity-engine starting"
    );

    // 3. Load the trick catalog.
    let catalog = TrickCatalog::load(&config.catalog)?;
    for trick in catalog.definitions() {
        debug!(
            trick = %trick.id,
            cost = %trick.cost,
            level_required = trick.level_required,
            sets_fire = trick.sets_fire,
            "Trick available"
        );
    }

    // 4. Connect to PostgreSQL.
    let pool = PostgresPool::connect(&PostgresConfig::from_infrastructure(
        &config.infrastructure,
    ))
    .await?;
    pool.run_migrations().await?;
    pool.ping().await?;

    let engine = Arc::new(Engine::new(PgStore::new(&pool), config, catalog));

    // 5. Run the scheduler until Ctrl-C. Dropping the sender also stops it.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_scheduler(Arc::clone(&engine), shutdown_rx));
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        if shutdown_tx.send(true).is_err() {
            info!("Scheduler already stopped");
        }
    });

    let result = scheduler.await.map_err(|e| EngineError::Join {
        message: e.to_string(),
    })?;
    pool.close().await;

    let total_ticks = result?;
    info!(total_ticks, "gridcity-engine stopped");
    Ok(())
}

/// Set up the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist. The flag reports whether the file was read.
fn load_config(path: &Path) -> Result<(SimConfig, bool), EngineError> {
    if path.exists() {
        Ok((SimConfig::from_file(path)?, true))
    } else {
        let mut config = SimConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok((config, false))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_uses_defaults() {
        let (config, from_file) = load_config(Path::new("does-not-exist.yaml")).unwrap();
        assert!(!from_file);
        assert_eq!(config.engine, SimConfig::default().engine);
    }

    #[test]
    fn project_config_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(CONFIG_PATH);
        let (config, from_file) = load_config(&path).unwrap();
        assert!(from_file);
        assert_eq!(config.grid.neighbor_radius, 2);
        assert_eq!(config.engine.max_tick_commit_attempts, 3);
    }
}
