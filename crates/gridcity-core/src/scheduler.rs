//! Periodic tick scheduling.
//!
//! [`run_scheduler`] spawns one task per map. Each task advances its map
//! every `engine.tick_interval_ms` until the shutdown flag flips. Maps tick
//! independently; a failing tick is logged and the next one runs on
//! schedule.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use gridcity_types::MapId;

use crate::engine::Engine;
use crate::error::SimError;
use crate::store::Store;

/// Tick every configured map (or every map in the store when none are
/// configured) until `shutdown` becomes `true` or its sender is dropped.
///
/// Returns the number of ticks committed across all maps.
pub async fn run_scheduler<S: Store + 'static>(
    engine: Arc<Engine<S>>,
    shutdown: watch::Receiver<bool>,
) -> Result<u64, SimError> {
    let configured = &engine.config().engine;
    let maps = if configured.maps.is_empty() {
        engine.store().map_ids().await?
    } else {
        configured.maps.clone()
    };
    let period = Duration::from_millis(configured.tick_interval_ms.max(1));

    if maps.is_empty() {
        warn!("No maps to tick");
    }
    info!(
        maps = maps.len(),
        tick_interval_ms = configured.tick_interval_ms,
        "Scheduler starting"
    );

    let mut tasks = JoinSet::new();
    for map_id in maps {
        tasks.spawn(run_map(
            Arc::clone(&engine),
            map_id,
            period,
            shutdown.clone(),
        ));
    }

    let mut total: u64 = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(ticks) => total = total.saturating_add(ticks),
            Err(e) => error!(error = %e, "Map tick task aborted"),
        }
    }
    info!(total_ticks = total, "Scheduler stopped");
    Ok(total)
}

async fn run_map<S: Store>(
    engine: Arc<Engine<S>>,
    map_id: MapId,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut completed: u64 = 0;
    if *shutdown.borrow() {
        return completed;
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval fires immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match engine.advance_tick(map_id).await {
                    Ok(summary) => {
                        completed = completed.saturating_add(1);
                        debug!(%map_id, tick = summary.tick, "Scheduled tick done");
                    }
                    Err(e) => warn!(%map_id, error = %e, "Scheduled tick failed"),
                }
            }
        }
    }
    debug!(%map_id, completed, "Map ticker stopped");
    completed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gridcity_types::{LocationType, MapConfig};

    use super::*;
    use crate::catalog::TrickCatalog;
    use crate::config::SimConfig;
    use crate::memory::MemoryStore;

    fn insert_map(store: &MemoryStore, name: &str) -> MapId {
        let map = MapConfig {
            id: MapId::new(),
            name: name.to_owned(),
            location_type: LocationType::Capital,
            police_strike_day: None,
            current_tick: 0,
        };
        let id = map.id;
        store.insert_map(map);
        id
    }

    fn engine(store: MemoryStore, maps: Vec<MapId>) -> Arc<Engine<MemoryStore>> {
        let mut config = SimConfig::default();
        config.engine.tick_interval_ms = 1_000;
        config.engine.maps = maps;
        Arc::new(Engine::new(store, config, TrickCatalog::builtin().unwrap()))
    }

    async fn tick_of(engine: &Engine<MemoryStore>, map_id: MapId) -> u64 {
        engine.store().map(map_id).await.unwrap().unwrap().current_tick
    }

    #[tokio::test(start_paused = true)]
    async fn every_map_ticks_until_shutdown() {
        let store = MemoryStore::new();
        let north = insert_map(&store, "North");
        let south = insert_map(&store, "South");
        let engine = engine(store, Vec::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_scheduler(Arc::clone(&engine), rx));
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap().unwrap(), 6);
        assert_eq!(tick_of(&engine, north).await, 3);
        assert_eq!(tick_of(&engine, south).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn configured_maps_restrict_scheduling() {
        let store = MemoryStore::new();
        let listed = insert_map(&store, "Listed");
        let ignored = insert_map(&store, "Ignored");
        let engine = engine(store, vec![listed]);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_scheduler(Arc::clone(&engine), rx));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        drop(tx);

        assert_eq!(handle.await.unwrap().unwrap(), 2);
        assert_eq!(tick_of(&engine, listed).await, 2);
        assert_eq!(tick_of(&engine, ignored).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn already_stopped_scheduler_does_nothing() {
        let store = MemoryStore::new();
        let map = insert_map(&store, "Idle");
        let engine = engine(store, Vec::new());
        let (_tx, rx) = watch::channel(true);

        assert_eq!(run_scheduler(Arc::clone(&engine), rx).await.unwrap(), 0);
        assert_eq!(tick_of(&engine, map).await, 0);
    }
}
