//! Per-map tick locks.
//!
//! Ticks of one map run one at a time; ticks of different maps run in
//! parallel. The registry itself sits behind a synchronous mutex that is
//! released before the returned lock is awaited.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use gridcity_types::MapId;

/// Lazily created async mutex per map.
#[derive(Debug, Default)]
pub struct MapLocks {
    locks: Mutex<HashMap<MapId, Arc<AsyncMutex<()>>>>,
}

impl MapLocks {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, map_id: MapId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(map_id).or_default())
    }

    /// Wait for exclusive use of `map_id`. Held until the guard drops.
    pub async fn acquire(&self, map_id: MapId) -> OwnedMutexGuard<()> {
        self.entry(map_id).lock_owned().await
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(&self, map_id: MapId) -> Option<OwnedMutexGuard<()>> {
        self.entry(map_id).try_lock_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_map_is_exclusive() {
        let locks = MapLocks::new();
        let map = MapId::new();
        let held = locks.acquire(map).await;
        assert!(locks.try_acquire(map).is_none());
        drop(held);
        assert!(locks.try_acquire(map).is_some());
    }

    #[tokio::test]
    async fn different_maps_do_not_block() {
        let locks = MapLocks::new();
        let _first = locks.acquire(MapId::new()).await;
        assert!(locks.try_acquire(MapId::new()).is_some());
    }
}
