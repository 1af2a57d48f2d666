//! Dirty set tracking.
//!
//! A building's profit depends on its own damage and on the damage of every
//! building within the neighbour radius. Whenever a building's condition
//! changes, it and its neighbourhood are marked dirty so the next tick
//! recomputes them. This module is the only place that decides which ids
//! a change dirties.

use std::collections::BTreeSet;

use tracing::debug;

use gridcity_types::{Building, BuildingId, GridPos, MapId};

use crate::batch::Batch;
use crate::error::StoreError;
use crate::store::Store;

/// Computes and stages dirty marks for one neighbour radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtySetTracker {
    radius: u32,
}

impl DirtySetTracker {
    /// A tracker marking everything within Chebyshev distance `radius`.
    pub const fn new(radius: u32) -> Self {
        Self { radius }
    }

    /// The neighbour radius.
    pub const fn radius(self) -> u32 {
        self.radius
    }

    /// Ids of `buildings` that a change at `center` dirties.
    pub fn affected<'a>(
        self,
        center: GridPos,
        buildings: impl IntoIterator<Item = &'a Building>,
    ) -> BTreeSet<BuildingId> {
        buildings
            .into_iter()
            .filter(|b| b.pos.chebyshev_distance(center) <= self.radius)
            .map(|b| b.id)
            .collect()
    }

    /// Stage marks for a change at `center`, reading the neighbourhood from
    /// the store. The marks only take effect if `batch` commits.
    ///
    /// Returns how many ids were staged.
    pub async fn mark_dirty<S: Store>(
        self,
        store: &S,
        batch: &mut Batch,
        map_id: MapId,
        center: GridPos,
    ) -> Result<usize, StoreError> {
        let near = store.buildings_near(map_id, center, self.radius).await?;
        let ids = self.affected(center, &near);
        let count = ids.len();
        debug!(%map_id, x = center.x, y = center.y, count, "Staged dirty marks");
        batch.mark_dirty(map_id, ids);
        Ok(count)
    }

    /// Stage marks for changes at several positions against an in-memory
    /// snapshot of the map.
    pub fn mark_from_snapshot<'a>(
        self,
        batch: &mut Batch,
        map_id: MapId,
        centers: impl IntoIterator<Item = GridPos>,
        snapshot: impl IntoIterator<Item = &'a Building> + Clone,
    ) -> usize {
        let mut ids = BTreeSet::new();
        for center in centers {
            ids.extend(self.affected(center, snapshot.clone()));
        }
        let count = ids.len();
        batch.mark_dirty(map_id, ids);
        count
    }

    /// Atomically take the dirty set of `map_id`.
    pub async fn drain<S: Store>(
        self,
        store: &S,
        map_id: MapId,
    ) -> Result<BTreeSet<BuildingId>, StoreError> {
        store.drain_dirty(map_id).await
    }

    /// Return drained ids whose tick did not commit.
    pub async fn requeue<S: Store>(
        self,
        store: &S,
        map_id: MapId,
        ids: &BTreeSet<BuildingId>,
    ) -> Result<(), StoreError> {
        store.requeue_dirty(map_id, ids).await
    }
}
