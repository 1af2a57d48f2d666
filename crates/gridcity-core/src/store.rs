//! The backing store seam.
//!
//! The engine reads companies, buildings and maps through [`Store`] and
//! writes exclusively through [`Store::commit`]. Implementations must apply
//! a [`Batch`] all or nothing, rejecting it with [`StoreError::Conflict`]
//! when any guard no longer matches.

use std::collections::BTreeSet;
use std::future::Future;

use gridcity_types::{Building, BuildingId, Company, CompanyId, GridPos, MapConfig, MapId};

use crate::batch::Batch;
use crate::error::StoreError;

/// Persistent state of the simulation.
pub trait Store: Send + Sync {
    /// Load a company.
    fn company(
        &self,
        id: CompanyId,
    ) -> impl Future<Output = Result<Option<Company>, StoreError>> + Send;

    /// Load a building.
    fn building(
        &self,
        id: BuildingId,
    ) -> impl Future<Output = Result<Option<Building>, StoreError>> + Send;

    /// Load a map's configuration.
    fn map(&self, id: MapId) -> impl Future<Output = Result<Option<MapConfig>, StoreError>> + Send;

    /// Every map id known to the store.
    fn map_ids(&self) -> impl Future<Output = Result<Vec<MapId>, StoreError>> + Send;

    /// Buildings of `map_id` within Chebyshev distance `radius` of `center`,
    /// including any building on `center` itself, ordered by id.
    fn buildings_near(
        &self,
        map_id: MapId,
        center: GridPos,
        radius: u32,
    ) -> impl Future<Output = Result<Vec<Building>, StoreError>> + Send;

    /// Every building on `map_id`, ordered by id.
    fn map_buildings(
        &self,
        map_id: MapId,
    ) -> impl Future<Output = Result<Vec<Building>, StoreError>> + Send;

    /// Atomically take the dirty set of `map_id`, leaving it empty.
    fn drain_dirty(
        &self,
        map_id: MapId,
    ) -> impl Future<Output = Result<BTreeSet<BuildingId>, StoreError>> + Send;

    /// Put drained ids back into the dirty set of `map_id`.
    fn requeue_dirty(
        &self,
        map_id: MapId,
        ids: &BTreeSet<BuildingId>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Apply `batch` atomically.
    fn commit(&self, batch: Batch) -> impl Future<Output = Result<(), StoreError>> + Send;
}
