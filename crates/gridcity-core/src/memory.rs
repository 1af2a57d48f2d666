//! In-process [`Store`] implementation.
//!
//! Holds all state behind one [`std::sync::Mutex`] that is never held
//! across an `.await`. A commit checks every guard in the batch (taking
//! earlier mutations of the same batch into account) before it applies
//! anything, so a rejected batch leaves the store untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::future::{Future, Ready, ready};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use gridcity_types::{
    AttackRecord, Building, BuildingCondition, BuildingId, Company, CompanyId, CompanyStanding,
    GridPos, LedgerTransaction, MapConfig, MapId, TickLogEntry,
};

use crate::batch::{Batch, Mutation};
use crate::error::StoreError;
use crate::store::Store;

#[derive(Debug, Default)]
struct Inner {
    companies: BTreeMap<CompanyId, Company>,
    buildings: BTreeMap<BuildingId, Building>,
    maps: BTreeMap<MapId, MapConfig>,
    dirty: BTreeMap<MapId, BTreeSet<BuildingId>>,
    attacks: Vec<AttackRecord>,
    transactions: Vec<LedgerTransaction>,
    tick_log: Vec<TickLogEntry>,
    injected_conflicts: u32,
}

/// A [`Store`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a company.
    pub fn insert_company(&self, company: Company) {
        self.guard().companies.insert(company.id, company);
    }

    /// Insert or replace a building, bypassing guards.
    pub fn insert_building(&self, building: Building) {
        self.guard().buildings.insert(building.id, building);
    }

    /// Insert or replace a map.
    pub fn insert_map(&self, map: MapConfig) {
        self.guard().maps.insert(map.id, map);
    }

    /// Overwrite a building's condition outside of any batch.
    pub fn set_condition(&self, id: BuildingId, condition: BuildingCondition) {
        if let Some(building) = self.guard().buildings.get_mut(&id) {
            building.condition = condition;
        }
    }

    /// Overwrite a company's standing outside of any batch.
    pub fn set_standing(&self, id: CompanyId, standing: CompanyStanding) {
        if let Some(company) = self.guard().companies.get_mut(&id) {
            company.standing = standing;
        }
    }

    /// Reject the next `count` commits with a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.guard().injected_conflicts = count;
    }

    /// Current dirty set of `map_id`, without draining it.
    pub fn dirty_snapshot(&self, map_id: MapId) -> BTreeSet<BuildingId> {
        self.guard().dirty.get(&map_id).cloned().unwrap_or_default()
    }

    /// Attack records in commit order.
    pub fn attacks(&self) -> Vec<AttackRecord> {
        self.guard().attacks.clone()
    }

    /// Ledger transactions in commit order.
    pub fn transactions(&self) -> Vec<LedgerTransaction> {
        self.guard().transactions.clone()
    }

    /// Tick log in commit order.
    pub fn tick_log(&self) -> Vec<TickLogEntry> {
        self.guard().tick_log.clone()
    }

    fn commit_sync(&self, batch: Batch) -> Result<(), StoreError> {
        let mut inner = self.guard();
        if inner.injected_conflicts > 0 {
            inner.injected_conflicts = inner.injected_conflicts.saturating_sub(1);
            return Err(StoreError::conflict("injected conflict"));
        }
        inner.check_guards(&batch)?;
        let size = batch.len();
        for mutation in batch.into_mutations() {
            inner.apply(mutation);
        }
        debug!(mutations = size, "Memory batch committed");
        Ok(())
    }
}

impl Inner {
    fn check_guards(&self, batch: &Batch) -> Result<(), StoreError> {
        let mut conditions: BTreeMap<BuildingId, BuildingCondition> = BTreeMap::new();
        let mut standings: BTreeMap<CompanyId, CompanyStanding> = BTreeMap::new();
        let mut ticks: BTreeMap<MapId, u64> = BTreeMap::new();

        for mutation in batch.mutations() {
            match mutation {
                Mutation::Building(change) => {
                    let current = match conditions.get(&change.building_id) {
                        Some(pending) => *pending,
                        None => self
                            .buildings
                            .get(&change.building_id)
                            .map(|b| b.condition)
                            .ok_or_else(|| {
                                StoreError::conflict(format!(
                                    "building {} does not exist",
                                    change.building_id
                                ))
                            })?,
                    };
                    if current != change.expected {
                        return Err(StoreError::conflict(format!(
                            "building {} changed since it was read",
                            change.building_id
                        )));
                    }
                    conditions.insert(change.building_id, change.condition);
                }
                Mutation::Company(change) => {
                    let current = match standings.get(&change.company_id) {
                        Some(pending) => *pending,
                        None => self
                            .companies
                            .get(&change.company_id)
                            .map(|c| c.standing)
                            .ok_or_else(|| {
                                StoreError::conflict(format!(
                                    "company {} does not exist",
                                    change.company_id
                                ))
                            })?,
                    };
                    if current != change.expected {
                        return Err(StoreError::conflict(format!(
                            "company {} changed since it was read",
                            change.company_id
                        )));
                    }
                    standings.insert(change.company_id, change.standing);
                }
                Mutation::MapTick(change) => {
                    let current = match ticks.get(&change.map_id) {
                        Some(pending) => *pending,
                        None => self
                            .maps
                            .get(&change.map_id)
                            .map(|m| m.current_tick)
                            .ok_or_else(|| {
                                StoreError::conflict(format!("map {} does not exist", change.map_id))
                            })?,
                    };
                    if current != change.expected_tick {
                        return Err(StoreError::conflict(format!(
                            "map {} is at tick {current}, expected {}",
                            change.map_id, change.expected_tick
                        )));
                    }
                    ticks.insert(change.map_id, change.new_tick);
                }
                Mutation::AppendAttack(_)
                | Mutation::AppendTransaction(_)
                | Mutation::AppendTickLog(_)
                | Mutation::MarkDirty { .. } => {}
            }
        }
        Ok(())
    }

    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Building(change) => {
                if let Some(building) = self.buildings.get_mut(&change.building_id) {
                    building.condition = change.condition;
                    if let Some(profit) = change.profit {
                        building.profit = profit;
                    }
                }
            }
            Mutation::Company(change) => {
                if let Some(company) = self.companies.get_mut(&change.company_id) {
                    company.standing = change.standing;
                    if change.reset_idle {
                        company.ticks_since_action = 0;
                    }
                }
            }
            Mutation::MapTick(change) => {
                if let Some(map) = self.maps.get_mut(&change.map_id) {
                    map.current_tick = change.new_tick;
                }
            }
            Mutation::AppendAttack(record) => self.attacks.push(record),
            Mutation::AppendTransaction(transaction) => self.transactions.push(transaction),
            Mutation::AppendTickLog(entry) => self.tick_log.push(entry),
            Mutation::MarkDirty {
                map_id,
                building_ids,
            } => {
                self.dirty.entry(map_id).or_default().extend(building_ids);
            }
        }
    }
}

fn done<T>(value: Result<T, StoreError>) -> Ready<Result<T, StoreError>> {
    ready(value)
}

impl Store for MemoryStore {
    fn company(
        &self,
        id: CompanyId,
    ) -> impl Future<Output = Result<Option<Company>, StoreError>> + Send {
        done(Ok(self.guard().companies.get(&id).cloned()))
    }

    fn building(
        &self,
        id: BuildingId,
    ) -> impl Future<Output = Result<Option<Building>, StoreError>> + Send {
        done(Ok(self.guard().buildings.get(&id).cloned()))
    }

    fn map(&self, id: MapId) -> impl Future<Output = Result<Option<MapConfig>, StoreError>> + Send {
        done(Ok(self.guard().maps.get(&id).cloned()))
    }

    fn map_ids(&self) -> impl Future<Output = Result<Vec<MapId>, StoreError>> + Send {
        let ids: Vec<MapId> = self.guard().maps.keys().copied().collect();
        done(Ok(ids))
    }

    fn buildings_near(
        &self,
        map_id: MapId,
        center: GridPos,
        radius: u32,
    ) -> impl Future<Output = Result<Vec<Building>, StoreError>> + Send {
        let near: Vec<Building> = self
            .guard()
            .buildings
            .values()
            .filter(|b| b.map_id == map_id && b.pos.chebyshev_distance(center) <= radius)
            .cloned()
            .collect();
        done(Ok(near))
    }

    fn map_buildings(
        &self,
        map_id: MapId,
    ) -> impl Future<Output = Result<Vec<Building>, StoreError>> + Send {
        let all: Vec<Building> = self
            .guard()
            .buildings
            .values()
            .filter(|b| b.map_id == map_id)
            .cloned()
            .collect();
        done(Ok(all))
    }

    fn drain_dirty(
        &self,
        map_id: MapId,
    ) -> impl Future<Output = Result<BTreeSet<BuildingId>, StoreError>> + Send {
        done(Ok(self.guard().dirty.remove(&map_id).unwrap_or_default()))
    }

    fn requeue_dirty(
        &self,
        map_id: MapId,
        ids: &BTreeSet<BuildingId>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        if !ids.is_empty() {
            self.guard()
                .dirty
                .entry(map_id)
                .or_default()
                .extend(ids.iter().copied());
        }
        done(Ok(()))
    }

    fn commit(&self, batch: Batch) -> impl Future<Output = Result<(), StoreError>> + Send {
        done(self.commit_sync(batch))
    }
}
