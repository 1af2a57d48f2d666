//! The unit of atomic commit.
//!
//! Every engine operation plans its effects into a [`Batch`] and hands it to
//! [`Store::commit`](crate::store::Store::commit). Mutations carry the value
//! the planner read (`expected`) so the store can reject the whole batch if
//! anything changed underneath it.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use gridcity_types::{
    AttackRecord, BuildingCondition, BuildingId, CompanyId, CompanyStanding, LedgerTransaction,
    MapId, TickLogEntry,
};

/// Guarded update of a building's condition and profit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingChange {
    /// Building to update.
    pub building_id: BuildingId,
    /// Condition the planner read.
    pub expected: BuildingCondition,
    /// Condition to write.
    pub condition: BuildingCondition,
    /// New profit, when recomputed.
    pub profit: Option<Decimal>,
}

/// Guarded update of a company's cash and prison state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyChange {
    /// Company to update.
    pub company_id: CompanyId,
    /// Standing the planner read.
    pub expected: CompanyStanding,
    /// Standing to write.
    pub standing: CompanyStanding,
    /// Reset the idle-tick counter.
    pub reset_idle: bool,
}

/// Guarded advance of a map's tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapTickChange {
    /// Map to advance.
    pub map_id: MapId,
    /// Tick the planner read.
    pub expected_tick: u64,
    /// Tick to write.
    pub new_tick: u64,
}

/// One entry of a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Update a building.
    Building(BuildingChange),
    /// Update a company.
    Company(CompanyChange),
    /// Advance a map's tick counter.
    MapTick(MapTickChange),
    /// Append an attack record.
    AppendAttack(AttackRecord),
    /// Append a ledger transaction.
    AppendTransaction(LedgerTransaction),
    /// Append a tick log entry.
    AppendTickLog(TickLogEntry),
    /// Add buildings to a map's dirty set.
    MarkDirty {
        /// Map whose dirty set grows.
        map_id: MapId,
        /// Buildings to mark.
        building_ids: BTreeSet<BuildingId>,
    },
}

impl Mutation {
    /// Short label for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Building(_) => "building",
            Self::Company(_) => "company",
            Self::MapTick(_) => "map_tick",
            Self::AppendAttack(_) => "attack",
            Self::AppendTransaction(_) => "transaction",
            Self::AppendTickLog(_) => "tick_log",
            Self::MarkDirty { .. } => "mark_dirty",
        }
    }
}

/// An ordered list of mutations applied all or nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    mutations: Vec<Mutation>,
}

impl Batch {
    /// An empty batch.
    pub const fn new() -> Self {
        Self {
            mutations: Vec::new(),
        }
    }

    /// Queue a guarded building update.
    pub fn update_building(&mut self, change: BuildingChange) {
        self.mutations.push(Mutation::Building(change));
    }

    /// Queue a guarded company update.
    pub fn update_company(&mut self, change: CompanyChange) {
        self.mutations.push(Mutation::Company(change));
    }

    /// Queue a guarded map tick advance.
    pub fn advance_map_tick(&mut self, change: MapTickChange) {
        self.mutations.push(Mutation::MapTick(change));
    }

    /// Queue an attack record.
    pub fn append_attack(&mut self, record: AttackRecord) {
        self.mutations.push(Mutation::AppendAttack(record));
    }

    /// Queue a ledger transaction.
    pub fn append_transaction(&mut self, transaction: LedgerTransaction) {
        self.mutations.push(Mutation::AppendTransaction(transaction));
    }

    /// Queue a tick log entry.
    pub fn append_tick_log(&mut self, entry: TickLogEntry) {
        self.mutations.push(Mutation::AppendTickLog(entry));
    }

    /// Queue dirty marks. Empty sets are dropped.
    pub fn mark_dirty(&mut self, map_id: MapId, building_ids: BTreeSet<BuildingId>) {
        if building_ids.is_empty() {
            return;
        }
        self.mutations.push(Mutation::MarkDirty {
            map_id,
            building_ids,
        });
    }

    /// Queued mutations in order.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Consume the batch, yielding its mutations in order.
    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    /// Number of queued mutations.
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Every building id staged as dirty, across maps.
    pub fn dirty_ids(&self) -> BTreeSet<BuildingId> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::MarkDirty { building_ids, .. } => Some(building_ids.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dirty_marks_are_dropped() {
        let mut batch = Batch::new();
        batch.mark_dirty(MapId::new(), BTreeSet::new());
        assert!(batch.is_empty());
    }

    #[test]
    fn mutations_keep_insertion_order() {
        let map_id = MapId::new();
        let building = BuildingId::new();
        let mut batch = Batch::new();
        batch.advance_map_tick(MapTickChange {
            map_id,
            expected_tick: 0,
            new_tick: 1,
        });
        batch.mark_dirty(map_id, BTreeSet::from([building]));

        let kinds: Vec<&str> = batch.mutations().iter().map(Mutation::kind).collect();
        assert_eq!(kinds, vec!["map_tick", "mark_dirty"]);
        assert_eq!(batch.dirty_ids(), BTreeSet::from([building]));
    }
}
