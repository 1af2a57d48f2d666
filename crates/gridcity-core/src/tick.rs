//! Planning of one simulation tick for one map.
//!
//! [`plan_tick`] is pure: it takes the drained dirty set and a snapshot of
//! the map's buildings and returns the batch to commit together with the
//! summary to report. The engine owns locking, draining, retries and
//! requeueing.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, warn};

use gridcity_types::{
    Building, BuildingCondition, BuildingId, MapConfig, MapId, TickFailure, TickLogEntry,
};

use crate::batch::{Batch, BuildingChange, MapTickChange};
use crate::config::SimConfig;
use crate::dirty::DirtySetTracker;
use crate::error::SimError;
use crate::fire::process_fires;
use crate::profit::compute_profit;
use crate::rng::RollSource;

/// Result of a committed tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Map that ticked.
    pub map_id: MapId,
    /// Tick number reached.
    pub tick: u64,
    /// Buildings whose condition or profit was written.
    pub buildings_updated: u32,
    /// Buildings ignited by spreading fire.
    pub fire_spread_events: u32,
    /// Buildings that collapsed, including repaired ones.
    pub collapse_events: u32,
    /// Buildings skipped this tick.
    pub failures: Vec<TickFailure>,
}

impl TickSummary {
    /// The tick log row for this summary.
    pub fn to_log_entry(&self, created_at: DateTime<Utc>) -> TickLogEntry {
        TickLogEntry {
            map_id: self.map_id,
            tick: self.tick,
            buildings_updated: self.buildings_updated,
            fire_spread_events: self.fire_spread_events,
            collapse_events: self.collapse_events,
            failures: self.failures.clone(),
            created_at,
        }
    }
}

/// A planned tick.
#[derive(Debug, Clone)]
pub struct TickPlan {
    /// Everything the tick writes, including the tick log entry.
    pub batch: Batch,
    /// What to report once the batch commits.
    pub summary: TickSummary,
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn fail(map_id: MapId, building_id: BuildingId, reason: String) -> TickFailure {
    warn!(%map_id, building = %building_id, %reason, "Skipping building this tick");
    TickFailure {
        building_id,
        reason,
    }
}

/// Plan one tick of `map` over `buildings` (every building on the map) for
/// the ids in `drained`.
///
/// # Errors
///
/// Returns [`SimError::InvariantViolation`] if the tick counter would
/// overflow. Per-building problems never fail the tick; they are reported
/// in [`TickSummary::failures`].
pub fn plan_tick(
    map: &MapConfig,
    buildings: Vec<Building>,
    drained: &BTreeSet<BuildingId>,
    config: &SimConfig,
    rolls: &mut dyn RollSource,
    now: DateTime<Utc>,
) -> Result<TickPlan, SimError> {
    let tracker = DirtySetTracker::new(config.grid.neighbor_radius);
    let mut snapshot: BTreeMap<BuildingId, Building> = buildings
        .into_iter()
        .filter(|b| b.map_id == map.id)
        .map(|b| (b.id, b))
        .collect();
    let original: BTreeMap<BuildingId, BuildingCondition> = snapshot
        .iter()
        .map(|(id, b)| (*id, b.condition))
        .collect();
    let mut failures = Vec::new();

    // Repair drained buildings whose stored condition is impossible.
    let mut repaired = BTreeSet::new();
    for id in drained {
        let Some(building) = snapshot.get_mut(id) else {
            failures.push(fail(map.id, *id, "building not found on map".to_owned()));
            continue;
        };
        if !building.condition.is_consistent() {
            error!(
                map_id = %map.id,
                building = %id,
                damage = building.condition.damage_percent,
                on_fire = building.condition.is_on_fire,
                collapsed = building.condition.is_collapsed,
                "Inconsistent building condition, repairing"
            );
            building.condition = building.condition.repaired();
            repaired.insert(*id);
        }
    }

    let fire = process_fires(&mut snapshot, &config.fire, rolls);

    let mut profits: BTreeMap<BuildingId, Decimal> = BTreeMap::new();
    for id in drained {
        let Some(building) = snapshot.get(id) else {
            continue;
        };
        let Some(base) = config.profit.base_profit.get(&building.building_type) else {
            failures.push(fail(
                map.id,
                *id,
                format!("unknown building type {:?}", building.building_type),
            ));
            continue;
        };
        let neighbours = snapshot
            .values()
            .filter(|b| {
                b.id != building.id
                    && b.pos.chebyshev_distance(building.pos) <= tracker.radius()
            })
            .map(|b| b.condition.damage_percent);
        match compute_profit(
            *base,
            building.condition.damage_percent,
            neighbours,
            &config.profit,
        ) {
            Ok(profit) => {
                profits.insert(*id, profit);
            }
            Err(e) => failures.push(fail(map.id, *id, e.to_string())),
        }
    }

    let condition_changed: BTreeSet<BuildingId> =
        fire.changed.union(&repaired).copied().collect();
    let written: BTreeSet<BuildingId> = condition_changed
        .iter()
        .chain(profits.keys())
        .copied()
        .collect();

    let mut batch = Batch::new();
    for id in &written {
        let (Some(building), Some(expected)) = (snapshot.get(id), original.get(id)) else {
            continue;
        };
        batch.update_building(BuildingChange {
            building_id: *id,
            expected: *expected,
            condition: building.condition,
            profit: profits.get(id).copied(),
        });
    }

    let centers: Vec<_> = condition_changed
        .iter()
        .filter_map(|id| snapshot.get(id).map(|b| b.pos))
        .collect();
    let next_tick_dirty =
        tracker.mark_from_snapshot(&mut batch, map.id, centers, snapshot.values());

    let tick = map
        .current_tick
        .checked_add(1)
        .ok_or_else(|| SimError::invariant(format!("tick counter of map {} overflowed", map.id)))?;
    batch.advance_map_tick(MapTickChange {
        map_id: map.id,
        expected_tick: map.current_tick,
        new_tick: tick,
    });

    let summary = TickSummary {
        map_id: map.id,
        tick,
        buildings_updated: count(written.len()),
        fire_spread_events: count(fire.ignited.len()),
        collapse_events: count(fire.collapsed.union(&repaired).count()),
        failures,
    };
    batch.append_tick_log(summary.to_log_entry(now));

    debug!(
        map_id = %map.id,
        tick,
        drained = drained.len(),
        mutations = batch.len(),
        next_tick_dirty,
        "Tick planned"
    );
    Ok(TickPlan { batch, summary })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use gridcity_types::{CompanyId, GridPos, LocationType};

    use super::*;
    use crate::batch::Mutation;
    use crate::rng::ScriptedRolls;

    fn map() -> MapConfig {
        MapConfig {
            id: MapId::new(),
            name: "Harbour".to_owned(),
            location_type: LocationType::City,
            police_strike_day: None,
            current_tick: 41,
        }
    }

    fn building(map_id: MapId, x: i32, y: i32, kind: &str, damage: u8) -> Building {
        Building {
            id: BuildingId::new(),
            map_id,
            pos: GridPos::new(x, y),
            building_type: kind.to_owned(),
            owner: CompanyId::new(),
            condition: BuildingCondition {
                damage_percent: damage,
                ..BuildingCondition::default()
            },
            profit: Decimal::ZERO,
            security: None,
        }
    }

    fn building_changes(batch: &Batch) -> BTreeMap<BuildingId, BuildingChange> {
        batch
            .mutations()
            .iter()
            .filter_map(|m| match m {
                Mutation::Building(change) => Some((change.building_id, change.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn recomputes_only_drained_buildings() {
        let map = map();
        let shop = building(map.id, 0, 0, "shop", 0);
        let mut ruin = building(map.id, 1, 0, "bank", 100);
        ruin.condition.is_collapsed = true;
        let untouched = building(map.id, 5, 5, "office", 0);
        let drained = BTreeSet::from([shop.id]);

        let plan = plan_tick(
            &map,
            vec![shop.clone(), ruin, untouched.clone()],
            &drained,
            &SimConfig::default(),
            &mut ScriptedRolls::never(),
            Utc::now(),
        )
        .unwrap();

        let changes = building_changes(&plan.batch);
        assert_eq!(changes.len(), 1);
        // 100 × 1 × (1 − 0.1)
        assert_eq!(changes[&shop.id].profit, Some(Decimal::new(90, 0)));
        assert!(!changes.contains_key(&untouched.id));
        assert_eq!(plan.summary.tick, 42);
        assert_eq!(plan.summary.buildings_updated, 1);
    }

    #[test]
    fn per_building_failures_do_not_abort() {
        let map = map();
        let odd = building(map.id, 0, 0, "lighthouse", 0);
        let fine = building(map.id, 9, 9, "shop", 0);
        let vanished = BuildingId::new();
        let drained = BTreeSet::from([odd.id, fine.id, vanished]);

        let plan = plan_tick(
            &map,
            vec![odd.clone(), fine.clone()],
            &drained,
            &SimConfig::default(),
            &mut ScriptedRolls::never(),
            Utc::now(),
        )
        .unwrap();

        let failed: BTreeSet<BuildingId> =
            plan.summary.failures.iter().map(|f| f.building_id).collect();
        assert_eq!(failed, BTreeSet::from([odd.id, vanished]));
        assert!(building_changes(&plan.batch).contains_key(&fine.id));
    }

    #[test]
    fn inconsistent_condition_is_repaired_and_counted() {
        let map = map();
        let broken = building(map.id, 0, 0, "shop", 100);
        let drained = BTreeSet::from([broken.id]);

        let plan = plan_tick(
            &map,
            vec![broken.clone()],
            &drained,
            &SimConfig::default(),
            &mut ScriptedRolls::never(),
            Utc::now(),
        )
        .unwrap();

        let change = &building_changes(&plan.batch)[&broken.id];
        assert_eq!(change.expected, broken.condition);
        assert!(change.condition.is_collapsed);
        assert!(change.condition.is_consistent());
        assert_eq!(plan.summary.collapse_events, 1);
    }

    #[test]
    fn fire_changes_dirty_next_tick_neighbourhood() {
        let map = map();
        let mut burning = building(map.id, 0, 0, "shop", 10);
        burning.condition.is_on_fire = true;
        let near = building(map.id, 2, 2, "shop", 0);
        let far = building(map.id, 3, 0, "shop", 0);

        // No spread (nothing adjacent), fire keeps burning.
        let plan = plan_tick(
            &map,
            vec![burning.clone(), near.clone(), far.clone()],
            &BTreeSet::new(),
            &SimConfig::default(),
            &mut ScriptedRolls::never(),
            Utc::now(),
        )
        .unwrap();

        let change = &building_changes(&plan.batch)[&burning.id];
        assert_eq!(change.condition.damage_percent, 15);
        assert_eq!(change.profit, None);
        assert_eq!(plan.batch.dirty_ids(), BTreeSet::from([burning.id, near.id]));
    }

    #[test]
    fn batch_ends_with_tick_advance_and_log() {
        let map = map();
        let plan = plan_tick(
            &map,
            Vec::new(),
            &BTreeSet::new(),
            &SimConfig::default(),
            &mut ScriptedRolls::never(),
            Utc::now(),
        )
        .unwrap();

        let kinds: Vec<&str> = plan.batch.mutations().iter().map(Mutation::kind).collect();
        assert_eq!(kinds, vec!["map_tick", "tick_log"]);
        assert_eq!(plan.summary.buildings_updated, 0);
    }

    #[test]
    fn tick_counter_overflow_is_an_invariant_violation() {
        let mut map = map();
        map.current_tick = u64::MAX;
        let result = plan_tick(
            &map,
            Vec::new(),
            &BTreeSet::new(),
            &SimConfig::default(),
            &mut ScriptedRolls::never(),
            Utc::now(),
        );
        assert!(matches!(result, Err(SimError::InvariantViolation { .. })));
    }
}
