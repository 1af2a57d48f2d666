//! Fire spread, fire damage and self-extinguishing for one tick.
//!
//! Only buildings burning when the tick starts act. Each of them, in id
//! order:
//!
//! 1. tries to ignite every adjacent (Chebyshev distance 1) building that is
//!    standing and not yet burning;
//! 2. takes `damage_per_tick` damage, collapsing (and going out) at 100;
//! 3. if still standing, may burn out on its own.
//!
//! Buildings ignited this tick start burning next tick.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use gridcity_types::{Building, BuildingId};

use crate::config::{BP_SCALE, FireConfig};
use crate::rng::RollSource;

/// What fire did during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FireReport {
    /// Buildings whose condition changed.
    pub changed: BTreeSet<BuildingId>,
    /// Buildings newly ignited by spreading fire.
    pub ignited: BTreeSet<BuildingId>,
    /// Buildings that burned down.
    pub collapsed: BTreeSet<BuildingId>,
    /// Buildings whose fire went out on its own.
    pub extinguished: BTreeSet<BuildingId>,
}

/// Chance that fire jumps from a burning building to `neighbour`.
pub fn spread_chance(neighbour: &Building, config: &FireConfig) -> u32 {
    let flammability = config.flammability.of(&neighbour.building_type);
    let scaled = u64::from(config.spread_chance_bp).saturating_mul(u64::from(flammability)) / 100;
    let base = u32::try_from(scaled).unwrap_or(u32::MAX);
    let reduced = if neighbour.has_sprinklers() {
        base.saturating_sub(config.sprinkler_spread_reduction_bp)
    } else {
        base
    };
    reduced.min(BP_SCALE)
}

/// Chance that a burning building's fire goes out this tick.
pub fn extinguish_chance(building: &Building, config: &FireConfig) -> u32 {
    let chance = if building.has_sprinklers() {
        config
            .self_extinguish_bp
            .saturating_add(config.sprinkler_extinguish_bonus_bp)
    } else {
        config.self_extinguish_bp
    };
    chance.min(BP_SCALE)
}

/// Run one tick of fire over a map snapshot, mutating it in place.
pub fn process_fires(
    buildings: &mut BTreeMap<BuildingId, Building>,
    config: &FireConfig,
    rolls: &mut dyn RollSource,
) -> FireReport {
    let mut report = FireReport::default();
    let burning: Vec<BuildingId> = buildings
        .values()
        .filter(|b| b.condition.is_on_fire && !b.condition.is_collapsed)
        .map(|b| b.id)
        .collect();

    for id in burning {
        let Some(source) = buildings.get(&id) else {
            continue;
        };
        let source_pos = source.pos;

        let candidates: Vec<(BuildingId, u32)> = buildings
            .values()
            .filter(|b| {
                b.id != id
                    && b.pos.chebyshev_distance(source_pos) <= 1
                    && !b.condition.is_collapsed
                    && !b.condition.is_on_fire
            })
            .map(|b| (b.id, spread_chance(b, config)))
            .collect();

        for (neighbour_id, chance) in candidates {
            if !rolls.chance(chance) {
                continue;
            }
            if let Some(neighbour) = buildings.get_mut(&neighbour_id) {
                neighbour.condition.is_on_fire = true;
                report.ignited.insert(neighbour_id);
                report.changed.insert(neighbour_id);
                debug!(from = %id, to = %neighbour_id, chance, "Fire spread");
            }
        }

        let Some(source) = buildings.get_mut(&id) else {
            continue;
        };
        let before = source.condition;
        source.condition = before.with_damage(config.damage_per_tick);
        if source.condition != before {
            report.changed.insert(id);
        }
        if source.condition.is_collapsed {
            report.collapsed.insert(id);
            debug!(building = %id, "Burned down");
            continue;
        }

        let chance = extinguish_chance(source, config);
        if rolls.chance(chance) {
            source.condition.is_on_fire = false;
            report.extinguished.insert(id);
            report.changed.insert(id);
            debug!(building = %id, chance, "Fire went out");
        }
    }
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;

    use gridcity_types::{BuildingCondition, CompanyId, GridPos, MapId, SecurityConfig};

    use super::*;
    use crate::rng::ScriptedRolls;

    fn place(
        map: &mut BTreeMap<BuildingId, Building>,
        map_id: MapId,
        x: i32,
        y: i32,
    ) -> BuildingId {
        let building = Building {
            id: BuildingId::new(),
            map_id,
            pos: GridPos::new(x, y),
            building_type: "shop".to_owned(),
            owner: CompanyId::new(),
            condition: BuildingCondition::default(),
            profit: Decimal::ZERO,
            security: None,
        };
        let id = building.id;
        map.insert(id, building);
        id
    }

    fn ignite(map: &mut BTreeMap<BuildingId, Building>, id: BuildingId, damage: u8) {
        let building = map.get_mut(&id).unwrap();
        building.condition.is_on_fire = true;
        building.condition.damage_percent = damage;
    }

    #[test]
    fn spread_chance_follows_flammability_and_sprinklers() {
        let config = FireConfig::default();
        let mut map = BTreeMap::new();
        let id = place(&mut map, MapId::new(), 0, 0);
        let shop = map.get_mut(&id).unwrap();
        assert_eq!(spread_chance(shop, &config), 2_000);

        shop.building_type = "warehouse".to_owned();
        assert_eq!(spread_chance(shop, &config), 3_000);

        shop.security = Some(SecurityConfig {
            sprinklers: true,
            ..SecurityConfig::default()
        });
        assert_eq!(spread_chance(shop, &config), 1_500);
    }

    #[test]
    fn fire_spreads_only_to_adjacent_standing_buildings() {
        let map_id = MapId::new();
        let mut map = BTreeMap::new();
        let source = place(&mut map, map_id, 0, 0);
        let adjacent = place(&mut map, map_id, 1, 1);
        let rubble = place(&mut map, map_id, -1, 0);
        let far = place(&mut map, map_id, 2, 0);
        ignite(&mut map, source, 10);
        let rubble_building = map.get_mut(&rubble).unwrap();
        rubble_building.condition = BuildingCondition {
            damage_percent: 100,
            is_on_fire: false,
            is_collapsed: true,
        };

        // One spread roll (adjacent), then the extinguish roll.
        let mut rolls = ScriptedRolls::new([0, 9_999]);
        let report = process_fires(&mut map, &FireConfig::default(), &mut rolls);

        assert_eq!(rolls.drawn(), 2);
        assert_eq!(report.ignited, BTreeSet::from([adjacent]));
        assert!(map[&adjacent].condition.is_on_fire);
        assert!(!map[&far].condition.is_on_fire);
        assert!(!map[&rubble].condition.is_on_fire);
        assert_eq!(map[&source].condition.damage_percent, 15);
        assert!(map[&source].condition.is_on_fire);
    }

    #[test]
    fn newly_ignited_buildings_wait_a_tick() {
        let map_id = MapId::new();
        let mut map = BTreeMap::new();
        let source = place(&mut map, map_id, 0, 0);
        let neighbour = place(&mut map, map_id, 0, 1);
        ignite(&mut map, source, 0);

        let mut rolls = ScriptedRolls::new([0, 9_999]);
        process_fires(&mut map, &FireConfig::default(), &mut rolls);

        assert!(map[&neighbour].condition.is_on_fire);
        assert_eq!(map[&neighbour].condition.damage_percent, 0);
    }

    #[test]
    fn fire_damage_collapses_and_extinguishes() {
        let mut map = BTreeMap::new();
        let source = place(&mut map, MapId::new(), 0, 0);
        ignite(&mut map, source, 97);

        let mut rolls = ScriptedRolls::never();
        let report = process_fires(&mut map, &FireConfig::default(), &mut rolls);

        let condition = map[&source].condition;
        assert_eq!(condition.damage_percent, 100);
        assert!(condition.is_collapsed);
        assert!(!condition.is_on_fire);
        assert_eq!(report.collapsed, BTreeSet::from([source]));
        // Collapsed buildings do not roll to extinguish.
        assert_eq!(rolls.drawn(), 0);
    }

    #[test]
    fn sprinklers_help_put_fires_out() {
        let config = FireConfig::default();
        let mut map = BTreeMap::new();
        let source = place(&mut map, MapId::new(), 0, 0);
        ignite(&mut map, source, 0);
        map.get_mut(&source).unwrap().security = Some(SecurityConfig {
            sprinklers: true,
            ..SecurityConfig::default()
        });
        assert_eq!(extinguish_chance(&map[&source], &config), 5_500);

        let mut rolls = ScriptedRolls::new([5_000]);
        let report = process_fires(&mut map, &config, &mut rolls);
        assert_eq!(report.extinguished, BTreeSet::from([source]));
        assert!(!map[&source].condition.is_on_fire);
    }
}
