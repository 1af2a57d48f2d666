//! Core entity structs for the Gridcity simulation.
//!
//! Covers the grid (`Tile`, `GridPos`), buildings and their condition,
//! companies, map configuration, and the append-only records written by the
//! attack, fine and tick operations.

use chrono::{DateTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::enums::{CaughtBy, LocationType, TerrainType, TransactionKind, TrickType};
use crate::ids::{AttackId, BuildingId, CompanyId, MapId, TransactionId};

/// Damage at which a building collapses.
pub const MAX_DAMAGE: u8 = 100;

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A tile coordinate on a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GridPos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridPos {
    /// Create a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (king-move) distance between two positions.
    pub const fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy { dx } else { dy }
    }
}

/// A single grid tile. Terrain is immutable; ownership is managed outside
/// the simulation core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Tile {
    /// Map the tile belongs to.
    pub map_id: MapId,
    /// Coordinate of the tile.
    pub pos: GridPos,
    /// Terrain of the tile.
    pub terrain: TerrainType,
    /// Landmark occupying the tile, if any.
    pub special_building: Option<String>,
    /// Company that owns the land, if any.
    pub owner: Option<CompanyId>,
}

// ---------------------------------------------------------------------------
// Buildings
// ---------------------------------------------------------------------------

/// Security measures installed in a building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[allow(clippy::struct_excessive_bools)]
pub struct SecurityConfig {
    /// CCTV cameras.
    pub cameras: bool,
    /// Guard dogs.
    pub guard_dogs: bool,
    /// Human security guards.
    pub security_guards: bool,
    /// Fire sprinklers (affect fire, not detection).
    pub sprinklers: bool,
}

/// The mutable physical state of a building.
///
/// `is_collapsed` holds exactly when `damage_percent` reaches
/// [`MAX_DAMAGE`], and a collapsed building is never on fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BuildingCondition {
    /// Damage in percent, 0 to 100.
    pub damage_percent: u8,
    /// Whether the building is burning.
    pub is_on_fire: bool,
    /// Terminal state; the building is rubble.
    pub is_collapsed: bool,
}

impl BuildingCondition {
    /// Add damage, saturating at [`MAX_DAMAGE`]. Reaching the cap collapses
    /// the building and puts out any fire.
    #[must_use]
    pub const fn with_damage(self, amount: u8) -> Self {
        let total = self.damage_percent.saturating_add(amount);
        let damage_percent = if total > MAX_DAMAGE { MAX_DAMAGE } else { total };
        let is_collapsed = damage_percent >= MAX_DAMAGE;
        Self {
            damage_percent,
            is_on_fire: self.is_on_fire && !is_collapsed,
            is_collapsed,
        }
    }

    /// Whether the collapse/fire invariants hold.
    pub const fn is_consistent(self) -> bool {
        let should_collapse = self.damage_percent >= MAX_DAMAGE;
        self.is_collapsed == should_collapse
            && !(self.is_collapsed && self.is_on_fire)
            && self.damage_percent <= MAX_DAMAGE
    }

    /// Force the invariants: cap damage, collapse at the cap, no fire on
    /// rubble.
    #[must_use]
    pub const fn repaired(self) -> Self {
        let damage_percent = if self.damage_percent > MAX_DAMAGE {
            MAX_DAMAGE
        } else {
            self.damage_percent
        };
        let is_collapsed = self.is_collapsed || damage_percent >= MAX_DAMAGE;
        Self {
            damage_percent: if is_collapsed { MAX_DAMAGE } else { damage_percent },
            is_on_fire: self.is_on_fire && !is_collapsed,
            is_collapsed,
        }
    }
}

/// A building instance placed on a tile. Buildings are never deleted, only
/// flagged collapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Building {
    /// Unique identifier.
    pub id: BuildingId,
    /// Map the building stands on.
    pub map_id: MapId,
    /// Tile the building occupies.
    pub pos: GridPos,
    /// Key into the base-profit and flammability tables.
    pub building_type: String,
    /// Owning company.
    pub owner: CompanyId,
    /// Damage, fire and collapse state.
    pub condition: BuildingCondition,
    /// Profit from the last recomputation. Negative past the zero-profit
    /// damage threshold.
    #[ts(as = "String")]
    pub profit: Decimal,
    /// Installed security, if any.
    pub security: Option<SecurityConfig>,
}

impl Building {
    /// Whether the building has sprinklers installed.
    pub fn has_sprinklers(&self) -> bool {
        self.security.is_some_and(|s| s.sprinklers)
    }
}

// ---------------------------------------------------------------------------
// Companies
// ---------------------------------------------------------------------------

/// Cash and prison state of a company. Attacks and fine payments guard on
/// this snapshot when committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CompanyStanding {
    /// Cash on hand.
    #[ts(as = "String")]
    pub cash: Decimal,
    /// Whether the company is serving a sentence.
    pub is_in_prison: bool,
    /// Outstanding fine; zero when not in prison.
    #[ts(as = "String")]
    pub prison_fine: Decimal,
}

impl CompanyStanding {
    /// A free company holding `cash`.
    pub const fn free(cash: Decimal) -> Self {
        Self {
            cash,
            is_in_prison: false,
            prison_fine: Decimal::ZERO,
        }
    }
}

/// A player company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Company {
    /// Unique identifier.
    pub id: CompanyId,
    /// Display name.
    pub name: String,
    /// Progression level; gates tricks.
    pub level: u32,
    /// Cash and prison state.
    pub standing: CompanyStanding,
    /// Ticks since the company last took a game action.
    pub ticks_since_action: u32,
    /// Map the company is currently playing on.
    pub current_map_id: Option<MapId>,
}

// ---------------------------------------------------------------------------
// Maps
// ---------------------------------------------------------------------------

/// Configuration and clock of one map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MapConfig {
    /// Unique identifier.
    pub id: MapId,
    /// Display name.
    pub name: String,
    /// Settlement tier; scales fines.
    pub location_type: LocationType,
    /// Weekday (UTC) on which the police are on strike.
    #[ts(as = "Option<String>")]
    pub police_strike_day: Option<Weekday>,
    /// Number of ticks committed so far.
    pub current_tick: u64,
}

impl MapConfig {
    /// Whether the police work on the given weekday.
    pub fn police_active_on(&self, day: Weekday) -> bool {
        self.police_strike_day != Some(day)
    }
}

// ---------------------------------------------------------------------------
// Append-only records
// ---------------------------------------------------------------------------

/// Immutable record of one resolved attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AttackRecord {
    /// Unique identifier.
    pub id: AttackId,
    /// Company that performed the trick.
    pub attacker: CompanyId,
    /// Owner of the target building.
    pub target_company: CompanyId,
    /// Building that was hit.
    pub target_building: BuildingId,
    /// Map of the target building.
    pub map_id: MapId,
    /// Trick performed.
    pub trick: TrickType,
    /// Damage actually added (after the 100% cap).
    pub damage_dealt: u8,
    /// Whether the attacker was caught.
    pub was_caught: bool,
    /// Who caught the attacker.
    pub caught_by: Option<CaughtBy>,
    /// Fine imposed; zero when not caught.
    #[ts(as = "String")]
    pub fine_amount: Decimal,
    /// When the attack was resolved.
    pub created_at: DateTime<Utc>,
}

/// Immutable record of a cash movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerTransaction {
    /// Unique identifier.
    pub id: TransactionId,
    /// Company whose cash moved.
    pub company: CompanyId,
    /// Category.
    pub kind: TransactionKind,
    /// Amount debited; always positive.
    #[ts(as = "String")]
    pub amount: Decimal,
    /// Human-readable reason.
    pub reason: String,
    /// Id of the record that caused the movement (attack id, for example).
    pub reference_id: Option<Uuid>,
    /// When the movement was recorded.
    pub created_at: DateTime<Utc>,
}

/// A building that could not be processed during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TickFailure {
    /// The building that failed.
    pub building_id: BuildingId,
    /// What went wrong.
    pub reason: String,
}

/// Summary of one committed tick, appended to the tick log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TickLogEntry {
    /// Map that ticked.
    pub map_id: MapId,
    /// Tick number after the advance.
    pub tick: u64,
    /// Buildings whose profit was recomputed.
    pub buildings_updated: u32,
    /// Buildings ignited by spreading fire.
    pub fire_spread_events: u32,
    /// Buildings that collapsed.
    pub collapse_events: u32,
    /// Buildings that could not be processed.
    pub failures: Vec<TickFailure>,
    /// When the tick was committed.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_distance_is_king_moves() {
        let origin = GridPos::new(0, 0);
        assert_eq!(origin.chebyshev_distance(GridPos::new(1, 1)), 1);
        assert_eq!(origin.chebyshev_distance(GridPos::new(-2, 1)), 2);
        assert_eq!(origin.chebyshev_distance(GridPos::new(3, -5)), 5);
        assert_eq!(origin.chebyshev_distance(origin), 0);
    }

    #[test]
    fn damage_saturates_and_collapses() {
        let burning = BuildingCondition {
            damage_percent: 65,
            is_on_fire: true,
            is_collapsed: false,
        };
        let hit = burning.with_damage(40);
        assert_eq!(hit.damage_percent, 100);
        assert!(hit.is_collapsed);
        assert!(!hit.is_on_fire);
        assert!(hit.is_consistent());
    }

    #[test]
    fn partial_damage_keeps_fire() {
        let burning = BuildingCondition {
            damage_percent: 10,
            is_on_fire: true,
            is_collapsed: false,
        };
        let hit = burning.with_damage(5);
        assert_eq!(hit.damage_percent, 15);
        assert!(hit.is_on_fire);
        assert!(!hit.is_collapsed);
    }

    #[test]
    fn repair_fixes_uncollapsed_rubble() {
        let broken = BuildingCondition {
            damage_percent: 100,
            is_on_fire: true,
            is_collapsed: false,
        };
        assert!(!broken.is_consistent());
        let fixed = broken.repaired();
        assert!(fixed.is_consistent());
        assert!(fixed.is_collapsed);
        assert!(!fixed.is_on_fire);
    }

    #[test]
    fn police_strike_day() {
        let map = MapConfig {
            id: MapId::new(),
            name: String::from("Harbour"),
            location_type: LocationType::Town,
            police_strike_day: Some(Weekday::Wed),
            current_tick: 0,
        };
        assert!(!map.police_active_on(Weekday::Wed));
        assert!(map.police_active_on(Weekday::Thu));
    }

    #[test]
    fn building_serializes_profit_as_string() {
        let building = Building {
            id: BuildingId::new(),
            map_id: MapId::new(),
            pos: GridPos::new(3, 4),
            building_type: String::from("shop"),
            owner: CompanyId::new(),
            condition: BuildingCondition::default(),
            profit: Decimal::new(12_050, 2),
            security: None,
        };
        let json = serde_json::to_value(&building).unwrap();
        assert_eq!(json["profit"], "120.50");
        assert_eq!(json["building_type"], "shop");
    }
}
