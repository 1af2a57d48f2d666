//! Row types read from `PostgreSQL` and their conversion to domain values.
//!
//! Enums are stored as `TEXT` using their snake case names; weekdays as
//! `SMALLINT` days from Monday. Conversions never panic: anything out of
//! range becomes [`DbError::Corrupt`].

use chrono::Weekday;
use rust_decimal::Decimal;
use uuid::Uuid;

use gridcity_types::{
    Building, BuildingCondition, Company, CompanyStanding, GridPos, LocationType, MapConfig,
    SecurityConfig,
};

use crate::error::DbError;

/// A row from the `companies` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompanyRow {
    /// Company UUID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Company level.
    pub level: i32,
    /// Cash on hand.
    pub cash: Decimal,
    /// Prison flag.
    pub is_in_prison: bool,
    /// Outstanding fine.
    pub prison_fine: Decimal,
    /// Ticks since the last action.
    pub ticks_since_action: i32,
    /// Map the company is playing.
    pub current_map_id: Option<Uuid>,
}

impl TryFrom<CompanyRow> for Company {
    type Error = DbError;

    fn try_from(row: CompanyRow) -> Result<Self, Self::Error> {
        let level = u32::try_from(row.level)
            .map_err(|e| DbError::Corrupt(format!("company {} level: {e}", row.id)))?;
        let ticks_since_action = u32::try_from(row.ticks_since_action)
            .map_err(|e| DbError::Corrupt(format!("company {} idle ticks: {e}", row.id)))?;
        Ok(Self {
            id: row.id.into(),
            name: row.name,
            level,
            standing: CompanyStanding {
                cash: row.cash,
                is_in_prison: row.is_in_prison,
                prison_fine: row.prison_fine,
            },
            ticks_since_action,
            current_map_id: row.current_map_id.map(Into::into),
        })
    }
}

/// A row from the `buildings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
#[allow(clippy::struct_excessive_bools)]
pub struct BuildingRow {
    /// Building UUID.
    pub id: Uuid,
    /// Map UUID.
    pub map_id: Uuid,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Building type name.
    pub building_type: String,
    /// Owning company UUID.
    pub owner: Uuid,
    /// Damage, 0 to 100.
    pub damage_percent: i16,
    /// Burning flag.
    pub is_on_fire: bool,
    /// Collapsed flag.
    pub is_collapsed: bool,
    /// Current profit per tick.
    pub profit: Decimal,
    /// Whether a security configuration is installed.
    pub has_security: bool,
    /// Cameras installed.
    pub cameras: bool,
    /// Guard dogs installed.
    pub guard_dogs: bool,
    /// Security guards installed.
    pub security_guards: bool,
    /// Sprinklers installed.
    pub sprinklers: bool,
}

impl TryFrom<BuildingRow> for Building {
    type Error = DbError;

    fn try_from(row: BuildingRow) -> Result<Self, Self::Error> {
        let damage_percent = u8::try_from(row.damage_percent)
            .map_err(|e| DbError::Corrupt(format!("building {} damage: {e}", row.id)))?;
        let security = row.has_security.then_some(SecurityConfig {
            cameras: row.cameras,
            guard_dogs: row.guard_dogs,
            security_guards: row.security_guards,
            sprinklers: row.sprinklers,
        });
        Ok(Self {
            id: row.id.into(),
            map_id: row.map_id.into(),
            pos: GridPos::new(row.x, row.y),
            building_type: row.building_type,
            owner: row.owner.into(),
            condition: BuildingCondition {
                damage_percent,
                is_on_fire: row.is_on_fire,
                is_collapsed: row.is_collapsed,
            },
            profit: row.profit,
            security,
        })
    }
}

/// A row from the `maps` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MapRow {
    /// Map UUID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// `town`, `city` or `capital`.
    pub location_type: String,
    /// Strike weekday as days from Monday.
    pub police_strike_day: Option<i16>,
    /// Last committed tick.
    pub current_tick: i64,
}

impl TryFrom<MapRow> for MapConfig {
    type Error = DbError;

    fn try_from(row: MapRow) -> Result<Self, Self::Error> {
        let location_type = row
            .location_type
            .parse::<LocationType>()
            .map_err(|e| DbError::Corrupt(format!("map {}: {e}", row.id)))?;
        let police_strike_day = row
            .police_strike_day
            .map(|day| weekday_from_db(day).ok_or_else(|| {
                DbError::Corrupt(format!("map {} strike day {day}", row.id))
            }))
            .transpose()?;
        let current_tick = u64::try_from(row.current_tick)
            .map_err(|e| DbError::Corrupt(format!("map {} tick: {e}", row.id)))?;
        Ok(Self {
            id: row.id.into(),
            name: row.name,
            location_type,
            police_strike_day,
            current_tick,
        })
    }
}

/// Days from Monday, as stored.
pub const fn weekday_to_db(day: Weekday) -> i16 {
    match day {
        Weekday::Mon => 0,
        Weekday::Tue => 1,
        Weekday::Wed => 2,
        Weekday::Thu => 3,
        Weekday::Fri => 4,
        Weekday::Sat => 5,
        Weekday::Sun => 6,
    }
}

/// Inverse of [`weekday_to_db`].
pub fn weekday_from_db(day: i16) -> Option<Weekday> {
    u8::try_from(day).ok().and_then(|d| Weekday::try_from(d).ok())
}

/// Saturating conversion for counters stored as `BIGINT`.
pub fn u64_to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
