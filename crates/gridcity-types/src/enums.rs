//! Enumeration types for the Gridcity simulation core.
//!
//! Wire names are `snake_case` everywhere (serde, database `TEXT` columns,
//! trick identifiers submitted by players).

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// The immutable terrain of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TerrainType {
    /// Buildable open land.
    FreeLand,
    /// Water; never carries a building.
    Water,
    /// Paved road.
    Road,
    /// Unpaved track.
    DirtTrack,
    /// Wooded tile.
    Trees,
}

impl TerrainType {
    /// Database / wire name of this terrain.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeLand => "free_land",
            Self::Water => "water",
            Self::Road => "road",
            Self::DirtTrack => "dirt_track",
            Self::Trees => "trees",
        }
    }
}

// ---------------------------------------------------------------------------
// Map location tier
// ---------------------------------------------------------------------------

/// Settlement tier of a map. Scales the fine charged to caught attackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LocationType {
    /// Small settlement (x1.0).
    Town,
    /// Mid-size settlement (x1.5).
    City,
    /// Capital (x2.0).
    Capital,
}

impl LocationType {
    /// Fine multiplier for this tier.
    pub const fn fine_multiplier(self) -> Decimal {
        match self {
            Self::Town => Decimal::ONE,
            Self::City => Decimal::from_parts(15, 0, 0, false, 1),
            Self::Capital => Decimal::TWO,
        }
    }

    /// Database / wire name of this tier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Town => "town",
            Self::City => "city",
            Self::Capital => "capital",
        }
    }
}

impl FromStr for LocationType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "town" => Ok(Self::Town),
            "city" => Ok(Self::City),
            "capital" => Ok(Self::Capital),
            other => Err(UnknownVariant::new("location type", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tricks
// ---------------------------------------------------------------------------

/// The closed set of dirty tricks a company can perform.
///
/// Numbers (cost, damage, catch rates) live in the trick catalog data
/// table, not here; this enum only names the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TrickType {
    /// Spray-paint the facade.
    Graffiti,
    /// Smoke out the premises.
    SmokeBomb,
    /// Make the building unbearable for customers.
    StinkBomb,
    /// Start a small fire.
    CauseFire,
    /// Firebomb the building.
    FireBomb,
}

impl TrickType {
    /// Every trick, in catalog order.
    pub const ALL: [Self; 5] = [
        Self::Graffiti,
        Self::SmokeBomb,
        Self::StinkBomb,
        Self::CauseFire,
        Self::FireBomb,
    ];

    /// Database / wire name of this trick.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Graffiti => "graffiti",
            Self::SmokeBomb => "smoke_bomb",
            Self::StinkBomb => "stink_bomb",
            Self::CauseFire => "cause_fire",
            Self::FireBomb => "fire_bomb",
        }
    }
}

impl fmt::Display for TrickType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrickType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|trick| trick.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("trick", s))
    }
}

// ---------------------------------------------------------------------------
// Catch attribution
// ---------------------------------------------------------------------------

/// Who caught an attacker. At most one attribution is ever recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CaughtBy {
    /// The target building's own security.
    Security,
    /// The map's police force.
    Police,
}

impl CaughtBy {
    /// Database / wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Police => "police",
        }
    }
}

impl FromStr for CaughtBy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "security" => Ok(Self::Security),
            "police" => Ok(Self::Police),
            other => Err(UnknownVariant::new("catch source", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger transaction kinds
// ---------------------------------------------------------------------------

/// Category of a cash ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TransactionKind {
    /// Cost of performing a dirty trick.
    TrickCost,
    /// Settlement of a prison fine.
    FinePayment,
}

impl TransactionKind {
    /// Database / wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TrickCost => "trick_cost",
            Self::FinePayment => "fine_payment",
        }
    }
}

// ---------------------------------------------------------------------------
// Parse error
// ---------------------------------------------------------------------------

/// A string did not name any variant of the expected enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    /// Human-readable name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}
