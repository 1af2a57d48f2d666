//! Shared type definitions for the Gridcity simulation core.
//!
//! Every crate in the workspace speaks in these types. They flow to
//! `TypeScript` via `ts-rs` for the game client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Terrain, location tiers, tricks, catch attribution, ledger kinds
//! - [`structs`] -- Tiles, buildings, companies, maps and append-only records

pub mod enums;
pub mod ids;
pub mod structs;

pub use enums::{CaughtBy, LocationType, TerrainType, TransactionKind, TrickType, UnknownVariant};
pub use ids::{AttackId, BuildingId, CompanyId, MapId, TransactionId};
pub use structs::{
    AttackRecord, Building, BuildingCondition, Company, CompanyStanding, GridPos,
    LedgerTransaction, MAX_DAMAGE, MapConfig, SecurityConfig, TickFailure, TickLogEntry, Tile,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::ids::CompanyId::export_all();
        let _ = crate::ids::BuildingId::export_all();
        let _ = crate::ids::MapId::export_all();
        let _ = crate::ids::AttackId::export_all();
        let _ = crate::ids::TransactionId::export_all();

        let _ = crate::enums::TerrainType::export_all();
        let _ = crate::enums::LocationType::export_all();
        let _ = crate::enums::TrickType::export_all();
        let _ = crate::enums::CaughtBy::export_all();
        let _ = crate::enums::TransactionKind::export_all();

        let _ = crate::structs::GridPos::export_all();
        let _ = crate::structs::Tile::export_all();
        let _ = crate::structs::SecurityConfig::export_all();
        let _ = crate::structs::BuildingCondition::export_all();
        let _ = crate::structs::Building::export_all();
        let _ = crate::structs::CompanyStanding::export_all();
        let _ = crate::structs::Company::export_all();
        let _ = crate::structs::MapConfig::export_all();
        let _ = crate::structs::AttackRecord::export_all();
        let _ = crate::structs::LedgerTransaction::export_all();
        let _ = crate::structs::TickFailure::export_all();
        let _ = crate::structs::TickLogEntry::export_all();
    }
}
