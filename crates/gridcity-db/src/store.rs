//! [`Store`] implementation over `PostgreSQL`.
//!
//! Reads are plain `SELECT`s. [`PgStore::commit_batch`] runs every mutation
//! of a [`Batch`] inside one transaction. Guarded updates carry the values
//! the planner read in their `WHERE` clause; an update that touches no row
//! rolls the transaction back and reports [`DbError::Conflict`].
//!
//! The dirty set lives in `dirty_buildings`. Marking is
//! `INSERT ... ON CONFLICT DO NOTHING`; draining is `DELETE ... RETURNING`,
//! so concurrent drains never see the same id twice.

use std::collections::BTreeSet;

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use gridcity_core::batch::{BuildingChange, CompanyChange, MapTickChange};
use gridcity_core::{Batch, Mutation, Store, StoreError};
use gridcity_types::{
    AttackRecord, Building, BuildingId, CaughtBy, Company, CompanyId, GridPos, LedgerTransaction,
    MapConfig, MapId, TickLogEntry, Tile,
};

use crate::error::DbError;
use crate::postgres::PostgresPool;
use crate::rows::{BuildingRow, CompanyRow, MapRow, u64_to_db, weekday_to_db};

const COMPANY_COLUMNS: &str = "id, name, level, cash, is_in_prison, prison_fine, ticks_since_action, current_map_id";

const BUILDING_COLUMNS: &str = "id, map_id, x, y, building_type, owner, damage_percent, is_on_fire, is_collapsed, profit, has_security, cameras, guard_dogs, security_guards, sprinklers";

const MAP_COLUMNS: &str = "id, name, location_type, police_strike_day, current_tick";

/// A [`Store`] backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// A store over `pool`.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    /// Load a company.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails and
    /// [`DbError::Corrupt`] if the row is out of range.
    pub async fn load_company(&self, id: CompanyId) -> Result<Option<Company>, DbError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Company::try_from).transpose()
    }

    /// Load a building.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails and
    /// [`DbError::Corrupt`] if the row is out of range.
    pub async fn load_building(&self, id: BuildingId) -> Result<Option<Building>, DbError> {
        let row = sqlx::query_as::<_, BuildingRow>(&format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Building::try_from).transpose()
    }

    /// Load a map.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails and
    /// [`DbError::Corrupt`] if the row is out of range.
    pub async fn load_map(&self, id: MapId) -> Result<Option<MapConfig>, DbError> {
        let row = sqlx::query_as::<_, MapRow>(&format!(
            "SELECT {MAP_COLUMNS} FROM maps WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        row.map(MapConfig::try_from).transpose()
    }

    /// Every map id, ordered.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_map_ids(&self) -> Result<Vec<MapId>, DbError> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM maps ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(MapId::from).collect())
    }

    /// Buildings of `map_id` inside the square of half-width `radius`
    /// around `center`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails and
    /// [`DbError::Corrupt`] if a row is out of range.
    pub async fn load_buildings_near(
        &self,
        map_id: MapId,
        center: GridPos,
        radius: u32,
    ) -> Result<Vec<Building>, DbError> {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        let rows = sqlx::query_as::<_, BuildingRow>(&format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings
             WHERE map_id = $1 AND x BETWEEN $2 AND $3 AND y BETWEEN $4 AND $5
             ORDER BY id"
        ))
        .bind(map_id.into_inner())
        .bind(center.x.saturating_sub(r))
        .bind(center.x.saturating_add(r))
        .bind(center.y.saturating_sub(r))
        .bind(center.y.saturating_add(r))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Building::try_from).collect()
    }

    /// Every building of `map_id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails and
    /// [`DbError::Corrupt`] if a row is out of range.
    pub async fn load_map_buildings(&self, map_id: MapId) -> Result<Vec<Building>, DbError> {
        let rows = sqlx::query_as::<_, BuildingRow>(&format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings WHERE map_id = $1 ORDER BY id"
        ))
        .bind(map_id.into_inner())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Building::try_from).collect()
    }

    /// Remove and return the dirty set of `map_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn take_dirty(&self, map_id: MapId) -> Result<BTreeSet<BuildingId>, DbError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "DELETE FROM dirty_buildings WHERE map_id = $1 RETURNING building_id",
        )
        .bind(map_id.into_inner())
        .fetch_all(&self.pool)
        .await?;
        tracing::debug!(%map_id, count = ids.len(), "Drained dirty buildings");
        Ok(ids.into_iter().map(BuildingId::from).collect())
    }

    /// Add `ids` to the dirty set of `map_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn put_dirty(
        &self,
        map_id: MapId,
        ids: &BTreeSet<BuildingId>,
    ) -> Result<(), DbError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();
        sqlx::query(
            "INSERT INTO dirty_buildings (map_id, building_id)
             SELECT $1, UNNEST($2::UUID[])
             ON CONFLICT DO NOTHING",
        )
        .bind(map_id.into_inner())
        .bind(&ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Apply `batch` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] if any guard misses (nothing is
    /// applied) and [`DbError::Postgres`] if a statement fails.
    pub async fn commit_batch(&self, batch: Batch) -> Result<(), DbError> {
        let size = batch.len();
        let mut tx = self.pool.begin().await?;
        for mutation in batch.into_mutations() {
            let kind = mutation.kind();
            if let Err(e) = apply(&mut tx, mutation).await {
                tx.rollback().await?;
                tracing::debug!(kind, error = %e, "Batch rolled back");
                return Err(e);
            }
        }
        tx.commit().await?;
        tracing::debug!(mutations = size, "Batch committed");
        Ok(())
    }

    /// Insert a map.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert_map(&self, map: &MapConfig) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO maps (id, name, location_type, police_strike_day, current_tick)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(map.id.into_inner())
        .bind(&map.name)
        .bind(map.location_type.as_str())
        .bind(map.police_strike_day.map(weekday_to_db))
        .bind(u64_to_db(map.current_tick))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a tile.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert_tile(&self, tile: &Tile) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO tiles (map_id, x, y, terrain, special_building, owner)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(tile.map_id.into_inner())
        .bind(tile.pos.x)
        .bind(tile.pos.y)
        .bind(tile.terrain.as_str())
        .bind(tile.special_building.as_deref())
        .bind(tile.owner.map(CompanyId::into_inner))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a company.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert_company(&self, company: &Company) -> Result<(), DbError> {
        sqlx::query(&format!(
            "INSERT INTO companies ({COMPANY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(company.id.into_inner())
        .bind(&company.name)
        .bind(i32::try_from(company.level).unwrap_or(i32::MAX))
        .bind(company.standing.cash)
        .bind(company.standing.is_in_prison)
        .bind(company.standing.prison_fine)
        .bind(i32::try_from(company.ticks_since_action).unwrap_or(i32::MAX))
        .bind(company.current_map_id.map(MapId::into_inner))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a building.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert_building(&self, building: &Building) -> Result<(), DbError> {
        let security = building.security.unwrap_or_default();
        sqlx::query(&format!(
            "INSERT INTO buildings ({BUILDING_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
        ))
        .bind(building.id.into_inner())
        .bind(building.map_id.into_inner())
        .bind(building.pos.x)
        .bind(building.pos.y)
        .bind(&building.building_type)
        .bind(building.owner.into_inner())
        .bind(i16::from(building.condition.damage_percent))
        .bind(building.condition.is_on_fire)
        .bind(building.condition.is_collapsed)
        .bind(building.profit)
        .bind(building.security.is_some())
        .bind(security.cameras)
        .bind(security.guard_dogs)
        .bind(security.security_guards)
        .bind(security.sprinklers)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// =========================================================================
// Batch application
// =========================================================================

async fn apply(tx: &mut Transaction<'static, Postgres>, mutation: Mutation) -> Result<(), DbError> {
    match mutation {
        Mutation::Building(change) => update_building(tx, &change).await,
        Mutation::Company(change) => update_company(tx, &change).await,
        Mutation::MapTick(change) => advance_map_tick(tx, change).await,
        Mutation::AppendAttack(record) => insert_attack(tx, &record).await,
        Mutation::AppendTransaction(transaction) => insert_transaction(tx, &transaction).await,
        Mutation::AppendTickLog(entry) => insert_tick_log(tx, &entry).await,
        Mutation::MarkDirty {
            map_id,
            building_ids,
        } => {
            let ids: Vec<Uuid> = building_ids.iter().map(|id| id.into_inner()).collect();
            sqlx::query(
                "INSERT INTO dirty_buildings (map_id, building_id)
                 SELECT $1, UNNEST($2::UUID[])
                 ON CONFLICT DO NOTHING",
            )
            .bind(map_id.into_inner())
            .bind(&ids)
            .execute(&mut **tx)
            .await?;
            Ok(())
        }
    }
}

fn expect_one(rows_affected: u64, what: impl FnOnce() -> String) -> Result<(), DbError> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(DbError::Conflict(what()))
    }
}

async fn update_building(
    tx: &mut Transaction<'static, Postgres>,
    change: &BuildingChange,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE buildings
         SET damage_percent = $2, is_on_fire = $3, is_collapsed = $4,
             profit = COALESCE($5, profit)
         WHERE id = $1 AND damage_percent = $6 AND is_on_fire = $7 AND is_collapsed = $8",
    )
    .bind(change.building_id.into_inner())
    .bind(i16::from(change.condition.damage_percent))
    .bind(change.condition.is_on_fire)
    .bind(change.condition.is_collapsed)
    .bind(change.profit)
    .bind(i16::from(change.expected.damage_percent))
    .bind(change.expected.is_on_fire)
    .bind(change.expected.is_collapsed)
    .execute(&mut **tx)
    .await?;
    expect_one(result.rows_affected(), || {
        format!("building {} changed since it was read", change.building_id)
    })
}

async fn update_company(
    tx: &mut Transaction<'static, Postgres>,
    change: &CompanyChange,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE companies
         SET cash = $2, is_in_prison = $3, prison_fine = $4,
             ticks_since_action = CASE WHEN $5 THEN 0 ELSE ticks_since_action END
         WHERE id = $1 AND cash = $6 AND is_in_prison = $7 AND prison_fine = $8",
    )
    .bind(change.company_id.into_inner())
    .bind(change.standing.cash)
    .bind(change.standing.is_in_prison)
    .bind(change.standing.prison_fine)
    .bind(change.reset_idle)
    .bind(change.expected.cash)
    .bind(change.expected.is_in_prison)
    .bind(change.expected.prison_fine)
    .execute(&mut **tx)
    .await?;
    expect_one(result.rows_affected(), || {
        format!("company {} changed since it was read", change.company_id)
    })
}

async fn advance_map_tick(
    tx: &mut Transaction<'static, Postgres>,
    change: MapTickChange,
) -> Result<(), DbError> {
    let result =
        sqlx::query("UPDATE maps SET current_tick = $2 WHERE id = $1 AND current_tick = $3")
            .bind(change.map_id.into_inner())
            .bind(u64_to_db(change.new_tick))
            .bind(u64_to_db(change.expected_tick))
            .execute(&mut **tx)
            .await?;
    expect_one(result.rows_affected(), || {
        format!(
            "map {} is no longer at tick {}",
            change.map_id, change.expected_tick
        )
    })
}

async fn insert_attack(
    tx: &mut Transaction<'static, Postgres>,
    record: &AttackRecord,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO attack_records
           (id, attacker, target_company, target_building, map_id, trick, damage_dealt,
            was_caught, caught_by, fine_amount, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(record.id.into_inner())
    .bind(record.attacker.into_inner())
    .bind(record.target_company.into_inner())
    .bind(record.target_building.into_inner())
    .bind(record.map_id.into_inner())
    .bind(record.trick.as_str())
    .bind(i16::from(record.damage_dealt))
    .bind(record.was_caught)
    .bind(record.caught_by.map(CaughtBy::as_str))
    .bind(record.fine_amount)
    .bind(record.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_transaction(
    tx: &mut Transaction<'static, Postgres>,
    transaction: &LedgerTransaction,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO ledger_transactions (id, company, kind, amount, reason, reference_id, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(transaction.id.into_inner())
    .bind(transaction.company.into_inner())
    .bind(transaction.kind.as_str())
    .bind(transaction.amount)
    .bind(&transaction.reason)
    .bind(transaction.reference_id)
    .bind(transaction.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_tick_log(
    tx: &mut Transaction<'static, Postgres>,
    entry: &TickLogEntry,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO tick_log
           (map_id, tick, buildings_updated, fire_spread_events, collapse_events, failures, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.map_id.into_inner())
    .bind(u64_to_db(entry.tick))
    .bind(i64::from(entry.buildings_updated))
    .bind(i64::from(entry.fire_spread_events))
    .bind(i64::from(entry.collapse_events))
    .bind(Json(&entry.failures))
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// =========================================================================
// Store
// =========================================================================

impl Store for PgStore {
    async fn company(&self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        Ok(self.load_company(id).await?)
    }

    async fn building(&self, id: BuildingId) -> Result<Option<Building>, StoreError> {
        Ok(self.load_building(id).await?)
    }

    async fn map(&self, id: MapId) -> Result<Option<MapConfig>, StoreError> {
        Ok(self.load_map(id).await?)
    }

    async fn map_ids(&self) -> Result<Vec<MapId>, StoreError> {
        Ok(self.load_map_ids().await?)
    }

    async fn buildings_near(
        &self,
        map_id: MapId,
        center: GridPos,
        radius: u32,
    ) -> Result<Vec<Building>, StoreError> {
        Ok(self.load_buildings_near(map_id, center, radius).await?)
    }

    async fn map_buildings(&self, map_id: MapId) -> Result<Vec<Building>, StoreError> {
        Ok(self.load_map_buildings(map_id).await?)
    }

    async fn drain_dirty(&self, map_id: MapId) -> Result<BTreeSet<BuildingId>, StoreError> {
        Ok(self.take_dirty(map_id).await?)
    }

    async fn requeue_dirty(
        &self,
        map_id: MapId,
        ids: &BTreeSet<BuildingId>,
    ) -> Result<(), StoreError> {
        Ok(self.put_dirty(map_id, ids).await?)
    }

    async fn commit(&self, batch: Batch) -> Result<(), StoreError> {
        Ok(self.commit_batch(batch).await?)
    }
}
