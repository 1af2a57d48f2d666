//! The engine façade.
//!
//! [`Engine`] wires a [`Store`], the configuration, the trick catalog, a
//! [`RollSource`] and a [`Clock`] together and exposes the four operations
//! of the simulation core. Every operation reads through the store, plans
//! its effects into one [`Batch`] and commits it; nothing is written if any
//! step fails.
//!
//! The roll source sits behind a synchronous mutex and is only touched in
//! short synchronous sections, never across an `.await`. A tick plans with
//! a forked source so ticks of different maps never wait on each other.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Datelike;
use tracing::{error, info, warn};

use gridcity_types::{BuildingId, CompanyId, GridPos, MapId};

use crate::attack::{self, AttackContext, AttackOutcome};
use crate::batch::Batch;
use crate::catalog::TrickCatalog;
use crate::clock::{Clock, SystemClock};
use crate::config::SimConfig;
use crate::dirty::DirtySetTracker;
use crate::error::SimError;
use crate::locks::MapLocks;
use crate::prison::{FineReceipt, plan_fine_payment};
use crate::rng::{RngRolls, RollSource};
use crate::store::Store;
use crate::tick::{TickSummary, plan_tick};

/// The simulation core over a store `S`.
pub struct Engine<S> {
    store: S,
    config: SimConfig,
    catalog: TrickCatalog,
    tracker: DirtySetTracker,
    rolls: Mutex<Box<dyn RollSource + Send>>,
    clock: Arc<dyn Clock>,
    locks: MapLocks,
}

impl<S: Store> Engine<S> {
    /// An engine with OS-seeded (or `engine.rng_seed`-seeded) randomness
    /// and the system clock.
    pub fn new(store: S, config: SimConfig, catalog: TrickCatalog) -> Self {
        let rolls = RngRolls::seeded(config.engine.rng_seed);
        Self {
            store,
            tracker: DirtySetTracker::new(config.grid.neighbor_radius),
            config,
            catalog,
            rolls: Mutex::new(Box::new(rolls)),
            clock: Arc::new(SystemClock),
            locks: MapLocks::new(),
        }
    }

    /// Replace the roll source.
    #[must_use]
    pub fn with_roll_source(self, rolls: impl RollSource + Send + 'static) -> Self {
        Self {
            rolls: Mutex::new(Box::new(rolls)),
            ..self
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    /// The backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The trick catalog.
    pub const fn catalog(&self) -> &TrickCatalog {
        &self.catalog
    }

    fn roll<T>(&self, f: impl FnOnce(&mut dyn RollSource) -> T) -> T {
        let mut rolls = self.rolls.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **rolls)
    }

    /// Resolve a dirty trick by `attacker_id` against `target_id`.
    ///
    /// Preconditions are checked in a fixed order (attacker exists, not in
    /// prison, trick known, level, cash, target, location) before anything
    /// is rolled or written.
    pub async fn perform_attack(
        &self,
        attacker_id: CompanyId,
        target_id: BuildingId,
        trick: &str,
    ) -> Result<AttackOutcome, SimError> {
        let attacker = self
            .store
            .company(attacker_id)
            .await?
            .ok_or_else(|| SimError::validation(format!("company {attacker_id} does not exist")))?;
        attack::ensure_free(&attacker)?;
        let definition = attack::resolve_trick(&self.catalog, trick)?;
        attack::check_means(&attacker, definition)?;
        let target = attack::check_target(&attacker, self.store.building(target_id).await?)?;
        attack::check_location(&attacker, &target)?;
        if !target.condition.is_consistent() {
            error!(
                building = %target.id,
                damage = target.condition.damage_percent,
                on_fire = target.condition.is_on_fire,
                collapsed = target.condition.is_collapsed,
                "Attack target has an impossible condition"
            );
            return Err(SimError::invariant(format!(
                "building {} has an impossible condition",
                target.id
            )));
        }

        let Some(map) = self.store.map(target.map_id).await? else {
            error!(
                map_id = %target.map_id,
                building = %target.id,
                "Building stands on a map that does not exist"
            );
            return Err(SimError::invariant(format!(
                "map {} of building {} does not exist",
                target.map_id, target.id
            )));
        };

        let now = self.clock.now();
        let police_active = map.police_active_on(now.weekday());
        let caught_by = self.roll(|rolls| {
            attack::detect(
                definition,
                &target,
                police_active,
                &self.config.security,
                rolls,
            )
        });

        let mut plan = attack::plan_attack(&AttackContext {
            attacker: &attacker,
            target: &target,
            map: &map,
            trick: definition,
            caught_by,
            fine_base_multiplier: self.config.fines.base_multiplier,
            now,
        })?;
        self.tracker
            .mark_dirty(&self.store, &mut plan.batch, target.map_id, target.pos)
            .await?;
        self.store.commit(plan.batch).await?;

        let outcome = plan.outcome;
        info!(
            attacker = %attacker_id,
            building = %target_id,
            trick = %outcome.trick,
            damage = outcome.damage_dealt,
            collapsed = outcome.collapsed,
            set_fire = outcome.set_fire,
            caught_by = ?outcome.caught_by,
            fine = %outcome.fine_amount,
            "Attack resolved"
        );
        Ok(outcome)
    }

    /// Pay the prison fine of `company_id` and release it.
    pub async fn pay_fine(&self, company_id: CompanyId) -> Result<FineReceipt, SimError> {
        let company = self
            .store
            .company(company_id)
            .await?
            .ok_or_else(|| SimError::validation(format!("company {company_id} does not exist")))?;
        let plan = plan_fine_payment(&company, self.clock.now())?;
        self.store.commit(plan.batch).await?;
        info!(
            company = %company_id,
            amount_paid = %plan.receipt.amount_paid,
            remaining_cash = %plan.receipt.remaining_cash,
            "Fine paid"
        );
        Ok(plan.receipt)
    }

    /// Mark the building at `(x, y)` on `map_id` and its neighbourhood
    /// dirty. Returns how many buildings were marked.
    pub async fn mark_dirty(&self, map_id: MapId, x: i32, y: i32) -> Result<usize, SimError> {
        if self.store.map(map_id).await?.is_none() {
            return Err(SimError::validation(format!("map {map_id} does not exist")));
        }
        let mut batch = Batch::new();
        let marked = self
            .tracker
            .mark_dirty(&self.store, &mut batch, map_id, GridPos::new(x, y))
            .await?;
        self.store.commit(batch).await?;
        Ok(marked)
    }

    /// Run one tick of `map_id`.
    ///
    /// Ticks of the same map are serialised. The dirty set is drained once;
    /// commit conflicts replan the same drained set up to
    /// `engine.max_tick_commit_attempts` times. If the tick does not
    /// commit, the drained ids go back into the dirty set.
    pub async fn advance_tick(&self, map_id: MapId) -> Result<TickSummary, SimError> {
        let _lock = self.locks.acquire(map_id).await;
        let drained = self.tracker.drain(&self.store, map_id).await?;

        match self.commit_tick(map_id, &drained).await {
            Ok(summary) => {
                info!(
                    %map_id,
                    tick = summary.tick,
                    buildings_updated = summary.buildings_updated,
                    fire_spread = summary.fire_spread_events,
                    collapses = summary.collapse_events,
                    failures = summary.failures.len(),
                    "Tick committed"
                );
                Ok(summary)
            }
            Err(e) => {
                match self.tracker.requeue(&self.store, map_id, &drained).await {
                    Ok(()) if !drained.is_empty() => {
                        warn!(
                            %map_id,
                            requeued = drained.len(),
                            error = %e,
                            "Tick failed, dirty set requeued"
                        );
                    }
                    Ok(()) => {}
                    Err(requeue) => {
                        error!(
                            %map_id,
                            lost = drained.len(),
                            error = %requeue,
                            "Tick failed and its dirty set could not be requeued"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn commit_tick(
        &self,
        map_id: MapId,
        drained: &BTreeSet<BuildingId>,
    ) -> Result<TickSummary, SimError> {
        let max_attempts = self.config.engine.max_tick_commit_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let Some(map) = self.store.map(map_id).await? else {
                return Err(SimError::validation(format!("map {map_id} does not exist")));
            };
            let buildings = self.store.map_buildings(map_id).await?;
            let now = self.clock.now();
            // Only the fork holds the shared source; planning runs unlocked.
            let mut rolls = self.roll(|source| source.fork());
            let plan = plan_tick(&map, buildings, drained, &self.config, &mut *rolls, now)?;

            match self.store.commit(plan.batch).await {
                Ok(()) => return Ok(plan.summary),
                Err(e) if e.is_conflict() && attempt < max_attempts => {
                    warn!(
                        %map_id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Tick commit conflicted, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
