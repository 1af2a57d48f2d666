//! Dirty tricks: resolution of one attack.
//!
//! Resolution is split into pure steps so each rule can be tested on its
//! own: precondition checks (in a fixed order), detection, damage, fine, and
//! finally [`plan_attack`], which turns the decisions into a [`Batch`]. The
//! engine supplies the store reads, the rolls and the clock.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use gridcity_ledger::{TransactionBuilder, debit};
use gridcity_types::{
    AttackId, AttackRecord, Building, BuildingCondition, CaughtBy, Company, CompanyStanding,
    LocationType, MapConfig, SecurityConfig, TransactionKind, TrickType,
};

use crate::batch::{Batch, BuildingChange, CompanyChange};
use crate::catalog::{TrickCatalog, TrickDefinition};
use crate::config::{BP_SCALE, SecurityBonusConfig};
use crate::error::{PreconditionError, SimError};
use crate::rng::RollSource;

/// What an attack did, as reported to the attacker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttackOutcome {
    /// Id of the appended attack record.
    pub attack_id: AttackId,
    /// Trick performed.
    pub trick: TrickType,
    /// Damage actually added to the target.
    pub damage_dealt: u8,
    /// Target damage after the attack.
    pub new_damage_percent: u8,
    /// Whether the hit collapsed the target.
    pub collapsed: bool,
    /// Whether the hit set the target on fire.
    pub set_fire: bool,
    /// Whether the attacker was caught.
    pub was_caught: bool,
    /// Who caught the attacker.
    pub caught_by: Option<CaughtBy>,
    /// Fine imposed; zero when not caught.
    pub fine_amount: Decimal,
    /// Attacker cash after paying for the trick.
    pub remaining_cash: Decimal,
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

/// An imprisoned company may not attack.
pub const fn ensure_free(attacker: &Company) -> Result<(), PreconditionError> {
    if attacker.standing.is_in_prison {
        return Err(PreconditionError::AlreadyImprisoned);
    }
    Ok(())
}

/// Parse `name` and find its catalog row.
pub fn resolve_trick<'c>(
    catalog: &'c TrickCatalog,
    name: &str,
) -> Result<&'c TrickDefinition, SimError> {
    let trick = name
        .parse::<TrickType>()
        .map_err(|e| SimError::validation(e.to_string()))?;
    catalog
        .get(trick)
        .ok_or_else(|| SimError::validation(format!("trick {trick} is not in the catalog")))
}

/// Level first, then cash.
pub fn check_means(attacker: &Company, trick: &TrickDefinition) -> Result<(), PreconditionError> {
    if attacker.level < trick.level_required {
        return Err(PreconditionError::InsufficientLevel {
            required: trick.level_required,
            actual: attacker.level,
        });
    }
    if attacker.standing.cash < trick.cost {
        return Err(PreconditionError::InsufficientFunds {
            required: trick.cost,
            available: attacker.standing.cash,
        });
    }
    Ok(())
}

/// The target must exist, be standing, and belong to someone else.
pub fn check_target(
    attacker: &Company,
    target: Option<Building>,
) -> Result<Building, PreconditionError> {
    let target = target.ok_or(PreconditionError::InvalidTarget {
        reason: "building does not exist",
    })?;
    if target.condition.is_collapsed {
        return Err(PreconditionError::InvalidTarget {
            reason: "building has collapsed",
        });
    }
    if target.owner == attacker.id {
        return Err(PreconditionError::InvalidTarget {
            reason: "building belongs to the attacker",
        });
    }
    Ok(target)
}

/// The target must be on the map the attacker is playing.
pub fn check_location(attacker: &Company, target: &Building) -> Result<(), PreconditionError> {
    if attacker.current_map_id != Some(target.map_id) {
        return Err(PreconditionError::WrongLocation);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Chance that installed security catches the attacker, capped at 100%.
pub fn security_catch_chance(
    trick: &TrickDefinition,
    security: &SecurityConfig,
    bonuses: &SecurityBonusConfig,
) -> u32 {
    let mut chance = trick.security_catch_bp;
    if security.cameras {
        chance = chance.saturating_add(bonuses.cameras_bp);
    }
    if security.guard_dogs {
        chance = chance.saturating_add(bonuses.guard_dogs_bp);
    }
    if security.security_guards {
        chance = chance.saturating_add(bonuses.security_guards_bp);
    }
    chance.min(BP_SCALE)
}

/// Roll for detection: security first (only if the target has any), then
/// the police (only if security missed and the police are working).
pub fn detect(
    trick: &TrickDefinition,
    target: &Building,
    police_active: bool,
    bonuses: &SecurityBonusConfig,
    rolls: &mut dyn RollSource,
) -> Option<CaughtBy> {
    if let Some(security) = &target.security {
        let chance = security_catch_chance(trick, security, bonuses);
        let caught = rolls.chance(chance);
        debug!(chance, caught, "Security catch roll");
        if caught {
            return Some(CaughtBy::Security);
        }
    }
    if police_active {
        let caught = rolls.chance(trick.police_catch_bp);
        debug!(chance = trick.police_catch_bp, caught, "Police catch roll");
        if caught {
            return Some(CaughtBy::Police);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Damage and fine
// ---------------------------------------------------------------------------

/// Effect of a trick on a building's condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    /// Condition after the hit.
    pub condition: BuildingCondition,
    /// Damage actually added.
    pub damage_dealt: u8,
    /// Whether the trick ignited the building.
    pub set_fire: bool,
}

/// Apply `trick` to `condition`. Damage saturates at 100; a collapsing hit
/// never sets fire and puts out any existing one. Igniting a building that
/// is already burning leaves it burning.
pub fn resolve_damage(condition: BuildingCondition, trick: &TrickDefinition) -> DamageResult {
    let mut after = condition.with_damage(trick.base_damage);
    let set_fire = trick.sets_fire && !after.is_collapsed;
    if set_fire {
        after.is_on_fire = true;
    }
    DamageResult {
        condition: after,
        damage_dealt: after
            .damage_percent
            .saturating_sub(condition.damage_percent),
        set_fire,
    }
}

/// `cost × base_multiplier × location multiplier`.
pub fn compute_fine(
    cost: Decimal,
    location: LocationType,
    base_multiplier: Decimal,
) -> Result<Decimal, SimError> {
    cost.checked_mul(base_multiplier)
        .and_then(|fine| fine.checked_mul(location.fine_multiplier()))
        .map(|fine| fine.normalize())
        .ok_or_else(|| SimError::invariant("fine calculation overflowed"))
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Everything [`plan_attack`] needs, already validated.
#[derive(Debug, Clone, Copy)]
pub struct AttackContext<'a> {
    /// The attacking company.
    pub attacker: &'a Company,
    /// The target building.
    pub target: &'a Building,
    /// The target's map.
    pub map: &'a MapConfig,
    /// The trick.
    pub trick: &'a TrickDefinition,
    /// Detection result.
    pub caught_by: Option<CaughtBy>,
    /// Fine multiple of the trick cost.
    pub fine_base_multiplier: Decimal,
    /// Resolution time.
    pub now: DateTime<Utc>,
}

/// A planned attack: the batch to commit and the outcome to report once it
/// commits.
#[derive(Debug, Clone)]
pub struct AttackPlan {
    /// Mutations, not yet including dirty marks.
    pub batch: Batch,
    /// Outcome to return on commit.
    pub outcome: AttackOutcome,
}

/// Turn validated inputs and a detection result into a batch.
pub fn plan_attack(ctx: &AttackContext<'_>) -> Result<AttackPlan, SimError> {
    let AttackContext {
        attacker,
        target,
        map,
        trick,
        caught_by,
        fine_base_multiplier,
        now,
    } = *ctx;

    let cash = debit(attacker.standing.cash, trick.cost)?;
    let fine_amount = match caught_by {
        Some(_) => compute_fine(trick.cost, map.location_type, fine_base_multiplier)?,
        None => Decimal::ZERO,
    };
    let standing = if caught_by.is_some() {
        CompanyStanding {
            cash,
            is_in_prison: true,
            prison_fine: fine_amount,
        }
    } else {
        CompanyStanding {
            cash,
            ..attacker.standing
        }
    };

    let damage = resolve_damage(target.condition, trick);
    let attack_id = AttackId::new();

    let transaction = TransactionBuilder::new(attacker.id, TransactionKind::TrickCost)
        .amount(trick.cost)
        .reason(format!("dirty trick {}", trick.id))
        .reference_id(attack_id.into_inner())
        .at(now)
        .build()?;

    let mut batch = Batch::new();
    batch.update_company(CompanyChange {
        company_id: attacker.id,
        expected: attacker.standing,
        standing,
        reset_idle: true,
    });
    batch.update_building(BuildingChange {
        building_id: target.id,
        expected: target.condition,
        condition: damage.condition,
        profit: None,
    });
    batch.append_attack(AttackRecord {
        id: attack_id,
        attacker: attacker.id,
        target_company: target.owner,
        target_building: target.id,
        map_id: target.map_id,
        trick: trick.id,
        damage_dealt: damage.damage_dealt,
        was_caught: caught_by.is_some(),
        caught_by,
        fine_amount,
        created_at: now,
    });
    batch.append_transaction(transaction);

    Ok(AttackPlan {
        batch,
        outcome: AttackOutcome {
            attack_id,
            trick: trick.id,
            damage_dealt: damage.damage_dealt,
            new_damage_percent: damage.condition.damage_percent,
            collapsed: damage.condition.is_collapsed,
            set_fire: damage.set_fire,
            was_caught: caught_by.is_some(),
            caught_by,
            fine_amount,
            remaining_cash: cash,
        },
    })
}
