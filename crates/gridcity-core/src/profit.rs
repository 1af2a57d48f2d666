//! Profit recomputation.
//!
//! `profit = base × (1 − damage / zero_profit_damage) × neighbour_penalty`.
//! The damage factor is not clamped: past the zero-profit threshold a
//! building loses money. The neighbour factor subtracts a share of profit
//! for every damaged building in the neighbourhood, proportional to that
//! neighbour's damage, and is clamped to `[0, 1]`.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::{BP_SCALE, ProfitConfig};
use crate::error::SimError;

/// Decimal places profits are rounded to.
pub const PROFIT_SCALE: u32 = 2;

/// `1 − damage / zero_profit_damage`.
pub fn damage_factor(damage_percent: u8, zero_profit_damage: u32) -> Result<Decimal, SimError> {
    let threshold = Decimal::from(zero_profit_damage);
    threshold
        .checked_sub(Decimal::from(damage_percent))
        .and_then(|remaining| remaining.checked_div(threshold))
        .ok_or_else(|| SimError::invariant("damage factor is undefined for a zero threshold"))
}

/// `1 − Σ max_share × damage / 100` over the neighbours, clamped to `[0, 1]`.
pub fn neighbor_factor(
    neighbor_damages: impl IntoIterator<Item = u8>,
    max_penalty_bp: u32,
) -> Decimal {
    // Work in millionths: bp (1e4) × percent (1e2).
    const WHOLE: u64 = 1_000_000;
    let lost = neighbor_damages
        .into_iter()
        .map(|damage| u64::from(max_penalty_bp).saturating_mul(u64::from(damage)))
        .fold(0_u64, u64::saturating_add);
    let kept = WHOLE.saturating_sub(lost);
    Decimal::from(kept)
        .checked_div(Decimal::from(WHOLE))
        .unwrap_or(Decimal::ZERO)
}

/// Profit of a building with `damage_percent` surrounded by neighbours with
/// `neighbor_damages`, rounded to cents.
pub fn compute_profit(
    base_profit: Decimal,
    damage_percent: u8,
    neighbor_damages: impl IntoIterator<Item = u8>,
    config: &ProfitConfig,
) -> Result<Decimal, SimError> {
    let own = damage_factor(damage_percent, config.zero_profit_damage)?;
    let neighbours =
        neighbor_factor(neighbor_damages, config.neighbor_penalty_max_bp.min(BP_SCALE));
    base_profit
        .checked_mul(own)
        .and_then(|p| p.checked_mul(neighbours))
        .map(|p| {
            p.round_dp_with_strategy(PROFIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
                .normalize()
        })
        .ok_or_else(|| SimError::invariant("profit calculation overflowed"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> ProfitConfig {
        ProfitConfig::default()
    }

    #[test]
    fn undamaged_isolated_building_earns_base() {
        let profit = compute_profit(Decimal::new(100, 0), 0, [], &config()).unwrap();
        assert_eq!(profit, Decimal::new(100, 0));
    }

    #[test]
    fn profit_is_zero_at_threshold() {
        let profit = compute_profit(Decimal::new(100, 0), 85, [], &config()).unwrap();
        assert_eq!(profit, Decimal::ZERO);
    }

    #[test]
    fn profit_goes_negative_past_threshold() {
        let profit = compute_profit(Decimal::new(100, 0), 100, [], &config()).unwrap();
        // 100 × (1 − 100/85) = −17.647…
        assert_eq!(profit, Decimal::new(-1765, 2));
    }

    #[test]
    fn each_destroyed_neighbour_costs_ten_percent() {
        assert_eq!(neighbor_factor([100], 1_000), Decimal::new(9, 1));
        assert_eq!(neighbor_factor([100, 100], 1_000), Decimal::new(8, 1));
        assert_eq!(neighbor_factor([50], 1_000), Decimal::new(95, 2));
        assert_eq!(neighbor_factor([0, 0, 0], 1_000), Decimal::ONE);
    }

    #[test]
    fn neighbour_factor_clamps_at_zero() {
        let many = [100_u8; 12];
        assert_eq!(neighbor_factor(many, 1_000), Decimal::ZERO);
    }

    #[test]
    fn combined_penalties_multiply() {
        // 200 × (1 − 17/85) × (1 − 0.05) = 200 × 0.8 × 0.95 = 152
        let profit = compute_profit(Decimal::new(200, 0), 17, [50], &config()).unwrap();
        assert_eq!(profit, Decimal::new(152, 0));
    }
}
