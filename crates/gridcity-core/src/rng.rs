//! Injectable randomness.
//!
//! Every probabilistic decision (catch rolls, fire spread, self-extinguish)
//! draws a basis-point roll from a [`RollSource`]. A roll `r` succeeds
//! against a chance `c` when `r < c`, so a chance of 0 never succeeds and a
//! chance of 10 000 always does.

use std::collections::VecDeque;

use rand::rngs::{SmallRng, StdRng};
use rand::{Rng, SeedableRng};

use crate::config::BP_SCALE;

/// Source of uniformly distributed rolls in `0..10_000`.
pub trait RollSource {
    /// Draw the next roll.
    fn roll_bp(&mut self) -> u32;

    /// Draw a roll and test it against `chance_bp`.
    fn chance(&mut self, chance_bp: u32) -> bool {
        self.roll_bp() < chance_bp
    }

    /// Split off an independent source for a long planning pass, so a
    /// shared source is only borrowed for the split.
    fn fork(&mut self) -> Box<dyn RollSource + Send>;
}

/// Rolls backed by any [`rand::Rng`].
#[derive(Debug, Clone)]
pub struct RngRolls<R> {
    rng: R,
}

impl<R: Rng> RngRolls<R> {
    /// Wrap a generator.
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngRolls<StdRng> {
    /// A generator seeded from `seed`, or from the OS when `None`.
    pub fn seeded(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self::new(rng)
    }
}

impl<R: Rng> RollSource for RngRolls<R> {
    fn roll_bp(&mut self) -> u32 {
        self.rng.random_range(0..BP_SCALE)
    }

    fn fork(&mut self) -> Box<dyn RollSource + Send> {
        let seed: u64 = self.rng.random();
        Box::new(RngRolls::new(SmallRng::seed_from_u64(seed)))
    }
}

/// A fixed sequence of rolls, for exact scenarios in tests and replays.
///
/// Once the script runs out every roll is `9_999`, which fails any chance
/// short of certainty. A fork takes over the rest of the script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRolls {
    rolls: VecDeque<u32>,
    drawn: usize,
}

impl ScriptedRolls {
    /// Script the given rolls, drawn front to back.
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            drawn: 0,
        }
    }

    /// A script that never succeeds.
    pub fn never() -> Self {
        Self::default()
    }

    /// How many rolls have been drawn so far.
    pub const fn drawn(&self) -> usize {
        self.drawn
    }

    /// How many scripted rolls remain.
    pub fn remaining(&self) -> usize {
        self.rolls.len()
    }
}

impl RollSource for ScriptedRolls {
    fn roll_bp(&mut self) -> u32 {
        self.drawn = self.drawn.saturating_add(1);
        self.rolls
            .pop_front()
            .map_or(BP_SCALE.saturating_sub(1), |roll| roll.min(BP_SCALE.saturating_sub(1)))
    }

    fn fork(&mut self) -> Box<dyn RollSource + Send> {
        Box::new(Self::new(std::mem::take(&mut self.rolls)))
    }
}
