//! Tick processing and dirty-trick resolution for the Gridcity simulation.
//!
//! Every operation reads through a [`Store`], plans its effects into a
//! [`Batch`] and commits that batch atomically. Randomness and time are
//! injected through [`RollSource`] and [`Clock`].
//!
//! # Modules
//!
//! - [`attack`] -- Preconditions, detection, damage and fines for one trick.
//! - [`batch`] -- The ordered, guarded unit of atomic commit.
//! - [`catalog`] -- Trick data table loaded from YAML.
//! - [`clock`] -- [`Clock`] trait with system and fixed implementations.
//! - [`config`] -- Loading of `gridcity-config.yaml`.
//! - [`dirty`] -- [`DirtySetTracker`], the single owner of dirty marking.
//! - [`engine`] -- [`Engine`], the public operations.
//! - [`error`] -- [`SimError`] and friends.
//! - [`fire`] -- Fire spread, fire damage and self-extinguishing.
//! - [`locks`] -- Per-map tick serialisation.
//! - [`memory`] -- [`MemoryStore`], the in-process store.
//! - [`prison`] -- Fine settlement.
//! - [`profit`] -- Profit recomputation.
//! - [`rng`] -- [`RollSource`] with seeded and scripted implementations.
//! - [`scheduler`] -- One periodic tick task per map.
//! - [`store`] -- The [`Store`] trait.
//! - [`tick`] -- Planning of one map tick.

pub mod attack;
pub mod batch;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod dirty;
pub mod engine;
pub mod error;
pub mod fire;
pub mod locks;
pub mod memory;
pub mod prison;
pub mod profit;
pub mod rng;
pub mod scheduler;
pub mod store;
pub mod tick;

pub use attack::AttackOutcome;
pub use batch::{Batch, BuildingChange, CompanyChange, MapTickChange, Mutation};
pub use catalog::{CatalogError, TrickCatalog, TrickDefinition};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, SimConfig};
pub use dirty::DirtySetTracker;
pub use engine::Engine;
pub use error::{PreconditionError, SimError, StoreError};
pub use memory::MemoryStore;
pub use prison::FineReceipt;
pub use rng::{RngRolls, RollSource, ScriptedRolls};
pub use scheduler::run_scheduler;
pub use store::Store;
pub use tick::TickSummary;
