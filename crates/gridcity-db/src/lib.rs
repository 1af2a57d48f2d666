//! `PostgreSQL` persistence for the Gridcity simulation core.
//!
//! [`PgStore`] implements [`gridcity_core::Store`] on top of a
//! [`PostgresPool`]. Each [`Batch`](gridcity_core::Batch) runs in one SQL
//! transaction; a guarded `UPDATE` that touches no row rolls the whole
//! transaction back and surfaces as a conflict.
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`rows`] -- Row types and conversions to domain values
//! - [`store`] -- The [`PgStore`] implementation
//! - [`error`] -- Shared error types

pub mod error;
pub mod postgres;
pub mod rows;
pub mod store;

pub use error::DbError;
pub use postgres::{PostgresConfig, PostgresPool};
pub use store::PgStore;
