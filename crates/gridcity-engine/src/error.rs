//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps one subsystem's error so `main` can propagate
/// everything with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: gridcity_core::ConfigError,
    },

    /// The trick catalog could not be loaded.
    #[error("catalog error: {source}")]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: gridcity_core::CatalogError,
    },

    /// Connecting to or migrating the database failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: gridcity_db::DbError,
    },

    /// The scheduler stopped with an error.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying simulation error.
        #[from]
        source: gridcity_core::SimError,
    },

    /// The scheduler task itself panicked or was cancelled.
    #[error("scheduler task failed: {message}")]
    Join {
        /// Description of the join failure.
        message: String,
    },
}
