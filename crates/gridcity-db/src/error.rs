//! Error types for the data layer.
//!
//! [`DbError`] wraps [`sqlx`] failures. A lost compare-and-set is its own
//! variant, [`DbError::Conflict`], and converts to
//! [`StoreError::Conflict`] so the engine can retry it.

use gridcity_core::StoreError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A guarded update matched no row; the transaction was rolled back.
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// A stored row cannot be represented as a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// The connection settings are unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(reason) => Self::conflict(reason),
            other => Self::backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_stay_conflicts() {
        let store: StoreError = DbError::Conflict("building changed".to_owned()).into();
        assert!(store.is_conflict());

        let store: StoreError = DbError::Corrupt("bad level".to_owned()).into();
        assert!(!store.is_conflict());
    }
}
