//! Error taxonomy for the simulation core.
//!
//! [`SimError`] is what callers of the engine see. Precondition failures
//! carry a [`PreconditionError`] naming the exact rule that was broken;
//! store failures carry the [`StoreError`] and are always safe to retry
//! because a rejected batch leaves no trace.

use rust_decimal::Decimal;

use gridcity_ledger::LedgerError;

/// Failure of a backing store call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// An optimistic compare-and-set guard did not match; the batch was
    /// rejected as a whole.
    #[error("concurrent modification: {reason}")]
    Conflict {
        /// Which guard failed.
        reason: String,
    },

    /// The backend itself failed (connection, query, poisoned lock).
    #[error("store backend failure: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Build a [`StoreError::Conflict`].
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Build a [`StoreError::Backend`].
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Whether this is a guard conflict.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// A business rule rejected the operation before anything was mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    /// The attacker's level is below what the trick requires.
    #[error("level {actual} is below the required level {required}")]
    InsufficientLevel {
        /// Level the trick requires.
        required: u32,
        /// The company's level.
        actual: u32,
    },

    /// The company is in prison and may not attack.
    #[error("company is in prison")]
    AlreadyImprisoned,

    /// Not enough cash.
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// Amount needed.
        required: Decimal,
        /// Cash on hand.
        available: Decimal,
    },

    /// The target building cannot be attacked.
    #[error("invalid target: {reason}")]
    InvalidTarget {
        /// Why the target was refused.
        reason: &'static str,
    },

    /// The target is not on the map the attacker is playing.
    #[error("target is not on the attacker's current map")]
    WrongLocation,

    /// The company has no fine to pay.
    #[error("company is not in prison")]
    NotInPrison,
}

/// User-facing error of every engine operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// The request referenced something that does not exist or cannot be
    /// parsed.
    #[error("validation failed: {reason}")]
    Validation {
        /// What was wrong with the request.
        reason: String,
    },

    /// A business rule rejected the request.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// The commit failed; nothing was applied.
    #[error("transient store failure: {0}")]
    TransientStore(#[from] StoreError),

    /// Stored state broke an invariant and the operation cannot proceed.
    #[error("invariant violation: {reason}")]
    InvariantViolation {
        /// Which invariant was broken.
        reason: String,
    },
}

impl SimError {
    /// Build a [`SimError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Build a [`SimError::InvariantViolation`].
    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }
}

impl From<LedgerError> for SimError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { balance, amount } => {
                Self::Precondition(PreconditionError::InsufficientFunds {
                    required: amount,
                    available: balance,
                })
            }
            other => Self::invariant(format!("ledger: {other}")),
        }
    }
}
