//! Cash ledger for the Gridcity simulation.
//!
//! Every cash movement a company makes through the simulation core (paying
//! for a trick, settling a fine) is recorded as an append-only
//! [`LedgerTransaction`](gridcity_types::LedgerTransaction). Entries are
//! constructed through the validating [`TransactionBuilder`]; balances are
//! reduced through [`debit`], which never lets cash go below zero.
//!
//! # Usage
//!
//! ```
//! use chrono::Utc;
//! use gridcity_ledger::{TransactionBuilder, debit};
//! use gridcity_types::{CompanyId, TransactionKind};
//! use rust_decimal::Decimal;
//!
//! let cost = Decimal::new(500, 0);
//! let remaining = debit(Decimal::new(2_000, 0), cost);
//! assert_eq!(remaining.ok(), Some(Decimal::new(1_500, 0)));
//!
//! let entry = TransactionBuilder::new(CompanyId::new(), TransactionKind::TrickCost)
//!     .amount(cost)
//!     .reason("graffiti".to_owned())
//!     .at(Utc::now())
//!     .build();
//! assert!(entry.is_ok());
//! ```

pub mod transaction;

pub use transaction::TransactionBuilder;

use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when recording cash movements.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Amount must be strictly positive.
    #[error("ledger amount must be non-zero")]
    ZeroAmount,

    /// Amount must not be negative.
    #[error("ledger amount must be positive, got {amount}")]
    NegativeAmount {
        /// The invalid amount.
        amount: Decimal,
    },

    /// A required field was not set on the builder.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The balance cannot cover the debit.
    #[error("balance {balance} cannot cover {amount}")]
    InsufficientBalance {
        /// Cash on hand.
        balance: Decimal,
        /// Amount requested.
        amount: Decimal,
    },

    /// Decimal arithmetic overflowed.
    #[error("arithmetic overflow in ledger operation")]
    Overflow,
}

/// Subtract `amount` from `balance`.
///
/// # Errors
///
/// Returns [`LedgerError::InsufficientBalance`] when `amount` exceeds
/// `balance`, [`LedgerError::NegativeAmount`] for a negative amount, and
/// [`LedgerError::Overflow`] if the subtraction overflows.
pub fn debit(balance: Decimal, amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LedgerError::NegativeAmount { amount });
    }
    if amount > balance {
        return Err(LedgerError::InsufficientBalance { balance, amount });
    }
    balance.checked_sub(amount).ok_or(LedgerError::Overflow)
}
