//! Transaction builder and validation for cash ledger entries.
//!
//! A [`TransactionBuilder`] collects the fields of a cash movement and
//! validates them before producing a [`LedgerTransaction`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use gridcity_types::{CompanyId, LedgerTransaction, TransactionId, TransactionKind};

use crate::LedgerError;

// ---------------------------------------------------------------------------
// Transaction builder
// ---------------------------------------------------------------------------

/// Builder for constructing validated [`LedgerTransaction`] values.
///
/// Enforces a strictly positive amount and requires a reason and a
/// timestamp. The timestamp is supplied by the caller so that entries follow
/// the simulation clock rather than the wall clock.
#[derive(Debug)]
pub struct TransactionBuilder {
    company: CompanyId,
    kind: TransactionKind,
    amount: Option<Decimal>,
    reason: Option<String>,
    reference_id: Option<Uuid>,
    created_at: Option<DateTime<Utc>>,
}

impl TransactionBuilder {
    /// Start building a transaction for `company`.
    pub const fn new(company: CompanyId, kind: TransactionKind) -> Self {
        Self {
            company,
            kind,
            amount: None,
            reason: None,
            reference_id: None,
            created_at: None,
        }
    }

    /// Set the amount debited.
    #[must_use]
    pub const fn amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set the human-readable reason.
    #[must_use]
    pub fn reason(mut self, reason: String) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Link the transaction to the record that caused it.
    #[must_use]
    pub const fn reference_id(mut self, id: Uuid) -> Self {
        self.reference_id = Some(id);
        self
    }

    /// Set the timestamp.
    #[must_use]
    pub const fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Validate inputs and produce a [`LedgerTransaction`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingField`] if the amount, reason or
    /// timestamp is not set, [`LedgerError::ZeroAmount`] for a zero amount
    /// and [`LedgerError::NegativeAmount`] for a negative one.
    pub fn build(self) -> Result<LedgerTransaction, LedgerError> {
        let amount = self.amount.ok_or(LedgerError::MissingField("amount"))?;
        let reason = self.reason.ok_or(LedgerError::MissingField("reason"))?;
        let created_at = self
            .created_at
            .ok_or(LedgerError::MissingField("created_at"))?;

        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        if amount.is_sign_negative() {
            return Err(LedgerError::NegativeAmount { amount });
        }
        if reason.trim().is_empty() {
            return Err(LedgerError::MissingField("reason"));
        }

        Ok(LedgerTransaction {
            id: TransactionId::new(),
            company: self.company,
            kind: self.kind,
            amount,
            reason,
            reference_id: self.reference_id,
            created_at,
        })
    }
}
