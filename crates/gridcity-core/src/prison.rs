//! Fine settlement for imprisoned companies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use gridcity_ledger::{TransactionBuilder, debit};
use gridcity_types::{Company, CompanyStanding, TransactionKind};

use crate::batch::{Batch, CompanyChange};
use crate::error::{PreconditionError, SimError};

/// Result of paying a fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FineReceipt {
    /// Fine deducted.
    pub amount_paid: Decimal,
    /// Cash left afterwards.
    pub remaining_cash: Decimal,
}

/// A planned fine payment.
#[derive(Debug, Clone)]
pub struct FinePlan {
    /// Mutations to commit.
    pub batch: Batch,
    /// Receipt to return on commit.
    pub receipt: FineReceipt,
}

/// Plan the release of `company` from prison.
///
/// The idle-tick counter is left alone: paying a fine is not an action.
/// A zero fine releases the company without a ledger entry.
///
/// # Errors
///
/// [`PreconditionError::NotInPrison`] if there is nothing to pay and
/// [`PreconditionError::InsufficientFunds`] if cash does not cover the fine.
pub fn plan_fine_payment(company: &Company, now: DateTime<Utc>) -> Result<FinePlan, SimError> {
    let standing = company.standing;
    if !standing.is_in_prison {
        return Err(PreconditionError::NotInPrison.into());
    }
    let fine = standing.prison_fine;
    let cash = if fine.is_zero() {
        standing.cash
    } else {
        debit(standing.cash, fine)?
    };

    let mut batch = Batch::new();
    batch.update_company(CompanyChange {
        company_id: company.id,
        expected: standing,
        standing: CompanyStanding::free(cash),
        reset_idle: false,
    });
    if !fine.is_zero() {
        let transaction = TransactionBuilder::new(company.id, TransactionKind::FinePayment)
            .amount(fine)
            .reason("prison fine".to_owned())
            .at(now)
            .build()?;
        batch.append_transaction(transaction);
    }

    Ok(FinePlan {
        batch,
        receipt: FineReceipt {
            amount_paid: fine,
            remaining_cash: cash,
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gridcity_types::CompanyId;

    use super::*;
    use crate::batch::Mutation;

    fn prisoner(cash: i64, fine: i64) -> Company {
        Company {
            id: CompanyId::new(),
            name: "Caught Ltd".to_owned(),
            level: 2,
            standing: CompanyStanding {
                cash: Decimal::new(cash, 0),
                is_in_prison: true,
                prison_fine: Decimal::new(fine, 0),
            },
            ticks_since_action: 3,
            current_map_id: None,
        }
    }

    #[test]
    fn exact_cash_pays_the_fine() {
        let plan = plan_fine_payment(&prisoner(3_000, 3_000), Utc::now()).unwrap();
        assert_eq!(plan.receipt.amount_paid, Decimal::new(3_000, 0));
        assert_eq!(plan.receipt.remaining_cash, Decimal::ZERO);

        let change = plan
            .batch
            .mutations()
            .iter()
            .find_map(|m| match m {
                Mutation::Company(change) => Some(change),
                _ => None,
            })
            .unwrap();
        assert_eq!(change.standing, CompanyStanding::free(Decimal::ZERO));
        assert!(!change.reset_idle);
        assert_eq!(plan.batch.len(), 2);
    }

    #[test]
    fn short_of_cash_is_refused() {
        let result = plan_fine_payment(&prisoner(2_999, 3_000), Utc::now());
        assert!(matches!(
            result,
            Err(SimError::Precondition(PreconditionError::InsufficientFunds { .. }))
        ));
    }

    #[test]
    fn free_company_has_nothing_to_pay() {
        let mut company = prisoner(1_000, 0);
        company.standing.is_in_prison = false;
        assert!(matches!(
            plan_fine_payment(&company, Utc::now()),
            Err(SimError::Precondition(PreconditionError::NotInPrison))
        ));
    }

    #[test]
    fn zero_fine_releases_without_ledger_entry() {
        let plan = plan_fine_payment(&prisoner(10, 0), Utc::now()).unwrap();
        assert_eq!(plan.batch.len(), 1);
        assert_eq!(plan.receipt.remaining_cash, Decimal::new(10, 0));
    }
}
