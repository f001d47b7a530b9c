//! Expected incomes and their receipt.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::add_months;
use crate::error::{FinanceError, Result};
use crate::ledger::{Id, Ledger};
use crate::status::Status;

/// Money expected to come in, e.g. a salary or a freelance invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    pub id: Id,
    pub description: String,
    pub amount: Decimal,
    pub expected_on: NaiveDate,
    pub status: Status,
    pub received_on: Option<NaiveDate>,
    pub received_amount: Option<Decimal>,
    /// Id of the first income of a monthly series, shared by every member.
    pub series: Option<Id>,
}

#[derive(Debug, Clone)]
pub struct NewIncome {
    pub description: String,
    pub amount: Decimal,
    pub expected_on: NaiveDate,
    /// How many consecutive months the income repeats for; 1 is a one-off.
    pub repeat_months: u32,
}

pub struct IncomeService;

impl IncomeService {
    /// Registers an income, or a monthly series of them, and returns the new ids in date order.
    pub fn register(ledger: &mut Ledger, new: NewIncome) -> Result<Vec<Id>> {
        if new.amount <= Decimal::ZERO {
            return Err(FinanceError::Invalid(format!(
                "an income must be positive (got {})",
                new.amount
            )));
        }
        if new.repeat_months == 0 {
            return Err(FinanceError::Invalid(
                "an income must happen at least once".to_string(),
            ));
        }

        ledger.transact(|ledger| {
            let mut ids = Vec::with_capacity(new.repeat_months as usize);
            let mut series = None;

            for month in 0..new.repeat_months {
                let id = ledger.next_id();
                if new.repeat_months > 1 && series.is_none() {
                    series = Some(id);
                }
                ledger.incomes.insert(
                    id,
                    Income {
                        id,
                        description: new.description.clone(),
                        amount: new.amount,
                        expected_on: add_months(new.expected_on, month),
                        status: Status::Pending,
                        received_on: None,
                        received_amount: None,
                        series,
                    },
                );
                ids.push(id);
            }

            tracing::info!(
                description = %new.description,
                amount = %new.amount,
                months = new.repeat_months,
                "registered income"
            );
            Ok(ids)
        })
    }

    /// Marks an income as received; `amount` defaults to the expected amount.
    pub fn receive(
        ledger: &mut Ledger,
        id: Id,
        on: NaiveDate,
        amount: Option<Decimal>,
    ) -> Result<()> {
        ledger.transact(|ledger| {
            let income = ledger.income_mut(id)?;
            let received = amount.unwrap_or(income.amount);
            if received <= Decimal::ZERO {
                return Err(FinanceError::Invalid(format!(
                    "a received amount must be positive (got {received})"
                )));
            }

            income.status = income.status.pay()?;
            income.received_on = Some(on);
            income.received_amount = Some(received);
            tracing::info!(id, %on, amount = %received, "income received");
            Ok(())
        })
    }

    pub fn revert_receipt(ledger: &mut Ledger, id: Id, today: NaiveDate) -> Result<()> {
        let grace = ledger.config().overdue_grace_days;
        ledger.transact(|ledger| {
            let income = ledger.income_mut(id)?;
            income.status = income.status.revert(income.expected_on, today, grace)?;
            income.received_on = None;
            income.received_amount = None;
            tracing::info!(id, "income receipt reverted");
            Ok(())
        })
    }

    pub fn cancel(ledger: &mut Ledger, id: Id) -> Result<()> {
        ledger.transact(|ledger| {
            let income = ledger.income_mut(id)?;
            income.status = income.status.cancel()?;
            tracing::info!(id, "income cancelled");
            Ok(())
        })
    }
}
