//! In-memory store every service works on.
//!
//! The ledger plays the role of a unit of work: services receive `&mut Ledger`, and
//! [`Ledger::transact`] makes a whole operation apply completely or not at all.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::credit_card::{CreditCard, Invoice};
use crate::error::{FinanceError, Result};
use crate::financing::Financing;
use crate::income::Income;
use crate::investment::Investment;
use crate::payment::Payment;
use crate::status::Status;

pub type Id = u64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    config: EngineConfig,
    last_id: Id,
    pub(crate) incomes: BTreeMap<Id, Income>,
    pub(crate) payments: BTreeMap<Id, Payment>,
    pub(crate) credit_cards: BTreeMap<Id, CreditCard>,
    pub(crate) invoices: BTreeMap<Id, Invoice>,
    pub(crate) financings: BTreeMap<Id, Financing>,
    pub(crate) investments: BTreeMap<Id, Investment>,
}

macro_rules! table {
    ($field:ident, $get:ident, $get_mut:ident, $ty:ty, $entity:literal) => {
        pub fn $get(&self, id: Id) -> Result<&$ty> {
            self.$field
                .get(&id)
                .ok_or(FinanceError::NotFound { entity: $entity, id })
        }

        pub(crate) fn $get_mut(&mut self, id: Id) -> Result<&mut $ty> {
            self.$field
                .get_mut(&id)
                .ok_or(FinanceError::NotFound { entity: $entity, id })
        }

        pub fn $field(&self) -> impl Iterator<Item = &$ty> {
            self.$field.values()
        }
    };
}

impl Ledger {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn next_id(&mut self) -> Id {
        self.last_id += 1;
        self.last_id
    }

    table!(incomes, income, income_mut, Income, "income");
    table!(payments, payment, payment_mut, Payment, "payment");
    table!(credit_cards, credit_card, credit_card_mut, CreditCard, "credit card");
    table!(invoices, invoice, invoice_mut, Invoice, "invoice");
    table!(financings, financing, financing_mut, Financing, "financing");
    table!(investments, investment, investment_mut, Investment, "investment");

    /// Runs `operation` against a draft of the ledger and keeps the draft only if it succeeds.
    pub fn transact<T, F>(&mut self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger) -> Result<T>,
    {
        let mut draft = self.clone();
        let value = operation(&mut draft)?;
        *self = draft;
        Ok(value)
    }

    /// Flags open items past their due date as overdue (and un-flags items whose due date moved).
    ///
    /// Returns how many statuses changed.
    pub fn refresh_overdue(&mut self, today: NaiveDate) -> usize {
        let grace = self.config.overdue_grace_days;
        let mut changed = 0;
        let mut refresh = |status: &mut Status, due: NaiveDate| {
            let refreshed = status.refresh(due, today, grace);
            if refreshed != *status {
                *status = refreshed;
                changed += 1;
            }
        };

        for income in self.incomes.values_mut() {
            refresh(&mut income.status, income.expected_on);
        }
        for invoice in self.invoices.values_mut() {
            refresh(&mut invoice.status, invoice.due_date);
        }
        for payment in self.payments.values_mut() {
            for installment in &mut payment.installments {
                refresh(&mut installment.status, installment.due_date);
            }
            payment.refresh_status();
        }
        for financing in self.financings.values_mut() {
            for installment in &mut financing.installments {
                refresh(&mut installment.status, installment.due_date);
            }
            financing.refresh_status();
        }

        if changed > 0 {
            tracing::info!(%today, changed, "refreshed overdue statuses");
        }
        changed
    }
}
