//! Expenses paid directly or through a credit card, split in installments.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::add_months;
use crate::credit_card::{CardPurchase, CreditCardInvoiceService};
use crate::error::{FinanceError, Result};
use crate::ledger::{Id, Ledger};
use crate::rates::split_amount;
use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash, debit, transfer: each installment is settled on its own.
    Direct,
    /// Installments are charged to invoices and settled when the invoice is paid.
    CreditCard { card_id: Id },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInstallment {
    /// 1-based installment number.
    pub number: u32,
    pub amount: Decimal,
    /// For card payments, the due date of the invoice the installment was charged to.
    pub due_date: NaiveDate,
    pub status: Status,
    pub paid_on: Option<NaiveDate>,
    /// Invoice carrying this installment, for card payments.
    pub invoice_id: Option<Id>,
}

/// An expense, possibly split in monthly installments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Id,
    pub description: String,
    pub category: Option<String>,
    /// Total of the expense, before splitting.
    pub amount: Decimal,
    /// Date of the purchase; the first direct installment falls due on it.
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub installments: Vec<PaymentInstallment>,
    pub status: Status,
}

impl Payment {
    /// Sum of the installments still to be settled.
    pub fn remaining(&self) -> Decimal {
        self.installments
            .iter()
            .filter(|installment| installment.status.is_open())
            .map(|installment| installment.amount)
            .sum()
    }

    pub(crate) fn refresh_status(&mut self) {
        if self.status != Status::Cancelled {
            self.status = Status::aggregate(self.installments.iter().map(|installment| installment.status));
        }
    }

    fn installment_mut(&mut self, number: u32) -> Result<&mut PaymentInstallment> {
        self.installments
            .iter_mut()
            .find(|installment| installment.number == number)
            .ok_or(FinanceError::NotFound {
                entity: "installment",
                id: number.into(),
            })
    }

    fn ensure_direct(&self) -> Result<()> {
        match self.method {
            PaymentMethod::Direct => Ok(()),
            PaymentMethod::CreditCard { .. } => Err(FinanceError::Conflict(format!(
                "installments of payment {} are settled through their credit card invoice",
                self.id
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub description: String,
    pub category: Option<String>,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub installments: u32,
    pub method: PaymentMethod,
}

pub struct PaymentService;

impl PaymentService {
    pub fn register(ledger: &mut Ledger, new: NewPayment) -> Result<Id> {
        if new.amount <= Decimal::ZERO {
            return Err(FinanceError::Invalid(format!(
                "a payment must be positive (got {})",
                new.amount
            )));
        }
        if new.installments == 0 {
            return Err(FinanceError::Invalid(
                "a payment needs at least one installment".to_string(),
            ));
        }

        ledger.transact(|ledger| {
            let id = ledger.next_id();
            let installments: Vec<PaymentInstallment> = match new.method {
                PaymentMethod::Direct => split_amount(new.amount, new.installments)?
                    .into_iter()
                    .enumerate()
                    .map(|(offset, amount)| PaymentInstallment {
                        number: offset as u32 + 1,
                        amount,
                        due_date: add_months(new.date, offset as u32),
                        status: Status::Pending,
                        paid_on: None,
                        invoice_id: None,
                    })
                    .collect(),
                PaymentMethod::CreditCard { card_id } => CreditCardInvoiceService::add_purchase(
                    ledger,
                    card_id,
                    CardPurchase {
                        payment_id: Some(id),
                        description: new.description.clone(),
                        date: new.date,
                        total: new.amount,
                        installments: new.installments,
                    },
                )?
                .into_iter()
                .map(|charge| PaymentInstallment {
                    number: charge.installment,
                    amount: charge.amount,
                    due_date: charge.due_date,
                    status: Status::Pending,
                    paid_on: None,
                    invoice_id: Some(charge.invoice_id),
                })
                .collect(),
            };

            ledger.payments.insert(
                id,
                Payment {
                    id,
                    description: new.description.clone(),
                    category: new.category.clone(),
                    amount: new.amount,
                    date: new.date,
                    method: new.method,
                    installments,
                    status: Status::Pending,
                },
            );

            tracing::info!(
                id,
                description = %new.description,
                amount = %new.amount,
                installments = new.installments,
                "registered payment"
            );
            Ok(id)
        })
    }

    pub fn pay_installment(ledger: &mut Ledger, id: Id, number: u32, paid_on: NaiveDate) -> Result<()> {
        ledger.transact(|ledger| {
            let payment = ledger.payment_mut(id)?;
            payment.ensure_direct()?;

            let installment = payment.installment_mut(number)?;
            installment.status = installment.status.pay()?;
            installment.paid_on = Some(paid_on);
            payment.refresh_status();

            tracing::info!(id, number, %paid_on, "payment installment paid");
            Ok(())
        })
    }

    pub fn revert_installment(ledger: &mut Ledger, id: Id, number: u32, today: NaiveDate) -> Result<()> {
        let grace = ledger.config().overdue_grace_days;

        ledger.transact(|ledger| {
            let payment = ledger.payment_mut(id)?;
            payment.ensure_direct()?;

            let installment = payment.installment_mut(number)?;
            installment.status = installment.status.revert(installment.due_date, today, grace)?;
            installment.paid_on = None;
            payment.refresh_status();

            tracing::info!(id, number, "payment installment reverted");
            Ok(())
        })
    }

    /// Cancels whatever is still open; paid installments stay in the history.
    ///
    /// Card purchases are taken off their unpaid invoices, and installments already
    /// paid through an invoice are credited back on the card.
    pub fn cancel(ledger: &mut Ledger, id: Id, today: NaiveDate) -> Result<()> {
        ledger.transact(|ledger| {
            let payment = ledger.payment(id)?;
            if payment.status == Status::Cancelled {
                tracing::warn!(id, "payment already cancelled");
                return Err(FinanceError::InvalidTransition {
                    from: Status::Cancelled,
                    action: "cancel",
                });
            }

            let method = payment.method;
            let cancelled_numbers: Vec<u32> = match method {
                PaymentMethod::Direct => payment
                    .installments
                    .iter()
                    .filter(|installment| installment.status.is_open())
                    .map(|installment| installment.number)
                    .collect(),
                PaymentMethod::CreditCard { .. } => {
                    CreditCardInvoiceService::cancel_purchase(ledger, id, today)?.cancelled_installments
                }
            };

            let payment = ledger.payment_mut(id)?;
            for installment in payment
                .installments
                .iter_mut()
                .filter(|installment| cancelled_numbers.contains(&installment.number))
            {
                installment.status = installment.status.cancel()?;
            }
            payment.status = Status::Cancelled;

            tracing::info!(id, cancelled = cancelled_numbers.len(), "payment cancelled");
            Ok(())
        })
    }

    pub fn remaining(ledger: &Ledger, id: Id) -> Result<Decimal> {
        Ok(ledger.payment(id)?.remaining())
    }
}
