//! Credit cards, their monthly invoices and the rules that keep invoice totals,
//! card limits and the linked payment installments consistent.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::calendar::{YearMonth, invoice_dates, invoice_period};
use crate::error::{FinanceError, Result};
use crate::ledger::{Id, Ledger};
use crate::rates::{round_money, split_amount};
use crate::status::Status;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCard {
    pub id: Id,
    pub name: String,
    /// Maximum amount owed across the open invoices.
    pub limit: Decimal,
    /// Day of the month the invoice closes; purchases from this day on go to the next invoice.
    pub closing_day: u32,
    /// Day of the month the invoice falls due.
    pub due_day: u32,
    /// Inactive cards refuse new purchases.
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewCreditCard {
    pub name: String,
    pub limit: Decimal,
    pub closing_day: u32,
    pub due_day: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Purchase,
    /// Credit for installments that were already paid when their purchase was cancelled.
    Refund,
    /// Unpaid remainder of a previous invoice, including revolving interest.
    CarriedBalance { from: Id },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Id,
    pub description: String,
    /// Payment the charge belongs to, if it was registered as one.
    pub payment_id: Option<Id>,
    /// Which installment of the purchase this is, out of `installments`.
    pub installment: u32,
    pub installments: u32,
    /// Negative for refunds.
    pub amount: Decimal,
    pub kind: ItemKind,
    /// Cancelled items stay on the invoice but no longer count towards its total.
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Id,
    pub card_id: Id,
    /// Named after the month the invoice falls due.
    pub period: YearMonth,
    /// Purchases from this date on go to the next invoice.
    pub closing_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<InvoiceItem>,
    /// Sum of the live items; negative when refunds exceed the charges.
    pub total: Decimal,
    pub status: Status,
    pub paid_on: Option<NaiveDate>,
    /// What was actually paid, which may be less than `total`.
    pub paid_amount: Option<Decimal>,
    /// Invoice that received the unpaid remainder of this one.
    pub carried_to: Option<Id>,
}

impl Invoice {
    pub fn is_closed(&self, today: NaiveDate) -> bool {
        today >= self.closing_date
    }

    fn recalculate(&mut self) -> Decimal {
        self.total = self
            .items
            .iter()
            .filter(|item| !item.cancelled)
            .map(|item| item.amount)
            .sum();
        self.total
    }
}

/// A purchase to spread over one or more invoices.
#[derive(Debug, Clone)]
pub struct CardPurchase {
    pub payment_id: Option<Id>,
    pub description: String,
    /// Purchase date, which picks the first invoice.
    pub date: NaiveDate,
    pub total: Decimal,
    /// Number of consecutive invoices the total is split over.
    pub installments: u32,
}

/// Where one installment of a card purchase was charged.
#[derive(Debug, Clone, PartialEq)]
pub struct CardCharge {
    pub installment: u32,
    pub invoice_id: Id,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

/// Outcome of cancelling a card purchase.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CancelledPurchase {
    /// Installments removed from invoices that were still unpaid.
    pub cancelled_installments: Vec<u32>,
    /// Amount credited back for installments whose invoices were already paid.
    pub refunded: Decimal,
}

pub struct CreditCardInvoiceService;

impl CreditCardInvoiceService {
    pub fn register_card(ledger: &mut Ledger, new: NewCreditCard) -> Result<Id> {
        for (label, day) in [("closing", new.closing_day), ("due", new.due_day)] {
            if !(1..=31).contains(&day) {
                return Err(FinanceError::Invalid(format!(
                    "{label} day must be between 1 and 31 (got {day})"
                )));
            }
        }
        if new.closing_day == new.due_day {
            return Err(FinanceError::Invalid(
                "closing and due day must differ".to_string(),
            ));
        }
        if new.limit <= Decimal::ZERO {
            return Err(FinanceError::Invalid(format!(
                "the card limit must be positive (got {})",
                new.limit
            )));
        }

        let id = ledger.next_id();
        tracing::info!(id, name = %new.name, limit = %new.limit, "registered credit card");
        ledger.credit_cards.insert(
            id,
            CreditCard {
                id,
                name: new.name,
                limit: new.limit,
                closing_day: new.closing_day,
                due_day: new.due_day,
                active: true,
            },
        );
        Ok(id)
    }

    pub fn deactivate_card(ledger: &mut Ledger, card_id: Id) -> Result<()> {
        ledger.credit_card_mut(card_id)?.active = false;
        tracing::info!(card_id, "deactivated credit card");
        Ok(())
    }

    /// The invoice of `card_id` for `period`, created empty if it does not exist yet.
    pub fn invoice_for(ledger: &mut Ledger, card_id: Id, period: YearMonth) -> Result<Id> {
        let card = ledger.credit_card(card_id)?;
        let (closing_day, due_day) = (card.closing_day, card.due_day);

        if let Some(invoice) = ledger
            .invoices()
            .find(|invoice| invoice.card_id == card_id && invoice.period == period)
        {
            return Ok(invoice.id);
        }

        let (closing_date, due_date) = invoice_dates(period, closing_day, due_day);
        let id = ledger.next_id();
        ledger.invoices.insert(
            id,
            Invoice {
                id,
                card_id,
                period,
                closing_date,
                due_date,
                items: Vec::new(),
                total: Decimal::ZERO,
                status: Status::Pending,
                paid_on: None,
                paid_amount: None,
                carried_to: None,
            },
        );
        tracing::debug!(id, card_id, %period, "opened invoice");
        Ok(id)
    }

    /// Card limit minus everything still owed on open invoices.
    pub fn available_limit(ledger: &Ledger, card_id: Id) -> Result<Decimal> {
        let card = ledger.credit_card(card_id)?;
        let committed: Decimal = ledger
            .invoices()
            .filter(|invoice| invoice.card_id == card_id && invoice.status.is_open())
            .map(|invoice| invoice.total.max(Decimal::ZERO))
            .sum();
        Ok(card.limit - committed)
    }

    /// Charges a purchase to the card, one installment per consecutive invoice.
    pub fn add_purchase(
        ledger: &mut Ledger,
        card_id: Id,
        purchase: CardPurchase,
    ) -> Result<Vec<CardCharge>> {
        if purchase.total <= Decimal::ZERO {
            return Err(FinanceError::Invalid(format!(
                "a purchase must be positive (got {})",
                purchase.total
            )));
        }

        ledger.transact(|ledger| {
            let card = ledger.credit_card(card_id)?;
            if !card.active {
                return Err(FinanceError::Conflict(format!(
                    "credit card {} is inactive",
                    card.name
                )));
            }
            let first_period = invoice_period(purchase.date, card.closing_day, card.due_day);

            let available = Self::available_limit(ledger, card_id)?;
            if purchase.total > available {
                return Err(FinanceError::CreditLimitExceeded {
                    available,
                    requested: purchase.total,
                });
            }

            let amounts = split_amount(purchase.total, purchase.installments)?;
            let mut charges = Vec::with_capacity(amounts.len());
            for (offset, amount) in amounts.into_iter().enumerate() {
                let number = offset as u32 + 1;
                let invoice_id = Self::invoice_for(ledger, card_id, first_period.offset(offset as i32))?;
                let item_id = ledger.next_id();
                let invoice = ledger.invoice_mut(invoice_id)?;
                if invoice.status == Status::Paid {
                    return Err(FinanceError::InvoicePaid(invoice_id));
                }

                invoice.items.push(InvoiceItem {
                    id: item_id,
                    description: purchase.description.clone(),
                    payment_id: purchase.payment_id,
                    installment: number,
                    installments: purchase.installments,
                    amount,
                    kind: ItemKind::Purchase,
                    cancelled: false,
                });
                invoice.recalculate();
                charges.push(CardCharge {
                    installment: number,
                    invoice_id,
                    due_date: invoice.due_date,
                    amount,
                });
            }

            tracing::info!(
                card_id,
                description = %purchase.description,
                total = %purchase.total,
                installments = purchase.installments,
                first_period = %first_period,
                "charged purchase to credit card"
            );
            Ok(charges)
        })
    }

    /// Recomputes the invoice total from its live items.
    pub fn recalculate(ledger: &mut Ledger, invoice_id: Id) -> Result<Decimal> {
        Ok(ledger.invoice_mut(invoice_id)?.recalculate())
    }

    /// Pays an invoice; anything short of the total is carried to the next invoice with revolving interest.
    pub fn pay_invoice(
        ledger: &mut Ledger,
        invoice_id: Id,
        paid_on: NaiveDate,
        amount: Decimal,
    ) -> Result<()> {
        let revolving_rate = ledger.config().revolving_interest_rate / dec!(100);

        ledger.transact(|ledger| {
            let invoice = ledger.invoice(invoice_id)?;
            let total = invoice.total;
            let payable = total.max(Decimal::ZERO);
            if amount < Decimal::ZERO || amount > payable {
                return Err(FinanceError::Invalid(format!(
                    "invoice {invoice_id} accepts a payment between 0 and {payable} (got {amount})"
                )));
            }
            let status = invoice.status.pay()?;
            let (card_id, period) = (invoice.card_id, invoice.period);

            let remainder = total - amount;
            let mut carried_to = None;
            if !remainder.is_zero() {
                let carried = if remainder > Decimal::ZERO {
                    round_money(remainder * (Decimal::ONE + revolving_rate))
                } else {
                    remainder
                };
                let next_id = Self::invoice_for(ledger, card_id, period.next())?;
                let item_id = ledger.next_id();
                let next = ledger.invoice_mut(next_id)?;
                if next.status == Status::Paid {
                    return Err(FinanceError::InvoicePaid(next_id));
                }
                next.items.push(InvoiceItem {
                    id: item_id,
                    description: format!("Balance carried from {period}"),
                    payment_id: None,
                    installment: 1,
                    installments: 1,
                    amount: carried,
                    kind: ItemKind::CarriedBalance { from: invoice_id },
                    cancelled: false,
                });
                next.recalculate();
                carried_to = Some(next_id);
                tracing::debug!(invoice_id, next_id, %carried, "carried invoice remainder");
            }

            let invoice = ledger.invoice_mut(invoice_id)?;
            invoice.status = status;
            invoice.paid_on = Some(paid_on);
            invoice.paid_amount = Some(amount);
            invoice.carried_to = carried_to;

            let linked = linked_installments(invoice);
            for (payment_id, number) in linked {
                let payment = ledger.payment_mut(payment_id)?;
                if let Some(installment) = payment
                    .installments
                    .iter_mut()
                    .find(|installment| installment.number == number && installment.status.is_open())
                {
                    installment.status = Status::Paid;
                    installment.paid_on = Some(paid_on);
                }
                payment.refresh_status();
            }

            tracing::info!(invoice_id, %paid_on, %amount, %total, "invoice paid");
            Ok(())
        })
    }

    /// Undoes an invoice payment, including the remainder it carried forward.
    pub fn revert_invoice_payment(ledger: &mut Ledger, invoice_id: Id, today: NaiveDate) -> Result<()> {
        let grace = ledger.config().overdue_grace_days;

        ledger.transact(|ledger| {
            let invoice = ledger.invoice(invoice_id)?;
            let status = invoice.status.revert(invoice.due_date, today, grace)?;

            for (payment_id, _) in linked_installments(invoice) {
                if ledger.payment(payment_id)?.status == Status::Cancelled
                    || has_live_refund(ledger, payment_id)
                {
                    tracing::warn!(invoice_id, payment_id, "refusing to revert: purchase was cancelled");
                    return Err(FinanceError::Conflict(format!(
                        "payment {payment_id} was cancelled after invoice {invoice_id} was paid"
                    )));
                }
            }

            if let Some(next_id) = invoice.carried_to {
                let next = ledger.invoice_mut(next_id)?;
                if next.status == Status::Paid {
                    tracing::warn!(invoice_id, next_id, "refusing to revert: carried balance already paid");
                    return Err(FinanceError::Conflict(format!(
                        "invoice {next_id} already paid the balance carried from invoice {invoice_id}"
                    )));
                }
                next.items
                    .retain(|item| item.kind != ItemKind::CarriedBalance { from: invoice_id });
                next.recalculate();
            }

            let invoice = ledger.invoice_mut(invoice_id)?;
            invoice.status = status;
            invoice.paid_on = None;
            invoice.paid_amount = None;
            invoice.carried_to = None;

            for (payment_id, number) in linked_installments(invoice) {
                let payment = ledger.payment_mut(payment_id)?;
                if let Some(installment) = payment
                    .installments
                    .iter_mut()
                    .find(|installment| installment.number == number && installment.status == Status::Paid)
                {
                    installment.status = Status::Paid.revert(installment.due_date, today, grace)?;
                    installment.paid_on = None;
                }
                payment.refresh_status();
            }

            tracing::info!(invoice_id, "invoice payment reverted");
            Ok(())
        })
    }

    /// Removes a purchase from the unpaid invoices and credits back what was already paid.
    pub fn cancel_purchase(
        ledger: &mut Ledger,
        payment_id: Id,
        today: NaiveDate,
    ) -> Result<CancelledPurchase> {
        ledger.transact(|ledger| {
            if has_live_refund(ledger, payment_id) {
                tracing::warn!(payment_id, "refusing to cancel: purchase already refunded");
                return Err(FinanceError::Conflict(format!(
                    "payment {payment_id} was already cancelled and refunded"
                )));
            }

            let mut outcome = CancelledPurchase::default();
            let mut card_id = None;
            let mut description = String::new();

            for invoice in ledger.invoices.values_mut() {
                let paid = invoice.status == Status::Paid;
                let mut touched = false;
                for item in invoice.items.iter_mut().filter(|item| {
                    item.payment_id == Some(payment_id)
                        && item.kind == ItemKind::Purchase
                        && !item.cancelled
                }) {
                    card_id = Some(invoice.card_id);
                    description.clone_from(&item.description);
                    if paid {
                        outcome.refunded += item.amount;
                    } else {
                        item.cancelled = true;
                        outcome.cancelled_installments.push(item.installment);
                        touched = true;
                    }
                }
                if touched {
                    invoice.recalculate();
                }
            }

            let Some(card_id) = card_id else {
                return Err(FinanceError::Conflict(format!(
                    "payment {payment_id} has no live credit card charges"
                )));
            };

            if outcome.refunded > Decimal::ZERO {
                let card = ledger.credit_card(card_id)?;
                let mut period = invoice_period(today, card.closing_day, card.due_day);
                let invoice_id = loop {
                    let id = Self::invoice_for(ledger, card_id, period)?;
                    if ledger.invoice(id)?.status != Status::Paid {
                        break id;
                    }
                    period = period.next();
                };

                let item_id = ledger.next_id();
                let invoice = ledger.invoice_mut(invoice_id)?;
                invoice.items.push(InvoiceItem {
                    id: item_id,
                    description: format!("Refund: {description}"),
                    payment_id: Some(payment_id),
                    installment: 1,
                    installments: 1,
                    amount: -outcome.refunded,
                    kind: ItemKind::Refund,
                    cancelled: false,
                });
                invoice.recalculate();
            }

            outcome.cancelled_installments.sort_unstable();
            tracing::info!(
                payment_id,
                cancelled = outcome.cancelled_installments.len(),
                refunded = %outcome.refunded,
                "cancelled card purchase"
            );
            Ok(outcome)
        })
    }
}

/// Whether a credit for `payment_id` sits on any invoice.
fn has_live_refund(ledger: &Ledger, payment_id: Id) -> bool {
    ledger.invoices().any(|invoice| {
        invoice.items.iter().any(|item| {
            item.payment_id == Some(payment_id) && item.kind == ItemKind::Refund && !item.cancelled
        })
    })
}

fn linked_installments(invoice: &Invoice) -> Vec<(Id, u32)> {
    invoice
        .items
        .iter()
        .filter(|item| item.kind == ItemKind::Purchase && !item.cancelled)
        .filter_map(|item| item.payment_id.map(|payment_id| (payment_id, item.installment)))
        .collect()
}
