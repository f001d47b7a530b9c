//! Monthly cash-flow rollup across every kind of entry in the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::YearMonth;
use crate::ledger::Ledger;
use crate::payment::PaymentMethod;
use crate::status::Status;

/// Amount falling due in a month and how much of it is already settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub expected: Decimal,
    pub settled: Decimal,
}

impl Flow {
    fn add(&mut self, amount: Decimal, status: Status) {
        match status {
            Status::Cancelled => {}
            Status::Paid => {
                self.expected += amount;
                self.settled += amount;
            }
            Status::Pending | Status::Overdue => self.expected += amount,
        }
    }

    fn plus(self, other: Flow) -> Flow {
        Flow {
            expected: self.expected + other.expected,
            settled: self.settled + other.settled,
        }
    }

    fn minus(self, other: Flow) -> Flow {
        Flow {
            expected: self.expected - other.expected,
            settled: self.settled - other.settled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub period: YearMonth,
    pub incomes: Flow,
    /// Installments of payments made outside credit cards.
    pub payments: Flow,
    pub invoices: Flow,
    pub financings: Flow,
    pub outflow: Flow,
    pub balance: Flow,
}

/// Totals everything that falls due in `period`.
pub fn monthly(ledger: &Ledger, period: YearMonth) -> MonthlySummary {
    let mut incomes = Flow::default();
    for income in ledger.incomes().filter(|income| period.contains(income.expected_on)) {
        let amount = match income.status {
            Status::Paid => income.received_amount.unwrap_or(income.amount),
            _ => income.amount,
        };
        incomes.add(amount, income.status);
    }

    let mut payments = Flow::default();
    for payment in ledger
        .payments()
        .filter(|payment| payment.method == PaymentMethod::Direct)
    {
        for installment in payment
            .installments
            .iter()
            .filter(|installment| period.contains(installment.due_date))
        {
            payments.add(installment.amount, installment.status);
        }
    }

    let mut invoices = Flow::default();
    for invoice in ledger.invoices().filter(|invoice| invoice.period == period) {
        match invoice.status {
            Status::Paid => invoices.add(invoice.paid_amount.unwrap_or(invoice.total), Status::Paid),
            status => invoices.add(invoice.total.max(Decimal::ZERO), status),
        }
    }

    let mut financings = Flow::default();
    for financing in ledger.financings() {
        for installment in financing
            .installments
            .iter()
            .filter(|installment| period.contains(installment.due_date))
        {
            let amount = match installment.status {
                Status::Paid => installment.paid_amount.unwrap_or(installment.amount),
                _ => installment.amount,
            };
            financings.add(amount, installment.status);
        }
    }

    let outflow = payments.plus(invoices).plus(financings);
    tracing::debug!(%period, expected_outflow = %outflow.expected, "computed monthly summary");

    MonthlySummary {
        period,
        incomes,
        payments,
        invoices,
        financings,
        outflow,
        balance: incomes.minus(outflow),
    }
}
