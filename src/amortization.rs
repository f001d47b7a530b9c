//! Installment schedules for the two amortization systems used in Brazilian financing.
//!
//! - **SAC (Sistema de Amortização Constante)**: fixed amortization, so payments decrease over time.
//! - **Price (Sistema Francês de Amortização)**: fixed payments throughout the financing period.
//!
//! Both systems share one projection routine so that a financing can be re-projected
//! from any point of its life (after an extra amortization or a monetary correction)
//! with exactly the same arithmetic it was created with.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::calendar::add_months;
use crate::error::{FinanceError, Result};
use crate::rates::{InterestRate, price_payment, round_money};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmortizationSystem {
    #[default]
    Price,
    Sac,
}

impl fmt::Display for AmortizationSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmortizationSystem::Price => f.write_str("price"),
            AmortizationSystem::Sac => f.write_str("sac"),
        }
    }
}

impl FromStr for AmortizationSystem {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "price" => Ok(AmortizationSystem::Price),
            "sac" => Ok(AmortizationSystem::Sac),
            other => Err(FinanceError::Invalid(format!(
                "{other} is not an amortization system (expected price or sac)"
            ))),
        }
    }
}

/// Represents the payment details for a single month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// 1-based installment number.
    pub number: u32,
    /// Date the installment falls due.
    pub due_date: NaiveDate,
    /// Monetary correction added to the balance before interest is charged.
    pub correction: Decimal,
    /// The portion of the payment that covers interest.
    pub interest: Decimal,
    /// The portion of the payment that goes towards reducing the principal.
    pub amortization: Decimal,
    /// The total amount due, amortization plus interest.
    pub payment: Decimal,
    /// The remaining balance of the loan after the payment.
    pub balance: Decimal,
}

/// Starting point of a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Balance right before the first projected installment.
    pub balance: Decimal,
    /// Effective monthly interest rate as a decimal (not percentage).
    pub monthly_rate: Decimal,
    /// Monthly monetary correction as a decimal (not percentage).
    pub correction_rate: Decimal,
    /// Number of installments to project.
    pub months: u32,
    /// Number given to the first projected installment.
    pub first_number: u32,
    /// Due date of installment number 1; installment `n` falls due `n - 1` months later.
    pub schedule_start: NaiveDate,
}

/// Projects installments from `input.balance` until the balance reaches zero.
///
/// Every value is rounded to cents as it is produced, and the last installment
/// amortizes whatever is left, so the amortizations always add up to the balance
/// plus the corrections.
///
/// # Errors
///
/// Returns an error if `input.months` or `input.first_number` is zero, or if the
/// Price payment is out of `Decimal` range.
pub fn project(system: AmortizationSystem, input: &Projection) -> Result<Vec<ScheduleRow>> {
    if input.months == 0 {
        return Err(FinanceError::Invalid("total months cannot be zero".to_string()));
    }
    if input.first_number == 0 {
        return Err(FinanceError::Invalid("installments are numbered from 1".to_string()));
    }

    let mut balance = input.balance;
    let mut reference = reference_installment(system, balance, input.monthly_rate, input.months)?;
    let mut rows = Vec::with_capacity(input.months as usize);

    for offset in 0..input.months {
        let remaining = input.months - offset;

        let correction = round_money(balance * input.correction_rate);
        if !correction.is_zero() {
            balance += correction;
            reference = reference_installment(system, balance, input.monthly_rate, remaining)?;
        }

        let interest = round_money(balance * input.monthly_rate);
        let mut amortization = match system {
            AmortizationSystem::Price => (reference - interest).max(Decimal::ZERO),
            AmortizationSystem::Sac => reference,
        };
        if remaining == 1 || amortization > balance {
            amortization = balance;
        }
        balance -= amortization;

        let number = input.first_number + offset;
        rows.push(ScheduleRow {
            number,
            due_date: add_months(input.schedule_start, number - 1),
            correction,
            interest,
            amortization,
            payment: amortization + interest,
            balance,
        });
    }

    Ok(rows)
}

/// The value a system keeps fixed: the payment for Price, the amortization for SAC.
fn reference_installment(
    system: AmortizationSystem,
    balance: Decimal,
    monthly_rate: Decimal,
    months: u32,
) -> Result<Decimal> {
    let value = match system {
        AmortizationSystem::Price => price_payment(balance, monthly_rate, months)?,
        AmortizationSystem::Sac => balance / Decimal::from(months),
    };
    Ok(round_money(value))
}

/// Builds the full schedule of a new financing.
///
/// # Errors
///
/// Returns an error if the principal is not positive, `months` is zero, the interest rate is
/// negative or the correction would wipe out the balance.
pub fn build_schedule(
    system: AmortizationSystem,
    principal: Decimal,
    rate: InterestRate,
    monthly_correction_percent: Decimal,
    months: u32,
    first_due_date: NaiveDate,
) -> Result<Vec<ScheduleRow>> {
    if principal <= Decimal::ZERO {
        return Err(FinanceError::Invalid(format!(
            "the financed amount must be positive (got {principal})"
        )));
    }
    if months == 0 {
        return Err(FinanceError::Invalid("total months cannot be zero".to_string()));
    }
    if rate.percent() < Decimal::ZERO {
        return Err(FinanceError::Invalid(format!(
            "the interest rate cannot be negative (got {}%)",
            rate.percent()
        )));
    }
    if monthly_correction_percent <= dec!(-100) {
        return Err(FinanceError::Invalid(format!(
            "a correction of {monthly_correction_percent}% would erase the balance"
        )));
    }

    project(
        system,
        &Projection {
            balance: principal,
            monthly_rate: rate.monthly_rate(),
            correction_rate: monthly_correction_percent / dec!(100),
            months,
            first_number: 1,
            schedule_start: first_due_date,
        },
    )
}

/// Number of months needed to repay `balance` while keeping `reference` fixed
/// (the payment for Price, the amortization for SAC), never more than `max_months`.
pub fn term_for_reduced_balance(
    system: AmortizationSystem,
    balance: Decimal,
    monthly_rate: Decimal,
    reference: Decimal,
    max_months: u32,
) -> u32 {
    if balance <= Decimal::ZERO {
        return 1;
    }
    if reference <= Decimal::ZERO {
        return max_months.max(1);
    }

    let months = match system {
        AmortizationSystem::Sac => {
            (balance / reference).ceil().to_u32().unwrap_or(u32::MAX)
        }
        AmortizationSystem::Price => {
            let mut remaining = balance;
            let mut months = 0;
            while remaining > Decimal::ZERO && months < max_months {
                let interest = round_money(remaining * monthly_rate);
                if reference <= interest {
                    return max_months.max(1);
                }
                remaining = remaining + interest - reference;
                months += 1;
            }
            months
        }
    };

    months.clamp(1, max_months.max(1))
}

/// Aggregated view of one system's schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub system: AmortizationSystem,
    /// The amount of the first payment.
    pub first_payment: Decimal,
    /// The amount of the last payment.
    pub last_payment: Decimal,
    /// The total amount paid over the lifetime of the loan.
    pub total_paid: Decimal,
    pub total_interest: Decimal,
    pub total_correction: Decimal,
    /// The payment details for each month.
    pub amortization_curve: Vec<ScheduleRow>,
}

impl ScheduleSummary {
    pub fn from_rows(system: AmortizationSystem, rows: Vec<ScheduleRow>) -> Self {
        let first_payment = rows.first().map(|row| row.payment).unwrap_or_default();
        let last_payment = rows.last().map(|row| row.payment).unwrap_or_default();

        Self {
            system,
            first_payment,
            last_payment,
            total_paid: rows.iter().map(|row| row.payment).sum(),
            total_interest: rows.iter().map(|row| row.interest).sum(),
            total_correction: rows.iter().map(|row| row.correction).sum(),
            amortization_curve: rows,
        }
    }
}

/// Input parameters for debt trajectory calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtCalculationInput {
    /// The total principal amount of the loan.
    pub total_amount: Decimal,
    /// The annual interest rate as a percentage (e.g., 10.5 for 10.5%).
    pub interest_per_year: Decimal,
    /// The total number of months for the loan.
    pub total_months: u32,
    pub first_due_date: NaiveDate,
    /// Expected monthly monetary correction as a percentage.
    #[serde(default)]
    pub monthly_correction: Decimal,
}

/// Contains the results for both Price and SAC table calculations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtTrajectoryResult {
    /// The initial total amount of the loan.
    pub initial_total_amount: Decimal,
    pub price_table: ScheduleSummary,
    pub sac_table: ScheduleSummary,
}

/// Calculates and compares the debt trajectory for both Price and SAC amortization systems.
///
/// # Errors
///
/// Returns an error if the input is rejected by [`build_schedule`].
pub fn calculate_debt_trajectory(input: DebtCalculationInput) -> Result<DebtTrajectoryResult> {
    let rate = InterestRate::AnnualPercent(input.interest_per_year);
    let table = |system| {
        build_schedule(
            system,
            input.total_amount,
            rate,
            input.monthly_correction,
            input.total_months,
            input.first_due_date,
        )
        .map(|rows| ScheduleSummary::from_rows(system, rows))
    };

    Ok(DebtTrajectoryResult {
        initial_total_amount: input.total_amount,
        price_table: table(AmortizationSystem::Price)?,
        sac_table: table(AmortizationSystem::Sac)?,
    })
}
