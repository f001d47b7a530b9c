//! Rate conversions and the money arithmetic shared by every schedule in the crate.

use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{FinanceError, Result};

/// Number of decimal places money is kept at.
pub const MONEY_SCALE: u32 = 2;

/// An interest rate as entered by the user, either per month or per year, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "basis", content = "percent")]
pub enum InterestRate {
    MonthlyPercent(Decimal),
    AnnualPercent(Decimal),
}

impl InterestRate {
    /// The effective monthly rate as a decimal factor (not percentage).
    ///
    /// Annual rates are converted by compound equivalence, so 12% a year becomes
    /// roughly 0.9489% a month rather than 1%.
    pub fn monthly_rate(&self) -> Decimal {
        match *self {
            InterestRate::MonthlyPercent(percent) => percent / dec!(100),
            InterestRate::AnnualPercent(percent) => normalize_annual_interest_rate(percent),
        }
    }

    pub fn percent(&self) -> Decimal {
        match *self {
            InterestRate::MonthlyPercent(percent) | InterestRate::AnnualPercent(percent) => percent,
        }
    }
}

/// Normalizes an annual interest rate percentage to a monthly decimal factor.
///
/// This function converts a rate like 10.5% per year into its equivalent monthly multiplier
/// for use in compound interest calculations.
pub fn normalize_annual_interest_rate(input: Decimal) -> Decimal {
    if input.is_zero() {
        return Decimal::ZERO;
    }

    let base = Decimal::ONE + input / dec!(100);
    let exponent = Decimal::ONE / dec!(12);

    base.powd(exponent) - Decimal::ONE
}

/// The annual percentage equivalent to a monthly decimal factor.
pub fn annualize_monthly_rate(monthly_rate: Decimal) -> Decimal {
    ((Decimal::ONE + monthly_rate).powu(12) - Decimal::ONE) * dec!(100)
}

/// Fixed installment of the Price table (French amortization system).
///
/// The Price table formula is: PMT = P * [i(1 + i)^n] / [(1 + i)^n – 1]
///
/// With a zero rate the formula degenerates to an even split of the balance.
///
/// # Errors
///
/// Returns an error if `months` is zero, or if the rate and term are too large to
/// compute `(1 + i)^n` within `Decimal` range.
pub fn price_payment(balance: Decimal, monthly_rate: Decimal, months: u32) -> Result<Decimal> {
    if months == 0 {
        return Err(FinanceError::Invalid("total months cannot be zero".to_string()));
    }
    if monthly_rate.is_zero() {
        return Ok(balance / Decimal::from(months));
    }

    let overflow = || {
        FinanceError::Invalid(format!(
            "a rate of {}% over {months} months is out of range",
            monthly_rate * dec!(100)
        ))
    };
    let i_plus_1_pow_n = (Decimal::ONE + monthly_rate)
        .checked_powu(months.into())
        .ok_or_else(overflow)?;
    monthly_rate
        .checked_mul(i_plus_1_pow_n)
        .and_then(|factor| balance.checked_mul(factor))
        .and_then(|numerator| numerator.checked_div(i_plus_1_pow_n - Decimal::ONE))
        .ok_or_else(overflow)
}

/// Rounds to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Splits `total` into `parts` installments that add up exactly to `total`.
///
/// Every part is the even share truncated to cents; the first part absorbs
/// the leftover cents.
pub fn split_amount(total: Decimal, parts: u32) -> Result<Vec<Decimal>> {
    if parts == 0 {
        return Err(FinanceError::Invalid(
            "an amount must be split in at least one part".to_string(),
        ));
    }

    let share = (total / Decimal::from(parts))
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero);
    let first = total - share * Decimal::from(parts - 1);

    let mut split = Vec::with_capacity(parts as usize);
    split.push(first);
    split.extend(std::iter::repeat_n(share, parts as usize - 1));
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalize_annual_interest_rate() {
        // 12% per year should be a bit less than 1% per month when compounded.
        let monthly_rate = normalize_annual_interest_rate(dec!(12));
        // (1.12)^(1/12) - 1 = 0.009488...
        assert!(monthly_rate > dec!(0.0094) && monthly_rate < dec!(0.0095));
    }

    #[test]
    fn annualize_inverts_normalize() {
        let monthly_rate = normalize_annual_interest_rate(dec!(10.5));
        let annual = annualize_monthly_rate(monthly_rate);
        assert_eq!(annual.round_dp(4), dec!(10.5));
    }

    #[test]
    fn monthly_percent_is_a_plain_division() {
        assert_eq!(InterestRate::MonthlyPercent(dec!(1.5)).monthly_rate(), dec!(0.015));
        assert_eq!(InterestRate::AnnualPercent(dec!(0)).monthly_rate(), dec!(0));
    }

    #[test]
    fn price_payment_matches_known_value() {
        let rate = normalize_annual_interest_rate(dec!(12));
        let payment = price_payment(dec!(12000), rate, 12).unwrap();
        assert_eq!(round_money(payment), dec!(1062.74));
    }

    #[test]
    fn price_payment_without_interest_is_an_even_split() {
        assert_eq!(price_payment(dec!(1200), dec!(0), 12).unwrap(), dec!(100));
    }

    #[test]
    fn price_payment_rejects_zero_months() {
        assert!(price_payment(dec!(1000), dec!(0.01), 0).is_err());
    }

    #[test]
    fn price_payment_out_of_range_is_an_error() {
        let result = price_payment(dec!(500000), dec!(0.12), 600);
        assert!(matches!(result, Err(FinanceError::Invalid(_))));
    }

    #[rstest]
    #[case(dec!(100), 3, vec![dec!(33.34), dec!(33.33), dec!(33.33)])]
    #[case(dec!(100), 1, vec![dec!(100)])]
    #[case(dec!(10.01), 2, vec![dec!(5.01), dec!(5.00)])]
    #[case(dec!(0.05), 10, vec![dec!(0.05), dec!(0), dec!(0), dec!(0), dec!(0), dec!(0), dec!(0), dec!(0), dec!(0), dec!(0)])]
    fn split_amount_keeps_the_total(
        #[case] total: Decimal,
        #[case] parts: u32,
        #[case] expected: Vec<Decimal>,
    ) {
        let split = split_amount(total, parts).unwrap();
        assert_eq!(split, expected);
        assert_eq!(split.iter().copied().sum::<Decimal>(), total);
    }

    #[rstest]
    #[case(dec!(1.005), dec!(1.01))]
    #[case(dec!(1.004), dec!(1.00))]
    #[case(dec!(-1.005), dec!(-1.01))]
    fn round_money_is_half_away_from_zero(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_money(input), expected);
    }
}
