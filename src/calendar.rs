//! Month arithmetic and credit card closing/due dates.

use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{FinanceError, Result};

/// A calendar month, used to name invoice periods and report windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(FinanceError::Invalid(format!("{month} is not a valid month")));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month `months` away from this one; negative values go back in time.
    pub fn offset(&self, months: i32) -> Self {
        let index = self.year * 12 + self.month as i32 - 1 + months;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn next(&self) -> Self {
        self.offset(1)
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    /// The given day of this month, clamped to the month's length (31 in February is the 28th or 29th).
    pub fn day(&self, day: u32) -> NaiveDate {
        let last = self.last_day();
        if day >= last.day() {
            return last;
        }
        NaiveDate::from_ymd_opt(self.year, self.month, day.max(1)).unwrap_or(last)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Adds calendar months to `date`, clamping the day to the end of the target month.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// The invoice period (named by the month of its due date) a purchase made on `purchase` falls in.
///
/// Purchases made on or after the closing date belong to the next invoice.
pub fn invoice_period(purchase: NaiveDate, closing_day: u32, due_day: u32) -> YearMonth {
    let purchase_month = YearMonth::of(purchase);
    let closing_month = if purchase < purchase_month.day(closing_day) {
        purchase_month
    } else {
        purchase_month.next()
    };

    if due_day > closing_day {
        closing_month
    } else {
        closing_month.next()
    }
}

/// Closing and due dates of the invoice for `period`.
pub fn invoice_dates(period: YearMonth, closing_day: u32, due_day: u32) -> (NaiveDate, NaiveDate) {
    let closing_month = if due_day > closing_day {
        period
    } else {
        period.offset(-1)
    };

    (closing_month.day(closing_day), period.day(due_day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[rstest]
    #[case(2024, 1, 1, 2024, 2)]
    #[case(2024, 12, 1, 2025, 1)]
    #[case(2024, 1, -1, 2023, 12)]
    #[case(2024, 3, -15, 2022, 12)]
    #[case(2024, 6, 30, 2026, 12)]
    fn offset_wraps_years(
        #[case] year: i32,
        #[case] month: u32,
        #[case] offset: i32,
        #[case] expected_year: i32,
        #[case] expected_month: u32,
    ) {
        let shifted = YearMonth::new(year, month).unwrap().offset(offset);
        assert_eq!(shifted, YearMonth::new(expected_year, expected_month).unwrap());
    }

    #[test]
    fn rejects_invalid_month() {
        assert!(YearMonth::new(2024, 13).is_err());
        assert!(YearMonth::new(2024, 0).is_err());
    }

    #[test]
    fn day_is_clamped_to_month_length() {
        let february = YearMonth::new(2024, 2).unwrap();
        assert_eq!(february.day(31), date(2024, 2, 29));
        assert_eq!(february.day(10), date(2024, 2, 10));
        assert_eq!(YearMonth::new(2023, 2).unwrap().day(30), date(2023, 2, 28));
    }

    #[test]
    fn add_months_clamps_day() {
        assert_eq!(add_months(date(2024, 1, 31), 1), date(2024, 2, 29));
        assert_eq!(add_months(date(2024, 1, 31), 3), date(2024, 4, 30));
        assert_eq!(add_months(date(2024, 11, 15), 2), date(2025, 1, 15));
    }

    #[test]
    fn displays_as_iso_month() {
        assert_eq!(YearMonth::new(2024, 3).unwrap().to_string(), "2024-03");
    }

    // Card closing on the 3rd, due on the 10th of the same month.
    #[rstest]
    #[case(date(2024, 3, 2), 2024, 3)]
    #[case(date(2024, 3, 3), 2024, 4)]
    #[case(date(2024, 3, 25), 2024, 4)]
    #[case(date(2024, 12, 5), 2025, 1)]
    fn purchase_period_when_due_after_closing(
        #[case] purchase: NaiveDate,
        #[case] year: i32,
        #[case] month: u32,
    ) {
        assert_eq!(
            invoice_period(purchase, 3, 10),
            YearMonth::new(year, month).unwrap()
        );
    }

    // Card closing on the 25th, due on the 5th of the following month.
    #[rstest]
    #[case(date(2024, 3, 24), 2024, 4)]
    #[case(date(2024, 3, 25), 2024, 5)]
    #[case(date(2024, 12, 30), 2025, 2)]
    fn purchase_period_when_due_next_month(
        #[case] purchase: NaiveDate,
        #[case] year: i32,
        #[case] month: u32,
    ) {
        assert_eq!(
            invoice_period(purchase, 25, 5),
            YearMonth::new(year, month).unwrap()
        );
    }

    #[test]
    fn invoice_dates_match_the_period() {
        let period = YearMonth::new(2024, 4).unwrap();
        assert_eq!(
            invoice_dates(period, 25, 5),
            (date(2024, 3, 25), date(2024, 4, 5))
        );
        assert_eq!(
            invoice_dates(period, 3, 10),
            (date(2024, 4, 3), date(2024, 4, 10))
        );
        let march = YearMonth::new(2024, 3).unwrap();
        assert_eq!(
            invoice_dates(march, 31, 30),
            (date(2024, 2, 29), date(2024, 3, 30))
        );
    }
}
