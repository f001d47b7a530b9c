//! Status shared by everything that falls due, and its guarded transitions.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{FinanceError, Result};

/// Lifecycle of anything that falls due: installments, invoices, incomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Paid,
    Cancelled,
    Overdue,
}

impl Status {
    /// Pending or overdue, i.e. still expected to be settled.
    pub fn is_open(self) -> bool {
        matches!(self, Status::Pending | Status::Overdue)
    }

    pub fn pay(self) -> Result<Self> {
        match self {
            Status::Pending | Status::Overdue => Ok(Status::Paid),
            from => Err(FinanceError::InvalidTransition { from, action: "pay" }),
        }
    }

    pub fn cancel(self) -> Result<Self> {
        match self {
            Status::Pending | Status::Overdue => Ok(Status::Cancelled),
            from => Err(FinanceError::InvalidTransition {
                from,
                action: "cancel",
            }),
        }
    }

    /// Undoes a payment, landing on the status the item would have had if it had never been paid.
    pub fn revert(self, due_date: NaiveDate, today: NaiveDate, grace_days: u32) -> Result<Self> {
        match self {
            Status::Paid => Ok(open_status(due_date, today, grace_days)),
            from => Err(FinanceError::InvalidTransition {
                from,
                action: "revert",
            }),
        }
    }

    /// Moves open items between pending and overdue; settled items are returned unchanged.
    pub fn refresh(self, due_date: NaiveDate, today: NaiveDate, grace_days: u32) -> Self {
        if self.is_open() {
            open_status(due_date, today, grace_days)
        } else {
            self
        }
    }

    /// Status of a whole made of several parts (a payment's installments, a financing's schedule).
    pub fn aggregate(parts: impl IntoIterator<Item = Status>) -> Status {
        let mut live = 0usize;
        let mut paid = 0usize;
        let mut overdue = false;

        for status in parts {
            match status {
                Status::Cancelled => {}
                Status::Paid => {
                    live += 1;
                    paid += 1;
                }
                Status::Overdue => {
                    live += 1;
                    overdue = true;
                }
                Status::Pending => live += 1,
            }
        }

        if live == 0 {
            Status::Cancelled
        } else if paid == live {
            Status::Paid
        } else if overdue {
            Status::Overdue
        } else {
            Status::Pending
        }
    }
}

fn open_status(due_date: NaiveDate, today: NaiveDate, grace_days: u32) -> Status {
    let deadline = due_date
        .checked_add_days(Days::new(grace_days.into()))
        .unwrap_or(NaiveDate::MAX);
    if deadline < today {
        Status::Overdue
    } else {
        Status::Pending
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Pending => "pending",
            Status::Paid => "paid",
            Status::Cancelled => "cancelled",
            Status::Overdue => "overdue",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[rstest]
    #[case(Status::Pending, true)]
    #[case(Status::Overdue, true)]
    #[case(Status::Paid, false)]
    #[case(Status::Cancelled, false)]
    fn only_open_items_can_be_paid(#[case] from: Status, #[case] allowed: bool) {
        assert_eq!(from.pay().is_ok(), allowed);
        assert_eq!(from.cancel().is_ok(), allowed);
    }

    #[test]
    fn revert_lands_on_pending_or_overdue() {
        assert_eq!(Status::Paid.revert(date(10), date(9), 0).unwrap(), Status::Pending);
        assert_eq!(Status::Paid.revert(date(10), date(10), 0).unwrap(), Status::Pending);
        assert_eq!(Status::Paid.revert(date(10), date(11), 0).unwrap(), Status::Overdue);
        assert!(Status::Pending.revert(date(10), date(11), 0).is_err());
    }

    #[test]
    fn grace_days_delay_overdue() {
        assert_eq!(Status::Pending.refresh(date(10), date(12), 2), Status::Pending);
        assert_eq!(Status::Pending.refresh(date(10), date(13), 2), Status::Overdue);
        assert_eq!(Status::Overdue.refresh(date(10), date(9), 0), Status::Pending);
        assert_eq!(Status::Paid.refresh(date(10), date(20), 0), Status::Paid);
    }

    #[rstest]
    #[case(vec![], Status::Cancelled)]
    #[case(vec![Status::Cancelled, Status::Cancelled], Status::Cancelled)]
    #[case(vec![Status::Paid, Status::Cancelled], Status::Paid)]
    #[case(vec![Status::Paid, Status::Pending], Status::Pending)]
    #[case(vec![Status::Paid, Status::Overdue, Status::Pending], Status::Overdue)]
    fn aggregate_status(#[case] parts: Vec<Status>, #[case] expected: Status) {
        assert_eq!(Status::aggregate(parts), expected);
    }

    #[test]
    fn transition_error_names_the_state() {
        let error = Status::Cancelled.pay().unwrap_err();
        assert_eq!(error.to_string(), "cannot pay an item that is cancelled");
    }
}
