//! Financings and the recalculation of their remaining schedule.
//!
//! A financing starts from a full PRICE or SAC schedule. From then on, the open
//! installments (always a contiguous tail of the schedule) can be re-projected:
//!
//! - an extra amortization lowers the balance and either shortens the term or lowers
//!   the installments;
//! - a realized monetary correction raises (or lowers) the balance and spreads the
//!   difference over the same number of installments.
//!
//! Each adjustment keeps a snapshot of the installments it replaced, so the most
//! recent one can be reverted as long as nothing it generated has been paid.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::amortization::{
    AmortizationSystem, Projection, ScheduleRow, build_schedule, project, term_for_reduced_balance,
};
use crate::error::{FinanceError, Result};
use crate::ledger::{Id, Ledger};
use crate::rates::{InterestRate, round_money};
use crate::status::Status;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingInstallment {
    pub number: u32,
    pub due_date: NaiveDate,
    pub correction: Decimal,
    pub interest: Decimal,
    pub amortization: Decimal,
    pub amount: Decimal,
    /// Balance left once this installment is paid.
    pub balance: Decimal,
    pub status: Status,
    pub paid_on: Option<NaiveDate>,
    /// What was actually paid, late charges included.
    pub paid_amount: Option<Decimal>,
}

impl FinancingInstallment {
    fn from_row(row: ScheduleRow, status: Status) -> Self {
        Self {
            number: row.number,
            due_date: row.due_date,
            correction: row.correction,
            interest: row.interest,
            amortization: row.amortization,
            amount: row.payment,
            balance: row.balance,
            status,
            paid_on: None,
            paid_amount: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraAmortizationStrategy {
    /// Keep the installment value, pay off sooner.
    ReduceTerm,
    /// Keep the term, pay less each month.
    ReduceInstallment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FinancingEventKind {
    ExtraAmortization {
        amount: Decimal,
        strategy: ExtraAmortizationStrategy,
    },
    MonetaryCorrection {
        percent: Decimal,
        amount: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingEvent {
    /// Sequence number within the financing.
    pub id: u32,
    pub date: NaiveDate,
    pub kind: FinancingEventKind,
    /// Open installments as they were before the adjustment.
    pub replaced: Vec<FinancingInstallment>,
    pub reverted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Financing {
    pub id: Id,
    pub description: String,
    pub system: AmortizationSystem,
    pub principal: Decimal,
    pub rate: InterestRate,
    /// Effective monthly interest rate as a decimal.
    pub monthly_rate: Decimal,
    /// Expected monthly monetary correction as a decimal.
    pub correction_rate: Decimal,
    pub first_due_date: NaiveDate,
    pub status: Status,
    pub installments: Vec<FinancingInstallment>,
    pub events: Vec<FinancingEvent>,
}

impl Financing {
    /// Debt still to be amortized by the open installments.
    pub fn outstanding_balance(&self) -> Decimal {
        self.open_installments()
            .map(|installment| installment.amortization - installment.correction)
            .sum()
    }

    pub fn open_installments(&self) -> impl Iterator<Item = &FinancingInstallment> {
        self.installments
            .iter()
            .filter(|installment| installment.status.is_open())
    }

    pub fn next_due(&self) -> Option<&FinancingInstallment> {
        self.open_installments().next()
    }

    pub(crate) fn refresh_status(&mut self) {
        if self.status == Status::Cancelled {
            return;
        }
        self.status = if self.open_installments().next().is_none() {
            Status::Paid
        } else {
            Status::aggregate(self.installments.iter().map(|installment| installment.status))
        };
    }

    fn ensure_active(&self, action: &'static str) -> Result<()> {
        if self.status.is_open() {
            Ok(())
        } else {
            Err(FinanceError::InvalidTransition {
                from: self.status,
                action,
            })
        }
    }

    fn installment_mut(&mut self, number: u32) -> Result<&mut FinancingInstallment> {
        self.installments
            .iter_mut()
            .find(|installment| installment.number == number)
            .ok_or(FinanceError::NotFound {
                entity: "installment",
                id: number.into(),
            })
    }

    /// Index of the first open installment, provided every installment after it is open too.
    fn open_tail_start(&self) -> Result<usize> {
        let start = self
            .installments
            .iter()
            .position(|installment| installment.status.is_open())
            .ok_or_else(|| {
                FinanceError::Conflict(format!("financing {} has no open installments", self.id))
            })?;

        if self.installments[start..]
            .iter()
            .any(|installment| !installment.status.is_open())
        {
            return Err(FinanceError::Conflict(format!(
                "financing {} has installments paid out of order; settle installment {} first",
                self.id, self.installments[start].number
            )));
        }
        Ok(start)
    }

    /// Replaces the open tail with a projection of `balance` over `months` installments.
    fn reproject(
        &mut self,
        start: usize,
        balance: Decimal,
        strategy: ExtraAmortizationStrategy,
        on: NaiveDate,
        grace_days: u32,
    ) -> Result<Vec<FinancingInstallment>> {
        let replaced = self.installments.split_off(start);
        let Some(first) = replaced.first() else {
            return Ok(replaced);
        };

        if balance > Decimal::ZERO {
            let open_months = replaced.len() as u32;
            let months = match strategy {
                ExtraAmortizationStrategy::ReduceInstallment => open_months,
                ExtraAmortizationStrategy::ReduceTerm => {
                    let reference = match self.system {
                        AmortizationSystem::Price => first.amount,
                        AmortizationSystem::Sac => first.amortization,
                    };
                    term_for_reduced_balance(self.system, balance, self.monthly_rate, reference, open_months)
                }
            };

            let rows = project(
                self.system,
                &Projection {
                    balance,
                    monthly_rate: self.monthly_rate,
                    correction_rate: self.correction_rate,
                    months,
                    first_number: first.number,
                    schedule_start: self.first_due_date,
                },
            )?;
            tracing::debug!(
                financing_id = self.id,
                %balance,
                from = open_months,
                to = months,
                "re-projected open installments"
            );
            self.installments.extend(rows.into_iter().map(|row| {
                let status = Status::Pending.refresh(row.due_date, on, grace_days);
                FinancingInstallment::from_row(row, status)
            }));
        }

        Ok(replaced)
    }

    fn record_event(&mut self, date: NaiveDate, kind: FinancingEventKind, replaced: Vec<FinancingInstallment>) -> u32 {
        let id = self.events.len() as u32 + 1;
        self.events.push(FinancingEvent {
            id,
            date,
            kind,
            replaced,
            reverted: false,
        });
        self.refresh_status();
        id
    }
}

#[derive(Debug, Clone)]
pub struct NewFinancing {
    pub description: String,
    /// Falls back to the configured default when absent.
    pub system: Option<AmortizationSystem>,
    pub principal: Decimal,
    pub rate: InterestRate,
    /// Expected monthly monetary correction, in percent.
    pub monthly_correction_percent: Decimal,
    pub months: u32,
    pub first_due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingSummary {
    pub principal: Decimal,
    pub paid_amortization: Decimal,
    pub paid_interest: Decimal,
    pub paid_correction: Decimal,
    pub paid_total: Decimal,
    /// Extra amortizations still in effect.
    pub extra_amortized: Decimal,
    /// Realized monetary corrections still in effect.
    pub realized_correction: Decimal,
    pub outstanding_balance: Decimal,
    pub paid_installments: usize,
    pub open_installments: usize,
    pub next_due: Option<(u32, NaiveDate, Decimal)>,
}

pub struct FinancingService;

impl FinancingService {
    pub fn create(ledger: &mut Ledger, new: NewFinancing) -> Result<Id> {
        let system = new.system.unwrap_or(ledger.config().default_system);
        let rows = build_schedule(
            system,
            new.principal,
            new.rate,
            new.monthly_correction_percent,
            new.months,
            new.first_due_date,
        )?;

        let id = ledger.next_id();
        ledger.financings.insert(
            id,
            Financing {
                id,
                description: new.description.clone(),
                system,
                principal: new.principal,
                rate: new.rate,
                monthly_rate: new.rate.monthly_rate(),
                correction_rate: new.monthly_correction_percent / dec!(100),
                first_due_date: new.first_due_date,
                status: Status::Pending,
                installments: rows
                    .into_iter()
                    .map(|row| FinancingInstallment::from_row(row, Status::Pending))
                    .collect(),
                events: Vec::new(),
            },
        );

        tracing::info!(
            id,
            description = %new.description,
            %system,
            principal = %new.principal,
            months = new.months,
            "created financing"
        );
        Ok(id)
    }

    /// Pays one installment; `amount` defaults to the installment value and may exceed it (late charges).
    pub fn pay_installment(
        ledger: &mut Ledger,
        id: Id,
        number: u32,
        paid_on: NaiveDate,
        amount: Option<Decimal>,
    ) -> Result<()> {
        ledger.transact(|ledger| {
            let financing = ledger.financing_mut(id)?;
            let installment = financing.installment_mut(number)?;
            let paid = amount.unwrap_or(installment.amount);
            if paid < installment.amount {
                return Err(FinanceError::Invalid(format!(
                    "installment {number} costs {}; partial payments go through extra amortization",
                    installment.amount
                )));
            }

            installment.status = installment.status.pay()?;
            installment.paid_on = Some(paid_on);
            installment.paid_amount = Some(paid);
            financing.refresh_status();

            tracing::info!(id, number, %paid_on, amount = %paid, "financing installment paid");
            Ok(())
        })
    }

    pub fn revert_installment(ledger: &mut Ledger, id: Id, number: u32, today: NaiveDate) -> Result<()> {
        let grace = ledger.config().overdue_grace_days;

        ledger.transact(|ledger| {
            let financing = ledger.financing_mut(id)?;
            if financing.status == Status::Cancelled {
                return Err(FinanceError::InvalidTransition {
                    from: Status::Cancelled,
                    action: "revert",
                });
            }

            let installment = financing.installment_mut(number)?;
            installment.status = installment.status.revert(installment.due_date, today, grace)?;
            installment.paid_on = None;
            installment.paid_amount = None;
            financing.refresh_status();

            tracing::info!(id, number, "financing installment reverted");
            Ok(())
        })
    }

    pub fn outstanding_balance(ledger: &Ledger, id: Id) -> Result<Decimal> {
        Ok(ledger.financing(id)?.outstanding_balance())
    }

    /// Applies an out-of-band payment to the outstanding balance and re-projects the open installments.
    ///
    /// Returns the id of the recorded adjustment.
    pub fn amortize_extra(
        ledger: &mut Ledger,
        id: Id,
        amount: Decimal,
        on: NaiveDate,
        strategy: ExtraAmortizationStrategy,
    ) -> Result<u32> {
        if amount <= Decimal::ZERO {
            return Err(FinanceError::Invalid(format!(
                "an extra amortization must be positive (got {amount})"
            )));
        }
        let grace = ledger.config().overdue_grace_days;

        ledger.transact(|ledger| {
            let financing = ledger.financing_mut(id)?;
            financing.ensure_active("amortize")?;
            let start = financing.open_tail_start()?;

            let outstanding = financing.outstanding_balance();
            if amount > outstanding {
                return Err(FinanceError::ExceedsBalance { amount, outstanding });
            }

            let replaced = financing.reproject(start, outstanding - amount, strategy, on, grace)?;
            let event = financing.record_event(
                on,
                FinancingEventKind::ExtraAmortization { amount, strategy },
                replaced,
            );

            tracing::info!(
                id,
                %amount,
                ?strategy,
                remaining = %financing.outstanding_balance(),
                open = financing.open_installments().count(),
                "extra amortization applied"
            );
            Ok(event)
        })
    }

    /// Applies a realized correction index (in percent) to the outstanding balance.
    ///
    /// Returns the id of the recorded adjustment.
    pub fn apply_monetary_correction(
        ledger: &mut Ledger,
        id: Id,
        percent: Decimal,
        on: NaiveDate,
    ) -> Result<u32> {
        let grace = ledger.config().overdue_grace_days;

        ledger.transact(|ledger| {
            let financing = ledger.financing_mut(id)?;
            financing.ensure_active("correct")?;
            let start = financing.open_tail_start()?;

            let outstanding = financing.outstanding_balance();
            let correction = round_money(outstanding * percent / dec!(100));
            let corrected = outstanding + correction;
            if corrected <= Decimal::ZERO {
                return Err(FinanceError::Invalid(format!(
                    "a correction of {percent}% would erase the balance"
                )));
            }

            let replaced = financing.reproject(
                start,
                corrected,
                ExtraAmortizationStrategy::ReduceInstallment,
                on,
                grace,
            )?;
            let event = financing.record_event(
                on,
                FinancingEventKind::MonetaryCorrection {
                    percent,
                    amount: correction,
                },
                replaced,
            );

            tracing::info!(id, %percent, %correction, balance = %corrected, "monetary correction applied");
            Ok(event)
        })
    }

    /// Reverts the most recent adjustment, restoring the installments it replaced.
    pub fn revert_event(ledger: &mut Ledger, id: Id, event_id: u32) -> Result<()> {
        ledger.transact(|ledger| {
            let financing = ledger.financing_mut(id)?;
            let Some(index) = financing.events.iter().rposition(|event| !event.reverted) else {
                return Err(FinanceError::NotFound {
                    entity: "financing event",
                    id: event_id.into(),
                });
            };
            if financing.events[index].id != event_id {
                tracing::warn!(id, event_id, "refusing to revert an older adjustment");
                return Err(FinanceError::Conflict(format!(
                    "only the most recent adjustment ({}) of financing {id} can be reverted",
                    financing.events[index].id
                )));
            }

            let replaced = financing.events[index].replaced.clone();
            let Some(first_number) = replaced.first().map(|installment| installment.number) else {
                return Err(FinanceError::Conflict(format!(
                    "adjustment {event_id} of financing {id} replaced nothing"
                )));
            };

            if financing
                .installments
                .iter()
                .any(|installment| installment.number >= first_number && !installment.status.is_open())
            {
                tracing::warn!(id, event_id, "refusing to revert: generated installments were settled");
                return Err(FinanceError::Conflict(format!(
                    "installments generated by adjustment {event_id} were already settled"
                )));
            }

            financing
                .installments
                .retain(|installment| installment.number < first_number);
            financing.installments.extend(replaced);
            financing.events[index].reverted = true;
            financing.refresh_status();

            tracing::info!(id, event_id, "financing adjustment reverted");
            Ok(())
        })
    }

    /// Cancels the open installments; paid ones stay in the history.
    pub fn cancel(ledger: &mut Ledger, id: Id) -> Result<()> {
        ledger.transact(|ledger| {
            let financing = ledger.financing_mut(id)?;
            financing.ensure_active("cancel")?;

            for installment in financing
                .installments
                .iter_mut()
                .filter(|installment| installment.status.is_open())
            {
                installment.status = installment.status.cancel()?;
            }
            financing.status = Status::Cancelled;

            tracing::info!(id, "financing cancelled");
            Ok(())
        })
    }

    pub fn summary(ledger: &Ledger, id: Id) -> Result<FinancingSummary> {
        let financing = ledger.financing(id)?;
        let paid: Vec<_> = financing
            .installments
            .iter()
            .filter(|installment| installment.status == Status::Paid)
            .collect();

        let live_events = financing.events.iter().filter(|event| !event.reverted);
        let (mut extra_amortized, mut realized_correction) = (Decimal::ZERO, Decimal::ZERO);
        for event in live_events {
            match event.kind {
                FinancingEventKind::ExtraAmortization { amount, .. } => extra_amortized += amount,
                FinancingEventKind::MonetaryCorrection { amount, .. } => realized_correction += amount,
            }
        }

        Ok(FinancingSummary {
            principal: financing.principal,
            paid_amortization: paid.iter().map(|installment| installment.amortization).sum(),
            paid_interest: paid.iter().map(|installment| installment.interest).sum(),
            paid_correction: paid.iter().map(|installment| installment.correction).sum(),
            paid_total: paid
                .iter()
                .map(|installment| installment.paid_amount.unwrap_or(installment.amount))
                .sum(),
            extra_amortized,
            realized_correction,
            outstanding_balance: financing.outstanding_balance(),
            paid_installments: paid.len(),
            open_installments: financing.open_installments().count(),
            next_due: financing
                .next_due()
                .map(|installment| (installment.number, installment.due_date, installment.amount)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use rust_decimal_macros::dec;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn new_financing(system: Option<AmortizationSystem>) -> NewFinancing {
        NewFinancing {
            description: "Apartment".to_string(),
            system,
            principal: dec!(12000),
            rate: InterestRate::MonthlyPercent(dec!(1)),
            monthly_correction_percent: dec!(0),
            months: 12,
            first_due_date: date(1, 10),
        }
    }

    /// SAC financing of 12000 at 1% a month with the first two installments paid.
    fn sac_with_two_paid() -> (Ledger, Id) {
        let mut ledger = Ledger::default();
        let id = FinancingService::create(&mut ledger, new_financing(Some(AmortizationSystem::Sac))).unwrap();
        FinancingService::pay_installment(&mut ledger, id, 1, date(1, 10), None).unwrap();
        FinancingService::pay_installment(&mut ledger, id, 2, date(2, 10), None).unwrap();
        (ledger, id)
    }

    #[test]
    fn create_uses_configured_default_system() {
        let mut ledger = Ledger::new(EngineConfig {
            default_system: AmortizationSystem::Sac,
            ..EngineConfig::default()
        });
        let id = FinancingService::create(&mut ledger, new_financing(None)).unwrap();

        let financing = ledger.financing(id).unwrap();
        assert_eq!(financing.system, AmortizationSystem::Sac);
        assert_eq!(financing.installments.len(), 12);
        assert_eq!(financing.outstanding_balance(), dec!(12000));
        assert_eq!(financing.installments[0].amount, dec!(1120));
    }

    #[test]
    fn create_rejects_invalid_input() {
        let mut ledger = Ledger::default();
        let mut new = new_financing(None);
        new.months = 0;
        assert!(FinancingService::create(&mut ledger, new).is_err());
        assert_eq!(ledger.financings().count(), 0);
    }

    #[test]
    fn paying_reduces_the_outstanding_balance() {
        let (ledger, id) = sac_with_two_paid();
        assert_eq!(FinancingService::outstanding_balance(&ledger, id).unwrap(), dec!(10000));

        let summary = FinancingService::summary(&ledger, id).unwrap();
        assert_eq!(summary.paid_installments, 2);
        assert_eq!(summary.open_installments, 10);
        assert_eq!(summary.paid_amortization, dec!(2000));
        assert_eq!(summary.paid_interest, dec!(230));
        assert_eq!(summary.next_due, Some((3, date(3, 10), dec!(1100))));
    }

    #[test]
    fn partial_installment_payment_is_rejected() {
        let mut ledger = Ledger::default();
        let id = FinancingService::create(&mut ledger, new_financing(Some(AmortizationSystem::Sac))).unwrap();
        let result = FinancingService::pay_installment(&mut ledger, id, 1, date(1, 10), Some(dec!(100)));
        assert!(matches!(result, Err(FinanceError::Invalid(_))));
        assert_eq!(ledger.financing(id).unwrap().installments[0].status, Status::Pending);
    }

    #[test]
    fn late_charges_are_recorded() {
        let mut ledger = Ledger::default();
        let id = FinancingService::create(&mut ledger, new_financing(Some(AmortizationSystem::Sac))).unwrap();
        FinancingService::pay_installment(&mut ledger, id, 1, date(1, 15), Some(dec!(1150))).unwrap();

        let summary = FinancingService::summary(&ledger, id).unwrap();
        assert_eq!(summary.paid_total, dec!(1150));
    }

    #[test]
    fn revert_installment_reopens_it() {
        let (mut ledger, id) = sac_with_two_paid();
        FinancingService::revert_installment(&mut ledger, id, 2, date(2, 20)).unwrap();

        let financing = ledger.financing(id).unwrap();
        assert_eq!(financing.installments[1].status, Status::Overdue);
        assert_eq!(financing.status, Status::Overdue);
        assert_eq!(financing.outstanding_balance(), dec!(11000));
    }

    #[test]
    fn extra_amortization_reducing_installments() {
        let (mut ledger, id) = sac_with_two_paid();
        FinancingService::amortize_extra(
            &mut ledger,
            id,
            dec!(4000),
            date(2, 15),
            ExtraAmortizationStrategy::ReduceInstallment,
        )
        .unwrap();

        let financing = ledger.financing(id).unwrap();
        assert_eq!(financing.installments.len(), 12);
        assert_eq!(financing.outstanding_balance(), dec!(6000));
        let third = &financing.installments[2];
        assert_eq!(third.number, 3);
        assert_eq!(third.due_date, date(3, 10));
        assert_eq!(third.amortization, dec!(600));
        assert_eq!(third.amount, dec!(660));
        assert_eq!(financing.installments[11].balance, dec!(0));
    }

    #[test]
    fn extra_amortization_reducing_term() {
        let (mut ledger, id) = sac_with_two_paid();
        FinancingService::amortize_extra(
            &mut ledger,
            id,
            dec!(4000),
            date(2, 15),
            ExtraAmortizationStrategy::ReduceTerm,
        )
        .unwrap();

        let financing = ledger.financing(id).unwrap();
        assert_eq!(financing.installments.len(), 8);
        assert_eq!(financing.installments[2].amortization, dec!(1000));
        assert_eq!(financing.installments.last().unwrap().number, 8);
        assert_eq!(financing.outstanding_balance(), dec!(6000));
    }

    #[test]
    fn price_reduce_term_keeps_the_payment_ceiling() {
        let mut ledger = Ledger::default();
        let id = FinancingService::create(&mut ledger, new_financing(Some(AmortizationSystem::Price))).unwrap();
        let payment = ledger.financing(id).unwrap().installments[0].amount;

        FinancingService::amortize_extra(
            &mut ledger,
            id,
            dec!(5000),
            date(1, 1),
            ExtraAmortizationStrategy::ReduceTerm,
        )
        .unwrap();

        let financing = ledger.financing(id).unwrap();
        assert!(financing.installments.len() < 12);
        assert!(financing.installments.iter().all(|installment| installment.amount <= payment));
        assert_eq!(financing.outstanding_balance(), dec!(7000));
    }

    #[test]
    fn paying_the_whole_balance_settles_the_financing() {
        let (mut ledger, id) = sac_with_two_paid();
        FinancingService::amortize_extra(
            &mut ledger,
            id,
            dec!(10000),
            date(2, 15),
            ExtraAmortizationStrategy::ReduceTerm,
        )
        .unwrap();

        let financing = ledger.financing(id).unwrap();
        assert_eq!(financing.status, Status::Paid);
        assert_eq!(financing.installments.len(), 2);
        assert_eq!(financing.outstanding_balance(), dec!(0));

        let result = FinancingService::amortize_extra(
            &mut ledger,
            id,
            dec!(1),
            date(2, 16),
            ExtraAmortizationStrategy::ReduceTerm,
        );
        assert!(matches!(result, Err(FinanceError::InvalidTransition { from: Status::Paid, .. })));
    }

    #[test]
    fn amortizing_more_than_owed_is_rejected() {
        let (mut ledger, id) = sac_with_two_paid();
        let before = ledger.financing(id).unwrap().clone();

        let result = FinancingService::amortize_extra(
            &mut ledger,
            id,
            dec!(10000.01),
            date(2, 15),
            ExtraAmortizationStrategy::ReduceTerm,
        );
        assert!(matches!(result, Err(FinanceError::ExceedsBalance { .. })));
        assert_eq!(ledger.financing(id).unwrap(), &before);
    }

    #[test]
    fn out_of_order_payments_block_recalculation() {
        let mut ledger = Ledger::default();
        let id = FinancingService::create(&mut ledger, new_financing(Some(AmortizationSystem::Sac))).unwrap();
        FinancingService::pay_installment(&mut ledger, id, 3, date(1, 5), None).unwrap();

        let result = FinancingService::amortize_extra(
            &mut ledger,
            id,
            dec!(100),
            date(1, 6),
            ExtraAmortizationStrategy::ReduceTerm,
        );
        assert!(matches!(result, Err(FinanceError::Conflict(_))));
    }

    #[test]
    fn reverting_an_adjustment_restores_the_schedule() {
        let (mut ledger, id) = sac_with_two_paid();
        let before = ledger.financing(id).unwrap().installments.clone();

        let event = FinancingService::amortize_extra(
            &mut ledger,
            id,
            dec!(4000),
            date(2, 15),
            ExtraAmortizationStrategy::ReduceTerm,
        )
        .unwrap();
        FinancingService::revert_event(&mut ledger, id, event).unwrap();

        let financing = ledger.financing(id).unwrap();
        assert_eq!(financing.installments, before);
        assert!(financing.events[0].reverted);
        assert_eq!(FinancingService::summary(&ledger, id).unwrap().extra_amortized, dec!(0));
    }

    #[test]
    fn revert_is_refused_once_generated_installments_are_paid() {
        let (mut ledger, id) = sac_with_two_paid();
        let event = FinancingService::amortize_extra(
            &mut ledger,
            id,
            dec!(4000),
            date(2, 15),
            ExtraAmortizationStrategy::ReduceInstallment,
        )
        .unwrap();
        FinancingService::pay_installment(&mut ledger, id, 3, date(3, 10), None).unwrap();

        let result = FinancingService::revert_event(&mut ledger, id, event);
        assert!(matches!(result, Err(FinanceError::Conflict(_))));
    }

    #[test]
    fn only_the_latest_adjustment_can_be_reverted() {
        let (mut ledger, id) = sac_with_two_paid();
        let first = FinancingService::amortize_extra(
            &mut ledger,
            id,
            dec!(1000),
            date(2, 15),
            ExtraAmortizationStrategy::ReduceInstallment,
        )
        .unwrap();
        let second =
            FinancingService::apply_monetary_correction(&mut ledger, id, dec!(0.5), date(2, 20)).unwrap();

        assert!(matches!(
            FinancingService::revert_event(&mut ledger, id, first),
            Err(FinanceError::Conflict(_))
        ));
        FinancingService::revert_event(&mut ledger, id, second).unwrap();
        FinancingService::revert_event(&mut ledger, id, first).unwrap();
        assert_eq!(FinancingService::outstanding_balance(&ledger, id).unwrap(), dec!(10000));
    }

    #[test]
    fn monetary_correction_raises_the_balance() {
        let (mut ledger, id) = sac_with_two_paid();
        FinancingService::apply_monetary_correction(&mut ledger, id, dec!(1.5), date(2, 28)).unwrap();

        let financing = ledger.financing(id).unwrap();
        assert_eq!(financing.outstanding_balance(), dec!(10150));
        assert_eq!(financing.open_installments().count(), 10);
        assert_eq!(financing.installments[2].amortization, dec!(1015));

        let summary = FinancingService::summary(&ledger, id).unwrap();
        assert_eq!(summary.realized_correction, dec!(150));
    }

    #[test]
    fn cancel_keeps_paid_history() {
        let (mut ledger, id) = sac_with_two_paid();
        FinancingService::cancel(&mut ledger, id).unwrap();

        let financing = ledger.financing(id).unwrap();
        assert_eq!(financing.status, Status::Cancelled);
        assert_eq!(financing.installments[0].status, Status::Paid);
        assert_eq!(financing.installments[2].status, Status::Cancelled);
        assert_eq!(financing.outstanding_balance(), dec!(0));

        assert!(FinancingService::cancel(&mut ledger, id).is_err());
        assert!(FinancingService::revert_installment(&mut ledger, id, 1, date(3, 1)).is_err());
    }
}
