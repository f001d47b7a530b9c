//! `equilibrium` is a personal finance engine built around Brazilian financing rules.
//!
//! It keeps a [`Ledger`] of incomes, payments, credit cards with their invoices,
//! financings and investments, and provides the services that keep all of them
//! consistent:
//!
//! - **Financings** follow the two main amortization systems in Brazil:
//!   - **SAC (Sistema de Amortização Constante)**: fixed amortization payments,
//!     leading to decreasing total payments over time.
//!   - **Price (Sistema Francês de Amortização)**: fixed total payments
//!     throughout the financing period.
//!
//!   Extra amortizations and monetary corrections re-project the open installments,
//!   and can be reverted.
//! - **Credit card invoices** collect purchase installments by closing date, carry
//!   unpaid remainders forward and credit back cancelled purchases.
//! - **Payments** and **incomes** follow a small status machine
//!   (pending, paid, overdue, cancelled) whose every transition can be undone.
//!
//! ## Usage
//!
//! Compare both amortization systems for the same loan:
//!
//! ```rust
//! use chrono::NaiveDate;
//! use equilibrium::{calculate_debt_trajectory, DebtCalculationInput};
//! use rust_decimal_macros::dec;
//!
//! let input = DebtCalculationInput {
//!     total_amount: dec!(360_000),
//!     interest_per_year: dec!(10.5),
//!     total_months: 420,
//!     first_due_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
//!     monthly_correction: dec!(0),
//! };
//!
//! match calculate_debt_trajectory(input) {
//!     Ok(result) => {
//!         println!("SAC First Payment: {:.2}", result.sac_table.first_payment);
//!         println!("SAC Last Payment:  {:.2}", result.sac_table.last_payment);
//!         println!("Price Payment:     {:.2}", result.price_table.first_payment);
//!         assert!(result.sac_table.first_payment > result.price_table.first_payment);
//!     }
//!     Err(e) => eprintln!("Error calculating debt trajectory: {}", e),
//! }
//! ```
//!
//! Or keep a financing in a ledger and pay part of it off early:
//!
//! ```rust
//! use chrono::NaiveDate;
//! use equilibrium::{
//!     AmortizationSystem, ExtraAmortizationStrategy, FinancingService, InterestRate, Ledger,
//!     NewFinancing,
//! };
//! use rust_decimal_macros::dec;
//!
//! let mut ledger = Ledger::default();
//! let id = FinancingService::create(
//!     &mut ledger,
//!     NewFinancing {
//!         description: "Apartment".to_string(),
//!         system: Some(AmortizationSystem::Sac),
//!         principal: dec!(120_000),
//!         rate: InterestRate::AnnualPercent(dec!(9)),
//!         monthly_correction_percent: dec!(0),
//!         months: 120,
//!         first_due_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
//!     },
//! )?;
//!
//! FinancingService::amortize_extra(
//!     &mut ledger,
//!     id,
//!     dec!(20_000),
//!     NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
//!     ExtraAmortizationStrategy::ReduceTerm,
//! )?;
//!
//! let summary = FinancingService::summary(&ledger, id)?;
//! assert_eq!(summary.outstanding_balance, dec!(100_000));
//! assert_eq!(summary.open_installments, 100);
//! # Ok::<(), equilibrium::FinanceError>(())
//! ```

pub mod access;
pub mod amortization;
pub mod calendar;
pub mod config;
pub mod credit_card;
pub mod error;
pub mod financing;
pub mod income;
pub mod investment;
pub mod ledger;
pub mod payment;
pub mod rates;
pub mod status;
pub mod summary;

pub use access::{Permission, Role};
pub use amortization::{
    AmortizationSystem, DebtCalculationInput, DebtTrajectoryResult, ScheduleRow, ScheduleSummary,
    build_schedule, calculate_debt_trajectory,
};
pub use calendar::YearMonth;
pub use config::EngineConfig;
pub use credit_card::{CardPurchase, CreditCard, CreditCardInvoiceService, Invoice, NewCreditCard};
pub use error::{FinanceError, Result};
pub use financing::{
    ExtraAmortizationStrategy, Financing, FinancingService, FinancingSummary, NewFinancing,
};
pub use income::{Income, IncomeService, NewIncome};
pub use investment::{InvestmentService, NewInvestment, QuoteProvider, StaticQuotes};
pub use ledger::{Id, Ledger};
pub use payment::{NewPayment, Payment, PaymentMethod, PaymentService};
pub use rates::{InterestRate, normalize_annual_interest_rate};
pub use status::Status;
