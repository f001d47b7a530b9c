use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use equilibrium::amortization::ScheduleSummary;
use equilibrium::rates::annualize_monthly_rate;
use equilibrium::{
    AmortizationSystem, DebtCalculationInput, EngineConfig, InterestRate, build_schedule,
    calculate_debt_trajectory,
};

/// Simulates PRICE and SAC financing schedules.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Engine configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the installment schedule of one amortization system.
    Schedule {
        #[command(flatten)]
        loan: LoanArgs,

        /// Defaults to the system named in the configuration file.
        #[arg(long, value_enum)]
        system: Option<SystemArg>,

        #[arg(long)]
        json: bool,
    },
    /// Compare PRICE and SAC totals for the same loan.
    Compare {
        #[command(flatten)]
        loan: LoanArgs,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct LoanArgs {
    /// Amount financed.
    #[arg(long)]
    principal: Decimal,

    /// Interest rate in percent.
    #[arg(long)]
    rate: Decimal,

    #[arg(long, value_enum, default_value_t = RateBasis::Annual)]
    basis: RateBasis,

    #[arg(long)]
    months: u32,

    /// Due date of the first installment (YYYY-MM-DD).
    #[arg(long)]
    first_due: NaiveDate,

    /// Expected monthly monetary correction in percent.
    #[arg(long, default_value_t = Decimal::ZERO)]
    correction: Decimal,
}

impl LoanArgs {
    fn interest_rate(&self) -> InterestRate {
        match self.basis {
            RateBasis::Annual => InterestRate::AnnualPercent(self.rate),
            RateBasis::Monthly => InterestRate::MonthlyPercent(self.rate),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RateBasis {
    Annual,
    Monthly,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SystemArg {
    Price,
    Sac,
}

impl From<SystemArg> for AmortizationSystem {
    fn from(value: SystemArg) -> Self {
        match value {
            SystemArg::Price => AmortizationSystem::Price,
            SystemArg::Sac => AmortizationSystem::Sac,
        }
    }
}

fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("could not load configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Schedule { loan, system, json } => {
            let system = system.map(AmortizationSystem::from).unwrap_or(config.default_system);
            let rows = build_schedule(
                system,
                loan.principal,
                loan.interest_rate(),
                loan.correction,
                loan.months,
                loan.first_due,
            )
            .context("could not build the schedule")?;
            let summary = ScheduleSummary::from_rows(system, rows);

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_schedule(&summary);
            }
        }
        Command::Compare { loan, json } => {
            let interest_per_year = match loan.interest_rate() {
                InterestRate::AnnualPercent(percent) => percent,
                monthly @ InterestRate::MonthlyPercent(_) => annualize_monthly_rate(monthly.monthly_rate()),
            };
            let result = calculate_debt_trajectory(DebtCalculationInput {
                total_amount: loan.principal,
                interest_per_year,
                total_months: loan.months,
                first_due_date: loan.first_due,
                monthly_correction: loan.correction,
            })
            .context("could not compare amortization systems")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Financed: {:.2}", result.initial_total_amount);
                for table in [&result.price_table, &result.sac_table] {
                    print_totals(table);
                }
            }
        }
    }

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_schedule(summary: &ScheduleSummary) {
    println!(
        "{:>4}  {:<10}  {:>12}  {:>12}  {:>12}  {:>12}  {:>14}",
        "#", "due", "correction", "interest", "amortization", "payment", "balance"
    );
    for row in &summary.amortization_curve {
        println!(
            "{:>4}  {:<10}  {:>12.2}  {:>12.2}  {:>12.2}  {:>12.2}  {:>14.2}",
            row.number, row.due_date, row.correction, row.interest, row.amortization, row.payment, row.balance
        );
    }
    print_totals(summary);
}

fn print_totals(summary: &ScheduleSummary) {
    println!(
        "{:<5}  first {:.2}  last {:.2}  interest {:.2}  correction {:.2}  total paid {:.2}",
        summary.system.to_string().to_uppercase(),
        summary.first_payment,
        summary.last_payment,
        summary.total_interest,
        summary.total_correction,
        summary.total_paid
    );
}
