//! Investment positions priced against external quotes.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{FinanceError, Result};
use crate::ledger::{Id, Ledger};
use crate::rates::round_money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentKind {
    Stock,
    RealEstateFund,
    FixedIncome,
    Crypto,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub date: NaiveDate,
    pub side: Side,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub fees: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: Id,
    pub ticker: String,
    pub name: String,
    pub kind: InvestmentKind,
    pub operations: Vec<Operation>,
}

/// Holding derived from the operations, valued at average cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: Decimal,
    pub average_price: Decimal,
    /// Cost basis of the quantity still held.
    pub invested: Decimal,
    pub realized_profit: Decimal,
}

impl Investment {
    pub fn position(&self) -> Position {
        let mut position = Position::default();
        for operation in &self.operations {
            match operation.side {
                Side::Buy => {
                    position.invested += operation.quantity * operation.unit_price + operation.fees;
                    position.quantity += operation.quantity;
                }
                Side::Sell => {
                    let cost = operation.quantity * position.average_price;
                    position.realized_profit +=
                        operation.quantity * operation.unit_price - operation.fees - cost;
                    position.invested -= cost;
                    position.quantity -= operation.quantity;
                }
            }
            position.average_price = if position.quantity.is_zero() {
                Decimal::ZERO
            } else {
                position.invested / position.quantity
            };
        }
        if position.quantity.is_zero() {
            position.invested = Decimal::ZERO;
        }
        position
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub price: Decimal,
    pub as_of: NaiveDate,
}

/// Source of market prices (a broker API, a scraper, a fixture).
pub trait QuoteProvider {
    fn latest(&self, ticker: &str) -> Option<Quote>;
}

/// Quotes held in memory, keyed by ticker.
#[derive(Debug, Clone, Default)]
pub struct StaticQuotes {
    quotes: HashMap<String, Quote>,
}

impl StaticQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, quote: Quote) {
        self.quotes.insert(quote.ticker.to_ascii_uppercase(), quote);
    }
}

impl QuoteProvider for StaticQuotes {
    fn latest(&self, ticker: &str) -> Option<Quote> {
        self.quotes.get(&ticker.to_ascii_uppercase()).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValuation {
    pub investment_id: Id,
    pub ticker: String,
    pub position: Position,
    pub price: Decimal,
    /// False when no quote was available and the average price was used instead.
    pub quoted: bool,
    pub market_value: Decimal,
    pub unrealized_profit: Decimal,
    pub unrealized_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub positions: Vec<PositionValuation>,
    pub total_invested: Decimal,
    pub total_market_value: Decimal,
    pub total_unrealized_profit: Decimal,
    pub total_realized_profit: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewInvestment {
    pub ticker: String,
    pub name: String,
    pub kind: InvestmentKind,
}

pub struct InvestmentService;

impl InvestmentService {
    pub fn register(ledger: &mut Ledger, new: NewInvestment) -> Result<Id> {
        let ticker = new.ticker.trim().to_ascii_uppercase();
        if ticker.is_empty() {
            return Err(FinanceError::Invalid("an investment needs a ticker".to_string()));
        }
        if ledger.investments().any(|investment| investment.ticker == ticker) {
            return Err(FinanceError::Conflict(format!("{ticker} is already registered")));
        }

        let id = ledger.next_id();
        tracing::info!(id, %ticker, "registered investment");
        ledger.investments.insert(
            id,
            Investment {
                id,
                ticker,
                name: new.name,
                kind: new.kind,
                operations: Vec::new(),
            },
        );
        Ok(id)
    }

    pub fn buy(
        ledger: &mut Ledger,
        id: Id,
        date: NaiveDate,
        quantity: Decimal,
        unit_price: Decimal,
        fees: Decimal,
    ) -> Result<Position> {
        Self::record(ledger, id, Operation { date, side: Side::Buy, quantity, unit_price, fees })
    }

    pub fn sell(
        ledger: &mut Ledger,
        id: Id,
        date: NaiveDate,
        quantity: Decimal,
        unit_price: Decimal,
        fees: Decimal,
    ) -> Result<Position> {
        Self::record(ledger, id, Operation { date, side: Side::Sell, quantity, unit_price, fees })
    }

    fn record(ledger: &mut Ledger, id: Id, operation: Operation) -> Result<Position> {
        if operation.quantity <= Decimal::ZERO || operation.unit_price < Decimal::ZERO {
            return Err(FinanceError::Invalid(format!(
                "quantity must be positive and price non-negative (got {} at {})",
                operation.quantity, operation.unit_price
            )));
        }
        if operation.fees < Decimal::ZERO {
            return Err(FinanceError::Invalid("fees cannot be negative".to_string()));
        }

        let investment = ledger.investment_mut(id)?;
        if operation.side == Side::Sell {
            let held = investment.position().quantity;
            if operation.quantity > held {
                return Err(FinanceError::InsufficientQuantity {
                    ticker: investment.ticker.clone(),
                    held,
                    requested: operation.quantity,
                });
            }
        }

        tracing::info!(
            id,
            ticker = %investment.ticker,
            side = ?operation.side,
            quantity = %operation.quantity,
            price = %operation.unit_price,
            "recorded investment operation"
        );
        investment.operations.push(operation);
        Ok(investment.position())
    }

    /// Values every open position with the latest quotes from `provider`.
    pub fn valuation(ledger: &Ledger, provider: &impl QuoteProvider) -> PortfolioValuation {
        let mut positions = Vec::new();
        let mut total_realized_profit = Decimal::ZERO;

        for investment in ledger.investments() {
            let position = investment.position();
            total_realized_profit += position.realized_profit;
            if position.quantity.is_zero() {
                continue;
            }

            let quote = provider.latest(&investment.ticker);
            if quote.is_none() {
                tracing::warn!(ticker = %investment.ticker, "no quote available, using average price");
            }
            let (price, quoted) = match quote {
                Some(quote) => (quote.price, true),
                None => (position.average_price, false),
            };

            let market_value = round_money(position.quantity * price);
            let invested = round_money(position.invested);
            let unrealized_profit = market_value - invested;
            let unrealized_percent = if invested.is_zero() {
                Decimal::ZERO
            } else {
                (unrealized_profit / invested * dec!(100)).round_dp(2)
            };

            positions.push(PositionValuation {
                investment_id: investment.id,
                ticker: investment.ticker.clone(),
                position,
                price,
                quoted,
                market_value,
                unrealized_profit,
                unrealized_percent,
            });
        }

        PortfolioValuation {
            total_invested: positions.iter().map(|p| round_money(p.position.invested)).sum(),
            total_market_value: positions.iter().map(|p| p.market_value).sum(),
            total_unrealized_profit: positions.iter().map(|p| p.unrealized_profit).sum(),
            total_realized_profit: round_money(total_realized_profit),
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn ledger_with(ticker: &str) -> (Ledger, Id) {
        let mut ledger = Ledger::default();
        let id = InvestmentService::register(
            &mut ledger,
            NewInvestment {
                ticker: ticker.to_string(),
                name: "Test asset".to_string(),
                kind: InvestmentKind::Stock,
            },
        )
        .unwrap();
        (ledger, id)
    }

    #[test]
    fn average_price_includes_fees() {
        let (mut ledger, id) = ledger_with("petr4");
        InvestmentService::buy(&mut ledger, id, date(1, 2), dec!(100), dec!(30), dec!(10)).unwrap();
        let position =
            InvestmentService::buy(&mut ledger, id, date(2, 2), dec!(100), dec!(40), dec!(10)).unwrap();

        assert_eq!(position.quantity, dec!(200));
        assert_eq!(position.invested, dec!(7020));
        assert_eq!(position.average_price, dec!(35.1));
        assert_eq!(ledger.investment(id).unwrap().ticker, "PETR4");
    }

    #[test]
    fn selling_realizes_profit_at_average_cost() {
        let (mut ledger, id) = ledger_with("VALE3");
        InvestmentService::buy(&mut ledger, id, date(1, 2), dec!(10), dec!(50), dec!(0)).unwrap();
        let position =
            InvestmentService::sell(&mut ledger, id, date(3, 2), dec!(4), dec!(60), dec!(2)).unwrap();

        assert_eq!(position.quantity, dec!(6));
        assert_eq!(position.realized_profit, dec!(38));
        assert_eq!(position.average_price, dec!(50));
    }

    #[test]
    fn cannot_sell_more_than_held() {
        let (mut ledger, id) = ledger_with("ITSA4");
        InvestmentService::buy(&mut ledger, id, date(1, 2), dec!(5), dec!(10), dec!(0)).unwrap();

        let result = InvestmentService::sell(&mut ledger, id, date(1, 3), dec!(6), dec!(10), dec!(0));
        assert!(matches!(result, Err(FinanceError::InsufficientQuantity { .. })));
        assert_eq!(ledger.investment(id).unwrap().operations.len(), 1);
    }

    #[test]
    fn duplicate_tickers_are_rejected() {
        let (mut ledger, _) = ledger_with("BOVA11");
        let result = InvestmentService::register(
            &mut ledger,
            NewInvestment {
                ticker: " bova11 ".to_string(),
                name: "Again".to_string(),
                kind: InvestmentKind::Other,
            },
        );
        assert!(matches!(result, Err(FinanceError::Conflict(_))));
    }

    #[test]
    fn valuation_uses_quotes_and_falls_back_to_average_price() {
        let (mut ledger, quoted) = ledger_with("HGLG11");
        InvestmentService::buy(&mut ledger, quoted, date(1, 2), dec!(10), dec!(100), dec!(0)).unwrap();
        let unquoted = InvestmentService::register(
            &mut ledger,
            NewInvestment {
                ticker: "CDB-XP".to_string(),
                name: "CDB".to_string(),
                kind: InvestmentKind::FixedIncome,
            },
        )
        .unwrap();
        InvestmentService::buy(&mut ledger, unquoted, date(1, 2), dec!(1), dec!(1000), dec!(0)).unwrap();

        let mut quotes = StaticQuotes::new();
        quotes.insert(Quote {
            ticker: "hglg11".to_string(),
            price: dec!(110),
            as_of: date(6, 28),
        });

        let valuation = InvestmentService::valuation(&ledger, &quotes);
        assert_eq!(valuation.positions.len(), 2);

        let hglg = &valuation.positions[0];
        assert!(hglg.quoted);
        assert_eq!(hglg.market_value, dec!(1100));
        assert_eq!(hglg.unrealized_profit, dec!(100));
        assert_eq!(hglg.unrealized_percent, dec!(10));

        let cdb = &valuation.positions[1];
        assert!(!cdb.quoted);
        assert_eq!(cdb.unrealized_profit, dec!(0));

        assert_eq!(valuation.total_invested, dec!(2000));
        assert_eq!(valuation.total_market_value, dec!(2100));
    }
}
