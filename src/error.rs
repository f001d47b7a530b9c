//! Errors returned by every ledger operation.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::access::Permission;
use crate::ledger::Id;
use crate::status::Status;

#[derive(Error, Debug)]
pub enum FinanceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Id },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("cannot {action} an item that is {from}")]
    InvalidTransition { from: Status, action: &'static str },

    #[error("credit limit exceeded: available {available}, requested {requested}")]
    CreditLimitExceeded {
        available: Decimal,
        requested: Decimal,
    },

    #[error("invoice {0} is already paid")]
    InvoicePaid(Id),

    #[error("amount {amount} exceeds outstanding balance {outstanding}")]
    ExceedsBalance { amount: Decimal, outstanding: Decimal },

    #[error("insufficient quantity of {ticker}: held {held}, requested {requested}")]
    InsufficientQuantity {
        ticker: String,
        held: Decimal,
        requested: Decimal,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("role {role} lacks permission {permission}")]
    Forbidden { role: String, permission: Permission },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, FinanceError>;
