//! Engine configuration, loaded from a TOML file.
//!
//! ```toml
//! default_system = "sac"
//! revolving_interest_rate = "12.5"
//! overdue_grace_days = 3
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amortization::AmortizationSystem;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// System used by financings that do not choose one.
    pub default_system: AmortizationSystem,
    /// Monthly interest (percent) charged on an invoice remainder carried to the next invoice.
    pub revolving_interest_rate: Decimal,
    /// Days after the due date before an open item is flagged overdue.
    pub overdue_grace_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_system: AmortizationSystem::Price,
            revolving_interest_rate: Decimal::ZERO,
            overdue_grace_days: 0,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FinanceError;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_file_uses_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn reads_every_field() {
        let config = EngineConfig::from_toml_str(
            r#"
            default_system = "sac"
            revolving_interest_rate = "12.5"
            overdue_grace_days = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.default_system, AmortizationSystem::Sac);
        assert_eq!(config.revolving_interest_rate, dec!(12.5));
        assert_eq!(config.overdue_grace_days, 3);
    }

    #[test]
    fn rejects_unknown_system() {
        let result = EngineConfig::from_toml_str(r#"default_system = "german""#);
        assert!(matches!(result, Err(FinanceError::Config(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = EngineConfig::load("/definitely/not/here/equilibrium.toml");
        assert!(matches!(result, Err(FinanceError::Io(_))));
    }
}
