use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// ISO-like currency code used by balances, transactions and rates.
///
/// The set is closed on purpose: the business operates in UAH and USD with
/// EUR as the fixed reporting currency for cross-currency aggregation.
///
/// ## Minor units
///
/// Monetary values are stored as an `i64` number of **minor units** (see
/// `MoneyCents`). All three currencies use 2 fraction digits, so
/// `10.50 UAH` ⇄ `1050`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Uah,
    Usd,
    #[default]
    Eur,
}

impl Currency {
    /// The fixed target currency for cross-currency aggregation.
    pub const REPORTING: Currency = Currency::Eur;

    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Uah => "UAH",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }

    /// Returns `true` for the reporting currency.
    #[must_use]
    pub const fn is_reporting(self) -> bool {
        matches!(self, Currency::REPORTING)
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UAH" => Ok(Currency::Uah),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            other => Err(LedgerError::Validation(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}
