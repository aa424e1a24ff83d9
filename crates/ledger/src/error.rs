//! Errors the ledger can return.
//!
//! Validation and not-found conditions are distinct variants rather than a
//! shared exception type, so callers can branch without string matching.
//! `BalancePropagationFailed` is the one structured variant: it carries the
//! transaction id of a committed ledger row whose balance delta was not
//! applied, which operators need for repair.

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unknown filter key: {0}")]
    UnknownFilterKey(String),
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("no balance for {0}")]
    BalanceNotFound(String),
    #[error("no exchange rate stored for {0}")]
    RateNotFound(String),
    #[error("invalid exchange rate: {0}")]
    InvalidRate(String),
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("balance propagation failed for transaction {transaction_id}: {reason}")]
    BalancePropagationFailed { transaction_id: Uuid, reason: String },
    #[error("rate cache unavailable: {0}")]
    Cache(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::UnknownFilterKey(a), Self::UnknownFilterKey(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::BalanceNotFound(a), Self::BalanceNotFound(b)) => a == b,
            (Self::RateNotFound(a), Self::RateNotFound(b)) => a == b,
            (Self::InvalidRate(a), Self::InvalidRate(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (
                Self::BalancePropagationFailed {
                    transaction_id: a,
                    reason: ar,
                },
                Self::BalancePropagationFailed {
                    transaction_id: b,
                    reason: br,
                },
            ) => a == b && ar == br,
            (Self::Cache(a), Self::Cache(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
