//! Core ledger engine: transaction log, per-owner per-currency balance
//! aggregates, and the exchange-rate store with its read cache.
//!
//! Balances are derived state. Every write lands in the transaction log
//! first; the matching balance delta follows through the posting journal,
//! which records exactly what has been applied so that propagation can be
//! retried and reconciliation can repair drift.

pub use balances::Balance;
pub use commands::{CorrectAmountCmd, DepositCmd, PurchaseCmd, SaleCmd, WithdrawCmd};
pub use currency::Currency;
pub use error::LedgerError;
pub use filter::{SortDir, SortField, SortSpec, TransactionFilter};
pub use money::{MoneyCents, RateMicros};
pub use ops::{
    KindTotal, Ledger, LedgerBuilder, OwnerTotal, ReportTotals, TransactionPage,
    TransactionWithClient,
};
pub use postings::BalancePosting;
pub use rates::ExchangeRate;
pub use transactions::{Transaction, TransactionKind};

mod balances;
mod clients;
mod commands;
mod currency;
mod error;
mod filter;
mod money;
mod ops;
mod postings;
mod rates;
mod transactions;
pub mod users;

type ResultLedger<T> = Result<T, LedgerError>;
