use std::collections::HashMap;
use std::sync::RwLock;

use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait};

use crate::{Currency, LedgerError, RateMicros, ResultLedger, users};

mod balances;
mod rates;
mod reports;
mod transactions;

pub use reports::{KindTotal, OwnerTotal, ReportTotals};
pub use transactions::{TransactionPage, TransactionWithClient};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: crate::ResultLedger<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The ledger engine: transaction log, balance aggregates and exchange-rate
/// store behind one handle.
///
/// Holds no request state; the only shared mutable state is the
/// exchange-rate cache, which writers evict synchronously.
#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    rate_cache: RwLock<RateCache>,
}

/// Rate cache with a generation counter.
///
/// Every confirmed rate write bumps the generation while evicting; a miss
/// records the generation it saw, and the later populate is dropped when the
/// generation moved. Without this, a reader that fetched the old row before
/// the commit could re-insert it after the eviction and pin the stale rate.
#[derive(Debug, Default)]
struct RateCache {
    generation: u64,
    rates: HashMap<Currency, RateMicros>,
}

impl Ledger {
    /// Return a builder for `Ledger`.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    pub(crate) async fn require_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        username: &str,
    ) -> ResultLedger<users::Model> {
        users::Entity::find_by_id(username.to_string())
            .one(conn)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {username}")))
    }
}

/// The builder for `Ledger`
#[derive(Default)]
pub struct LedgerBuilder {
    database: DatabaseConnection,
}

impl LedgerBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    /// Construct `Ledger`
    pub fn build(self) -> Ledger {
        Ledger {
            database: self.database,
            rate_cache: RwLock::new(RateCache::default()),
        }
    }
}
