//! Balance aggregates: atomic deltas, reads, and the reconciliation repair
//! loop.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, DbErr, QueryFilter, Statement, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    Balance, BalancePosting, Currency, LedgerError, MoneyCents, ResultLedger, balances, postings,
    transactions,
};

use super::{Ledger, with_tx};

impl Ledger {
    /// Atomically adds `delta` to the (owner, currency) balance, creating the
    /// row at zero first when absent.
    ///
    /// The addition is a single SQL statement so concurrent deltas to the
    /// same row serialize in the store instead of losing updates to
    /// read-modify-write races.
    pub async fn apply_delta(
        &self,
        owner_id: &str,
        currency: Currency,
        delta: MoneyCents,
    ) -> ResultLedger<()> {
        apply_delta_on(&self.database, owner_id, currency, delta).await
    }

    /// Returns the current balance, or `BalanceNotFound` when the row has
    /// never been created (distinct from a zero balance).
    pub async fn balance(&self, owner_id: &str, currency: Currency) -> ResultLedger<MoneyCents> {
        let model = balances::Entity::find_by_id((
            owner_id.to_string(),
            currency.code().to_string(),
        ))
        .one(&self.database)
        .await?
        .ok_or_else(|| {
            LedgerError::BalanceNotFound(format!("{owner_id}/{}", currency.code()))
        })?;
        Ok(MoneyCents::new(model.amount_minor))
    }

    /// Returns every balance row for an owner, keyed by currency.
    pub async fn balances_for_owner(
        &self,
        owner_id: &str,
    ) -> ResultLedger<HashMap<Currency, MoneyCents>> {
        let models = balances::Entity::find()
            .filter(balances::Column::OwnerId.eq(owner_id))
            .all(&self.database)
            .await?;

        let mut out = HashMap::with_capacity(models.len());
        for model in models {
            let balance = Balance::try_from(model)?;
            out.insert(balance.currency, balance.amount);
        }
        Ok(out)
    }

    /// Hard-deletes all balance rows for an owner.
    ///
    /// Used when the owning account is removed; this drops aggregate state
    /// only, never ledger rows.
    pub async fn delete_balances_for_owner(&self, owner_id: &str) -> ResultLedger<()> {
        balances::Entity::delete_many()
            .filter(balances::Column::OwnerId.eq(owner_id))
            .exec(&self.database)
            .await?;
        Ok(())
    }

    /// Recomputes an owner's balances from the ledger and repairs drift.
    ///
    /// Transactions whose applied postings do not add up to their current
    /// amount get a catch-up posting, then every balance row is overwritten
    /// with the posting sum. After this, `propagate` finds nothing left to
    /// apply for the repaired transactions.
    pub async fn reconcile_balances(&self, owner_id: &str) -> ResultLedger<()> {
        let owner_id = owner_id.to_string();
        with_tx!(self, |db_tx| {
            let tx_models = transactions::Entity::find()
                .filter(transactions::Column::OwnerUserId.eq(owner_id.clone()))
                .all(&db_tx)
                .await?;
            let posting_models = postings::Entity::find()
                .filter(postings::Column::OwnerId.eq(owner_id.clone()))
                .all(&db_tx)
                .await?;

            let mut applied: HashMap<String, i64> = HashMap::new();
            for posting in &posting_models {
                *applied.entry(posting.transaction_id.clone()).or_insert(0) +=
                    posting.delta_minor;
            }

            let now = Utc::now();
            let mut totals: HashMap<Currency, i64> = HashMap::new();
            for model in &tx_models {
                let currency = Currency::try_from(model.currency.as_str())?;
                *totals.entry(currency).or_insert(0) += model.amount_minor;

                let applied_minor = applied.get(&model.id).copied().unwrap_or(0);
                let missing = model.amount_minor - applied_minor;
                if missing != 0 {
                    let tx_id = Uuid::parse_str(&model.id)
                        .map_err(|_| LedgerError::NotFound("transaction".to_string()))?;
                    tracing::warn!(
                        transaction_id = %tx_id,
                        delta_minor = missing,
                        "reconciliation found an unapplied delta"
                    );
                    let posting = BalancePosting::new(
                        tx_id,
                        model.revision,
                        owner_id.clone(),
                        currency,
                        MoneyCents::new(missing),
                        now,
                    );
                    postings::ActiveModel::from(&posting).insert(&db_tx).await?;
                }
            }

            // Overwrite every existing row, then create the missing ones.
            let balance_models = balances::Entity::find()
                .filter(balances::Column::OwnerId.eq(owner_id.clone()))
                .all(&db_tx)
                .await?;
            for model in balance_models {
                let currency = Currency::try_from(model.currency.as_str())?;
                let target = totals.remove(&currency).unwrap_or(0);
                if model.amount_minor != target {
                    let update = balances::ActiveModel {
                        owner_id: ActiveValue::Set(model.owner_id),
                        currency: ActiveValue::Set(model.currency),
                        amount_minor: ActiveValue::Set(target),
                        updated_at: ActiveValue::Set(now),
                    };
                    update.update(&db_tx).await?;
                }
            }
            for (currency, target) in totals {
                let insert = balances::ActiveModel {
                    owner_id: ActiveValue::Set(owner_id.clone()),
                    currency: ActiveValue::Set(currency.code().to_string()),
                    amount_minor: ActiveValue::Set(target),
                    updated_at: ActiveValue::Set(now),
                };
                insert.insert(&db_tx).await?;
            }

            Ok(())
        })
    }
}

/// Applies a delta through a single `UPDATE … SET amount = amount + ?`,
/// falling back to insert-then-retry when the row does not exist yet.
pub(super) async fn apply_delta_on<C: ConnectionTrait>(
    conn: &C,
    owner_id: &str,
    currency: Currency,
    delta: MoneyCents,
) -> ResultLedger<()> {
    let backend = conn.get_database_backend();
    let now = Utc::now();

    let update = Statement::from_sql_and_values(
        backend,
        "UPDATE balances SET amount_minor = amount_minor + ?, updated_at = ? \
         WHERE owner_id = ? AND currency = ?",
        vec![
            delta.cents().into(),
            now.into(),
            owner_id.into(),
            currency.code().into(),
        ],
    );
    if conn.execute(update.clone()).await?.rows_affected() > 0 {
        return Ok(());
    }

    let insert = Statement::from_sql_and_values(
        backend,
        "INSERT INTO balances (owner_id, currency, amount_minor, updated_at) \
         VALUES (?, ?, 0, ?) ON CONFLICT (owner_id, currency) DO NOTHING",
        vec![owner_id.into(), currency.code().into(), now.into()],
    );
    conn.execute(insert).await?;

    if conn.execute(update).await?.rows_affected() == 0 {
        return Err(LedgerError::Database(DbErr::Custom(format!(
            "balance row for {owner_id}/{} vanished between insert and update",
            currency.code()
        ))));
    }
    Ok(())
}
