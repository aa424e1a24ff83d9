//! Transaction log: orchestrated writes, amount correction, propagation and
//! search.
//!
//! Every balance-affecting operation follows the same two-step protocol:
//! the ledger row commits first in its own DB transaction, then the balance
//! delta is propagated through the posting journal. A propagation failure
//! leaves the row persisted and surfaces `BalancePropagationFailed` with the
//! transaction id; `propagate` can be re-run safely because the
//! `(transaction_id, revision)` posting key dedupes applied deltas.

use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveValue, PaginatorTrait, QueryFilter, QueryOrder, Select, TransactionTrait, prelude::*,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    BalancePosting, CorrectAmountCmd, Currency, DepositCmd, LedgerError, MoneyCents, PurchaseCmd,
    RateMicros, ResultLedger, SaleCmd, SortDir, SortField, SortSpec, Transaction, TransactionFilter,
    TransactionKind, WithdrawCmd, clients, postings, transactions,
};

use super::balances::apply_delta_on;
use super::{Ledger, with_tx};

/// A transaction plus its page-scoped enrichment.
#[derive(Clone, Debug, Serialize)]
pub struct TransactionWithClient {
    pub transaction: Transaction,
    /// Display name of the counterparty, when the client row resolves.
    pub counterparty_name: Option<String>,
}

/// One page of search results.
#[derive(Clone, Debug, Serialize)]
pub struct TransactionPage {
    pub items: Vec<TransactionWithClient>,
    pub page: u64,
    pub page_size: u64,
    pub total_items: u64,
}

pub(super) fn apply_filter(
    mut query: Select<transactions::Entity>,
    filter: &TransactionFilter,
) -> Select<transactions::Entity> {
    if !filter.owner_user_ids.is_empty() {
        query = query.filter(transactions::Column::OwnerUserId.is_in(filter.owner_user_ids.clone()));
    }
    if !filter.counterparty_client_ids.is_empty() {
        let ids: Vec<String> = filter
            .counterparty_client_ids
            .iter()
            .map(Uuid::to_string)
            .collect();
        query = query.filter(transactions::Column::CounterpartyClientId.is_in(ids));
    }
    if !filter.kinds.is_empty() {
        let kinds: Vec<&str> = filter.kinds.iter().map(|k| k.as_str()).collect();
        query = query.filter(transactions::Column::Kind.is_in(kinds));
    }
    if !filter.currencies.is_empty() {
        let codes: Vec<&str> = filter.currencies.iter().map(|c| c.code()).collect();
        query = query.filter(transactions::Column::Currency.is_in(codes));
    }
    if let Some(from) = filter.date_from {
        query = query.filter(transactions::Column::CreatedAt.gte(from));
    }
    if let Some(to) = filter.date_to {
        query = query.filter(transactions::Column::CreatedAt.lt(to));
    }
    query
}

impl Ledger {
    /// Records a deposit: positive amount on the owner balance.
    pub async fn deposit(&self, cmd: DepositCmd) -> ResultLedger<Uuid> {
        let description = cmd
            .description
            .unwrap_or_else(|| format!("deposit {} {}", cmd.magnitude, cmd.currency));
        let tx = Transaction::new(
            cmd.owner_user_id,
            cmd.executor_user_id,
            None,
            TransactionKind::Deposit,
            cmd.magnitude,
            cmd.currency,
            Some(description),
            cmd.created_at,
        )?;
        self.append_and_propagate(tx).await
    }

    /// Records a withdrawal: negative amount on the owner balance.
    pub async fn withdraw(&self, cmd: WithdrawCmd) -> ResultLedger<Uuid> {
        let description = cmd
            .description
            .unwrap_or_else(|| format!("withdrawal {} {}", cmd.magnitude, cmd.currency));
        let tx = Transaction::new(
            cmd.owner_user_id,
            cmd.executor_user_id,
            None,
            TransactionKind::Withdrawal,
            cmd.magnitude,
            cmd.currency,
            Some(description),
            cmd.created_at,
        )?;
        self.append_and_propagate(tx).await
    }

    /// Records a sale: credits the owner, optionally linked to a client.
    pub async fn record_sale(&self, cmd: SaleCmd) -> ResultLedger<Uuid> {
        let description = cmd
            .description
            .unwrap_or_else(|| format!("sale {} {}", cmd.magnitude, cmd.currency));
        let tx = Transaction::new(
            cmd.owner_user_id,
            cmd.executor_user_id,
            cmd.counterparty_client_id,
            TransactionKind::Sale,
            cmd.magnitude,
            cmd.currency,
            Some(description),
            cmd.created_at,
        )?;
        self.append_and_propagate(tx).await
    }

    /// Records a purchase: debits the owner.
    ///
    /// With a quantity the generated description carries the derived unit
    /// price (CEILING at 6 digits).
    pub async fn record_purchase(&self, cmd: PurchaseCmd) -> ResultLedger<Uuid> {
        let description = match (cmd.description, cmd.quantity) {
            (Some(description), _) => description,
            (None, Some(quantity)) => {
                let unit = RateMicros::unit_price(cmd.magnitude, quantity).ok_or_else(|| {
                    LedgerError::Validation(format!("invalid quantity: {quantity}"))
                })?;
                format!(
                    "purchase {} {} ({} units @ {})",
                    cmd.magnitude, cmd.currency, quantity, unit
                )
            }
            (None, None) => format!("purchase {} {}", cmd.magnitude, cmd.currency),
        };
        let tx = Transaction::new(
            cmd.owner_user_id,
            cmd.executor_user_id,
            cmd.counterparty_client_id,
            TransactionKind::Purchase,
            cmd.magnitude,
            cmd.currency,
            Some(description),
            cmd.created_at,
        )?;
        self.append_and_propagate(tx).await
    }

    /// Commits the ledger row, then propagates its delta.
    ///
    /// The row is durable before the balance is touched; when the balance
    /// step fails the caller gets `BalancePropagationFailed` with the id of
    /// the already-persisted row.
    async fn append_and_propagate(&self, tx: Transaction) -> ResultLedger<Uuid> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &tx.owner_user_id).await?;
            self.require_user(&db_tx, &tx.executor_user_id).await?;
            transactions::ActiveModel::from(&tx).insert(&db_tx).await?;
            Ok(())
        })?;

        if let Err(err) = self.propagate(tx.id).await {
            tracing::error!(
                transaction_id = %tx.id,
                error = %err,
                "ledger row persisted but balance delta was not applied"
            );
            return Err(LedgerError::BalancePropagationFailed {
                transaction_id: tx.id,
                reason: err.to_string(),
            });
        }

        Ok(tx.id)
    }

    /// Applies whatever part of a transaction's amount has not yet reached
    /// the balance. Safe to call repeatedly: a fully applied transaction is
    /// a no-op, and a lost insert race on the posting key means another call
    /// already applied the delta.
    pub async fn propagate(&self, transaction_id: Uuid) -> ResultLedger<()> {
        with_tx!(self, |db_tx| {
            let model = transactions::Entity::find_by_id(transaction_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| {
                    LedgerError::NotFound(format!("transaction {transaction_id}"))
                })?;
            let currency = Currency::try_from(model.currency.as_str())?;

            let posting_models = postings::Entity::find()
                .filter(postings::Column::TransactionId.eq(transaction_id.to_string()))
                .all(&db_tx)
                .await?;
            let applied: i64 = posting_models.iter().map(|p| p.delta_minor).sum();

            let delta = MoneyCents::new(model.amount_minor - applied);
            if delta.is_zero() {
                return Ok(());
            }

            let posting = BalancePosting::new(
                transaction_id,
                model.revision,
                model.owner_user_id.clone(),
                currency,
                delta,
                chrono::Utc::now(),
            );
            if let Err(err) = postings::ActiveModel::from(&posting).insert(&db_tx).await {
                // Unique (transaction_id, revision): a concurrent propagate
                // won the race and applied this delta.
                let existing = postings::Entity::find()
                    .filter(postings::Column::TransactionId.eq(transaction_id.to_string()))
                    .filter(postings::Column::Revision.eq(model.revision))
                    .one(&db_tx)
                    .await?;
                if existing.is_some() {
                    return Ok(());
                }
                return Err(err.into());
            }

            apply_delta_on(&db_tx, &model.owner_user_id, currency, delta).await?;
            Ok(())
        })
    }

    /// Replaces a transaction's amount and applies the difference to the
    /// balance exactly once.
    ///
    /// The read-compute-write on the ledger row is a single DB transaction;
    /// a second correction to the same magnitude reads the already-updated
    /// amount and produces a zero delta. Returns the signed delta that was
    /// applied.
    pub async fn correct_amount(&self, cmd: CorrectAmountCmd) -> ResultLedger<MoneyCents> {
        let transaction_id = cmd.transaction_id;

        let delta: MoneyCents = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &cmd.executor_user_id).await?;
            let model = transactions::Entity::find_by_id(transaction_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| {
                    LedgerError::NotFound(format!("transaction {transaction_id}"))
                })?;

            let kind = TransactionKind::try_from(model.kind.as_str())?;
            let new_amount = kind.signed_amount(cmd.new_magnitude)?;
            let delta = new_amount - MoneyCents::new(model.amount_minor);
            if delta.is_zero() {
                return Ok(delta);
            }

            let update = transactions::ActiveModel {
                id: ActiveValue::Set(model.id.clone()),
                amount_minor: ActiveValue::Set(new_amount.cents()),
                revision: ActiveValue::Set(model.revision + 1),
                ..Default::default()
            };
            update.update(&db_tx).await?;
            Ok(delta)
        })?;

        if delta.is_zero() {
            return Ok(delta);
        }

        if let Err(err) = self.propagate(transaction_id).await {
            tracing::error!(
                transaction_id = %transaction_id,
                error = %err,
                "amount corrected but balance delta was not applied"
            );
            return Err(LedgerError::BalancePropagationFailed {
                transaction_id,
                reason: err.to_string(),
            });
        }

        Ok(delta)
    }

    /// Loads one transaction by id.
    pub async fn transaction(&self, transaction_id: Uuid) -> ResultLedger<Transaction> {
        let model = transactions::Entity::find_by_id(transaction_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {transaction_id}")))?;
        Transaction::try_from(model)
    }

    /// Searches the ledger with offset pagination.
    ///
    /// Counterparty display names are resolved for the returned page only; a
    /// missing client row degrades to `None` instead of failing the search.
    pub async fn search(
        &self,
        filter: &TransactionFilter,
        page: u64,
        page_size: u64,
        sort: SortSpec,
    ) -> ResultLedger<TransactionPage> {
        if page_size == 0 || page_size > 200 {
            return Err(LedgerError::Validation(
                "page size must be between 1 and 200".to_string(),
            ));
        }

        let mut query = apply_filter(transactions::Entity::find(), filter);
        query = match (sort.field, sort.dir) {
            (SortField::CreatedAt, SortDir::Desc) => {
                query.order_by_desc(transactions::Column::CreatedAt)
            }
            (SortField::CreatedAt, SortDir::Asc) => {
                query.order_by_asc(transactions::Column::CreatedAt)
            }
            (SortField::Amount, SortDir::Desc) => {
                query.order_by_desc(transactions::Column::AmountMinor)
            }
            (SortField::Amount, SortDir::Asc) => {
                query.order_by_asc(transactions::Column::AmountMinor)
            }
        };
        // Stable tiebreak so pages never overlap.
        query = query.order_by_asc(transactions::Column::Id);

        let paginator = query.paginate(&self.database, page_size);
        let total_items = paginator.num_items().await?;
        let models = paginator.fetch_page(page).await?;

        let mut items = Vec::with_capacity(models.len());
        for model in models {
            items.push(Transaction::try_from(model)?);
        }
        let names = self.resolve_client_names(&items).await;

        let items = items
            .into_iter()
            .map(|transaction| {
                let counterparty_name = transaction
                    .counterparty_client_id
                    .and_then(|id| names.get(&id).cloned());
                TransactionWithClient {
                    transaction,
                    counterparty_name,
                }
            })
            .collect();

        Ok(TransactionPage {
            items,
            page,
            page_size,
            total_items,
        })
    }

    /// Resolves counterparty names for one page of transactions.
    ///
    /// Lookup failures degrade to an empty map: enrichment must never fail
    /// the request it decorates.
    async fn resolve_client_names(&self, items: &[Transaction]) -> HashMap<Uuid, String> {
        let ids: HashSet<Uuid> = items
            .iter()
            .filter_map(|tx| tx.counterparty_client_id)
            .collect();
        if ids.is_empty() {
            return HashMap::new();
        }

        let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let models = match clients::Entity::find()
            .filter(clients::Column::Id.is_in(id_strings))
            .all(&self.database)
            .await
        {
            Ok(models) => models,
            Err(err) => {
                tracing::warn!(error = %err, "counterparty name lookup failed");
                return HashMap::new();
            }
        };

        models
            .into_iter()
            .filter_map(|model| Uuid::parse_str(&model.id).ok().map(|id| (id, model.name)))
            .collect()
    }

    /// Full transaction list for one owner, newest first.
    pub async fn transactions_for_owner(&self, owner_id: &str) -> ResultLedger<Vec<Transaction>> {
        let models = transactions::Entity::find()
            .filter(transactions::Column::OwnerUserId.eq(owner_id))
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_asc(transactions::Column::Id)
            .all(&self.database)
            .await?;
        models.into_iter().map(Transaction::try_from).collect()
    }

    /// Admin-only cascade: removes an owner's ledger rows and their posting
    /// journal. Balance rows are handled separately by
    /// `delete_balances_for_owner`.
    pub async fn delete_transactions_for_owner(&self, owner_id: &str) -> ResultLedger<()> {
        let owner_id = owner_id.to_string();
        with_tx!(self, |db_tx| {
            postings::Entity::delete_many()
                .filter(postings::Column::OwnerId.eq(owner_id.clone()))
                .exec(&db_tx)
                .await?;
            transactions::Entity::delete_many()
                .filter(transactions::Column::OwnerUserId.eq(owner_id.clone()))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}
