//! Transaction endpoints.

use std::collections::BTreeMap;

use api_types::transaction::{
    AmountPatch, MovementNew, PurchaseNew, SaleNew, SearchQuery, TransactionCreated,
    TransactionKind as ApiKind, TransactionPage, TransactionView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use ledger::{
    CorrectAmountCmd, DepositCmd, MoneyCents, PurchaseCmd, SaleCmd, SortSpec, Transaction,
    TransactionFilter, TransactionWithClient, WithdrawCmd, users,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

pub(crate) fn map_currency(currency: api_types::Currency) -> ledger::Currency {
    match currency {
        api_types::Currency::Uah => ledger::Currency::Uah,
        api_types::Currency::Usd => ledger::Currency::Usd,
        api_types::Currency::Eur => ledger::Currency::Eur,
    }
}

pub(crate) fn map_currency_out(currency: ledger::Currency) -> api_types::Currency {
    match currency {
        ledger::Currency::Uah => api_types::Currency::Uah,
        ledger::Currency::Usd => api_types::Currency::Usd,
        ledger::Currency::Eur => api_types::Currency::Eur,
    }
}

pub(crate) fn map_kind(kind: ledger::TransactionKind) -> ApiKind {
    match kind {
        ledger::TransactionKind::Deposit => ApiKind::Deposit,
        ledger::TransactionKind::Withdrawal => ApiKind::Withdrawal,
        ledger::TransactionKind::Sale => ApiKind::Sale,
        ledger::TransactionKind::Purchase => ApiKind::Purchase,
        ledger::TransactionKind::ClientPayment => ApiKind::ClientPayment,
        ledger::TransactionKind::InternalTransfer => ApiKind::InternalTransfer,
        ledger::TransactionKind::CurrencyConversion => ApiKind::CurrencyConversion,
        ledger::TransactionKind::VehicleExpense => ApiKind::VehicleExpense,
    }
}

fn to_view(tx: Transaction, client_name: Option<String>) -> TransactionView {
    TransactionView {
        id: tx.id,
        owner_user_id: tx.owner_user_id,
        executor_user_id: tx.executor_user_id,
        client_id: tx.counterparty_client_id,
        client_name,
        kind: map_kind(tx.kind),
        amount_minor: tx.amount.cents(),
        currency: map_currency_out(tx.currency),
        description: tx.description,
        revision: tx.revision,
        created_at: tx.created_at,
    }
}

/// Moving money on someone else's account requires admin.
fn resolve_owner(
    user: &users::Model,
    requested: Option<String>,
) -> Result<String, ServerError> {
    match requested {
        Some(owner) if owner != user.username => {
            crate::require_admin(user)?;
            Ok(owner)
        }
        Some(owner) => Ok(owner),
        None => Ok(user.username.clone()),
    }
}

/// Parses the `filters` query value (a JSON object of `name -> [values]`).
pub(crate) fn parse_filters(raw: Option<&str>) -> Result<TransactionFilter, ServerError> {
    let Some(raw) = raw else {
        return Ok(TransactionFilter::default());
    };
    let spec: BTreeMap<String, Vec<String>> = serde_json::from_str(raw)
        .map_err(|err| ServerError::Generic(format!("invalid filters: {err}")))?;
    Ok(TransactionFilter::from_spec(&spec)?)
}

pub async fn deposit_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<MovementNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let owner = resolve_owner(&user, payload.owner_user_id)?;
    let mut cmd = DepositCmd::new(
        owner,
        &user.username,
        MoneyCents::new(payload.amount_minor),
        map_currency(payload.currency),
        payload.created_at.unwrap_or_else(Utc::now),
    );
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }

    let id = state.ledger.deposit(cmd).await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { id })))
}

pub async fn withdraw_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<MovementNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let owner = resolve_owner(&user, payload.owner_user_id)?;
    let mut cmd = WithdrawCmd::new(
        owner,
        &user.username,
        MoneyCents::new(payload.amount_minor),
        map_currency(payload.currency),
        payload.created_at.unwrap_or_else(Utc::now),
    );
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }

    let id = state.ledger.withdraw(cmd).await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { id })))
}

pub async fn sale_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<SaleNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let owner = resolve_owner(&user, payload.owner_user_id)?;
    let mut cmd = SaleCmd::new(
        owner,
        &user.username,
        MoneyCents::new(payload.amount_minor),
        map_currency(payload.currency),
        payload.created_at.unwrap_or_else(Utc::now),
    );
    if let Some(client_id) = payload.client_id {
        cmd = cmd.counterparty(client_id);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }

    let id = state.ledger.record_sale(cmd).await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { id })))
}

pub async fn purchase_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<PurchaseNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let owner = resolve_owner(&user, payload.owner_user_id)?;
    let mut cmd = PurchaseCmd::new(
        owner,
        &user.username,
        MoneyCents::new(payload.amount_minor),
        map_currency(payload.currency),
        payload.created_at.unwrap_or_else(Utc::now),
    );
    if let Some(client_id) = payload.client_id {
        cmd = cmd.counterparty(client_id);
    }
    if let Some(quantity) = payload.quantity {
        cmd = cmd.quantity(quantity);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }

    let id = state.ledger.record_purchase(cmd).await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { id })))
}

/// Correcting a transaction moves money on its owner's account, so the same
/// rule as `resolve_owner` applies: someone else's transaction needs admin.
async fn require_owner_or_admin(
    state: &ServerState,
    user: &users::Model,
    id: Uuid,
) -> Result<(), ServerError> {
    let tx = state.ledger.transaction(id).await?;
    if tx.owner_user_id != user.username {
        crate::require_admin(user)?;
    }
    Ok(())
}

pub async fn update_amount(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AmountPatch>,
) -> Result<StatusCode, ServerError> {
    require_owner_or_admin(&state, &user, id).await?;
    let cmd = CorrectAmountCmd::new(id, &user.username, MoneyCents::new(payload.amount_minor));
    state.ledger.correct_amount(cmd).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Operator retry for a transaction whose balance delta never landed.
pub async fn propagate(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    require_owner_or_admin(&state, &user, id).await?;
    state.ledger.propagate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search(
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<TransactionPage>, ServerError> {
    let filter = parse_filters(query.filters.as_deref())?;
    let sort = match query.sort.as_deref() {
        Some(raw) => SortSpec::parse(raw)?,
        None => SortSpec::default(),
    };
    let page = query.page.unwrap_or(0);
    let size = query.size.unwrap_or(50);

    let result = state.ledger.search(&filter, page, size, sort).await?;
    Ok(Json(TransactionPage {
        items: result
            .items
            .into_iter()
            .map(
                |TransactionWithClient {
                     transaction,
                     counterparty_name,
                 }| to_view(transaction, counterparty_name),
            )
            .collect(),
        page: result.page,
        page_size: result.page_size,
        total_items: result.total_items,
    }))
}

pub async fn list_for_owner(
    State(state): State<ServerState>,
    Path(owner_id): Path<String>,
) -> Result<Json<Vec<TransactionView>>, ServerError> {
    let txs = state.ledger.transactions_for_owner(&owner_id).await?;
    Ok(Json(txs.into_iter().map(|tx| to_view(tx, None)).collect()))
}
