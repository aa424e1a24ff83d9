//! Balance endpoints.

use api_types::balance::{BalanceDelta, BalanceView, BalancesResponse};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use ledger::{Currency, MoneyCents, users};

use crate::{
    ServerError, require_admin,
    server::ServerState,
    transactions::{map_currency, map_currency_out},
};

pub async fn list(
    State(state): State<ServerState>,
    Path(owner_id): Path<String>,
) -> Result<Json<BalancesResponse>, ServerError> {
    let balances = state.ledger.balances_for_owner(&owner_id).await?;

    let mut views: Vec<BalanceView> = balances
        .into_iter()
        .map(|(currency, amount)| BalanceView {
            currency: map_currency_out(currency),
            amount_minor: amount.cents(),
        })
        .collect();
    views.sort_by_key(|v| v.currency.as_str());

    Ok(Json(BalancesResponse {
        owner_user_id: owner_id,
        balances: views,
    }))
}

pub async fn get_one(
    State(state): State<ServerState>,
    Path((owner_id, currency)): Path<(String, String)>,
) -> Result<Json<BalanceView>, ServerError> {
    let currency = Currency::try_from(currency.as_str())?;
    let amount = state.ledger.balance(&owner_id, currency).await?;
    Ok(Json(BalanceView {
        currency: map_currency_out(currency),
        amount_minor: amount.cents(),
    }))
}

/// Manual signed adjustment, outside the transaction log. Admin only.
pub async fn apply_delta(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(owner_id): Path<String>,
    Json(payload): Json<BalanceDelta>,
) -> Result<StatusCode, ServerError> {
    require_admin(&user)?;
    state
        .ledger
        .apply_delta(
            &owner_id,
            map_currency(payload.currency),
            MoneyCents::new(payload.delta_minor),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(owner_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    require_admin(&user)?;
    state.ledger.delete_balances_for_owner(&owner_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
