//! Exchange-rate endpoints.

use api_types::rates::{RatePatch, RateView, RatesResponse};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use ledger::{Currency, ExchangeRate, RateMicros, users};

use crate::{ServerError, require_admin, server::ServerState, transactions::map_currency_out};

fn to_view(rate: ExchangeRate) -> RateView {
    RateView {
        currency: map_currency_out(rate.currency),
        rate_micros: rate.rate.micros(),
        updated_at: rate.updated_at,
        updated_by: rate.updated_by,
    }
}

pub async fn list(
    State(state): State<ServerState>,
) -> Result<Json<RatesResponse>, ServerError> {
    let rates = state.ledger.list_rates().await?;
    Ok(Json(RatesResponse {
        rates: rates.into_iter().map(to_view).collect(),
    }))
}

pub async fn update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(currency): Path<String>,
    Json(payload): Json<RatePatch>,
) -> Result<Json<RateView>, ServerError> {
    require_admin(&user)?;
    let currency = Currency::try_from(currency.as_str())?;
    let stored = state
        .ledger
        .set_rate(currency, RateMicros::new(payload.rate_micros), &user.username)
        .await?;
    Ok(Json(to_view(stored)))
}
