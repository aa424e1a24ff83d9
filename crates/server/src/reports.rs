//! Reporting endpoints.

use api_types::reports::{KindTotalView, OwnerTotalView, TotalsQuery, TotalsResponse};
use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    ServerError,
    server::ServerState,
    transactions::{map_kind, parse_filters},
};

pub async fn totals(
    State(state): State<ServerState>,
    Query(query): Query<TotalsQuery>,
) -> Result<Json<TotalsResponse>, ServerError> {
    let filter = parse_filters(query.filters.as_deref())?;
    let totals = state.ledger.report_totals(&filter).await?;

    Ok(Json(TotalsResponse {
        total_minor: totals.total.cents(),
        by_owner: totals
            .by_owner
            .into_iter()
            .map(|t| OwnerTotalView {
                owner_user_id: t.owner_user_id,
                total_minor: t.total.cents(),
            })
            .collect(),
        by_kind: totals
            .by_kind
            .into_iter()
            .map(|t| KindTotalView {
                kind: map_kind(t.kind),
                total_minor: t.total.cents(),
            })
            .collect(),
    }))
}
