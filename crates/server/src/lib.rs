use axum::{Json, http::StatusCode, response::IntoResponse};
use ledger::LedgerError;
use serde::Serialize;

pub use server::{ServerState, router, run, run_with_listener};

mod balances;
mod rates;
mod reports;
mod server;
mod transactions;

pub mod types {
    pub mod transaction {
        pub use api_types::transaction::{
            AmountPatch, MovementNew, PurchaseNew, SaleNew, SearchQuery, TransactionCreated,
            TransactionPage, TransactionView,
        };
    }

    pub mod balance {
        pub use api_types::balance::{BalanceDelta, BalanceView, BalancesResponse};
    }

    pub mod rates {
        pub use api_types::rates::{RatePatch, RateView, RatesResponse};
    }

    pub mod reports {
        pub use api_types::reports::{TotalsQuery, TotalsResponse};
    }
}

pub enum ServerError {
    Ledger(LedgerError),
    Generic(String),
}

/// Error envelope returned by every failing endpoint.
#[derive(Serialize)]
struct ErrorBody {
    /// Machine-readable error code.
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn status_for_ledger_error(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Validation(_)
        | LedgerError::UnknownFilterKey(_)
        | LedgerError::InvalidRate(_) => StatusCode::BAD_REQUEST,
        LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
        LedgerError::NotFound(_) | LedgerError::BalanceNotFound(_) => StatusCode::NOT_FOUND,
        // A conversion cannot proceed until an admin stores the rate.
        LedgerError::RateNotFound(_) => StatusCode::CONFLICT,
        LedgerError::BalancePropagationFailed { .. }
        | LedgerError::Cache(_)
        | LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn body_for_ledger_error(err: LedgerError) -> ErrorBody {
    let code = match &err {
        LedgerError::Validation(_) => "validation",
        LedgerError::UnknownFilterKey(_) => "unknown_filter_key",
        LedgerError::NotFound(_) => "not_found",
        LedgerError::BalanceNotFound(_) => "balance_not_found",
        LedgerError::RateNotFound(_) => "rate_not_found",
        LedgerError::InvalidRate(_) => "invalid_rate",
        LedgerError::Forbidden(_) => "forbidden",
        LedgerError::BalancePropagationFailed { .. } => "balance_propagation_failed",
        LedgerError::Cache(_) | LedgerError::Database(_) => "internal",
    };

    match err {
        // Operators need the id of the stranded ledger row.
        LedgerError::BalancePropagationFailed {
            transaction_id,
            reason,
        } => {
            tracing::error!(%transaction_id, reason, "balance propagation failed");
            ErrorBody {
                error: code.to_string(),
                message: "transaction recorded but its balance delta was not applied".to_string(),
                details: Some(serde_json::json!({
                    "transaction_id": transaction_id.to_string(),
                })),
            }
        }
        LedgerError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            ErrorBody {
                error: code.to_string(),
                message: "internal server error".to_string(),
                details: None,
            }
        }
        LedgerError::Cache(cache_err) => {
            tracing::error!("cache error: {cache_err}");
            ErrorBody {
                error: code.to_string(),
                message: "internal server error".to_string(),
                details: None,
            }
        }
        other => ErrorBody {
            error: code.to_string(),
            message: other.to_string(),
            details: None,
        },
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Ledger(err) => (status_for_ledger_error(&err), body_for_ledger_error(err)),
            ServerError::Generic(err) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "bad_request".to_string(),
                    message: err,
                    details: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ServerError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

/// Admin gate shared by the write endpoints that operate on state the caller
/// does not own.
fn require_admin(user: &ledger::users::Model) -> Result<(), ServerError> {
    if user.admin {
        Ok(())
    } else {
        Err(ServerError::Ledger(LedgerError::Forbidden(
            "admin required".to_string(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn validation_maps_to_400() {
        let res = ServerError::from(LedgerError::Validation("bad".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_filter_key_maps_to_400() {
        let res =
            ServerError::from(LedgerError::UnknownFilterKey("productIds".to_string()))
                .into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn forbidden_maps_to_403() {
        let res = ServerError::from(LedgerError::Forbidden("no".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_maps_to_404() {
        let res = ServerError::from(LedgerError::NotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let res =
            ServerError::from(LedgerError::BalanceNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn missing_rate_maps_to_409() {
        let res = ServerError::from(LedgerError::RateNotFound("USD".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn propagation_failure_maps_to_500_with_the_transaction_id() {
        let id = Uuid::new_v4();
        let err = LedgerError::BalancePropagationFailed {
            transaction_id: id,
            reason: "disk full".to_string(),
        };
        let body = body_for_ledger_error(err);
        assert_eq!(body.error, "balance_propagation_failed");
        assert_eq!(
            body.details.unwrap()["transaction_id"],
            serde_json::json!(id.to_string())
        );
    }

    #[test]
    fn database_errors_do_not_leak() {
        let err = LedgerError::Database(sea_orm::DbErr::Custom("secret".to_string()));
        let body = body_for_ledger_error(err);
        assert_eq!(body.error, "internal");
        assert_eq!(body.message, "internal server error");
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
