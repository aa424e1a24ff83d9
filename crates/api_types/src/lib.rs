//! Wire types shared between the HTTP server and its clients.
//!
//! Monetary amounts travel as **integer minor units** (`amount_minor`, i64)
//! and exchange rates as **integer micro units** (`rate_micros`, i64); no
//! floats cross the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Uah,
    Usd,
    #[default]
    Eur,
}

impl Currency {
    /// Canonical currency code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uah => "UAH",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Deposit,
        Withdrawal,
        Sale,
        Purchase,
        ClientPayment,
        InternalTransfer,
        CurrencyConversion,
        VehicleExpense,
    }

    /// Body for `POST /transactions/deposit` and `/transactions/withdraw`.
    ///
    /// `owner_user_id` defaults to the authenticated caller; targeting
    /// another owner requires admin.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MovementNew {
        pub owner_user_id: Option<String>,
        /// Positive magnitude in minor units; the kind fixes the sign.
        pub amount_minor: i64,
        pub currency: Currency,
        pub description: Option<String>,
        /// Event time; defaults to now (UTC).
        pub created_at: Option<DateTime<Utc>>,
    }

    /// Body for `POST /transactions/sale`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct SaleNew {
        pub owner_user_id: Option<String>,
        pub amount_minor: i64,
        pub currency: Currency,
        pub client_id: Option<Uuid>,
        pub description: Option<String>,
        pub created_at: Option<DateTime<Utc>>,
    }

    /// Body for `POST /transactions/purchase`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PurchaseNew {
        pub owner_user_id: Option<String>,
        pub amount_minor: i64,
        pub currency: Currency,
        pub client_id: Option<Uuid>,
        /// When present, the generated description carries the unit price.
        pub quantity: Option<i64>,
        pub description: Option<String>,
        pub created_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub id: Uuid,
    }

    /// Body for `PATCH /transactions/{id}/amount`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AmountPatch {
        /// New positive magnitude in minor units.
        pub amount_minor: i64,
    }

    /// Query for `GET /transactions/search`.
    ///
    /// `filters` is a JSON object (name -> list of string values) encoded
    /// into the query string.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct SearchQuery {
        pub filters: Option<String>,
        pub sort: Option<String>,
        pub page: Option<u64>,
        pub size: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub owner_user_id: String,
        pub executor_user_id: String,
        pub client_id: Option<Uuid>,
        /// Client display name, when the client row resolves.
        pub client_name: Option<String>,
        pub kind: TransactionKind,
        /// Signed amount in minor units.
        pub amount_minor: i64,
        pub currency: Currency,
        pub description: Option<String>,
        pub revision: i32,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionPage {
        pub items: Vec<TransactionView>,
        pub page: u64,
        pub page_size: u64,
        pub total_items: u64,
    }
}

pub mod balance {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceView {
        pub currency: Currency,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalancesResponse {
        pub owner_user_id: String,
        pub balances: Vec<BalanceView>,
    }

    /// Body for `PATCH /balances/{owner_id}` (admin only).
    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceDelta {
        pub currency: Currency,
        /// Signed delta in minor units.
        pub delta_minor: i64,
    }
}

pub mod rates {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RateView {
        pub currency: Currency,
        /// Rate to the reporting currency in micro units (6 digits).
        pub rate_micros: i64,
        pub updated_at: DateTime<Utc>,
        pub updated_by: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RatesResponse {
        pub rates: Vec<RateView>,
    }

    /// Body for `PATCH /exchange-rates/{currency}` (admin only).
    #[derive(Debug, Serialize, Deserialize)]
    pub struct RatePatch {
        pub rate_micros: i64,
    }
}

pub mod reports {
    use super::transaction::TransactionKind;
    use super::*;

    /// Query for `GET /reports/totals`; same `filters` encoding as search.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TotalsQuery {
        pub filters: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OwnerTotalView {
        pub owner_user_id: String,
        pub total_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct KindTotalView {
        pub kind: TransactionKind,
        pub total_minor: i64,
    }

    /// Totals in the reporting currency (EUR minor units).
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TotalsResponse {
        pub total_minor: i64,
        pub by_owner: Vec<OwnerTotalView>,
        pub by_kind: Vec<KindTotalView>,
    }
}
