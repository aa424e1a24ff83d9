//! Command structs for ledger write operations.
//!
//! These types group parameters for the orchestrated writes
//! (deposit/withdraw/sale/purchase/correct), keeping call sites readable and
//! avoiding long argument lists. Amounts are always positive magnitudes; the
//! ledger applies the sign the kind dictates.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Currency, MoneyCents};

/// Record a deposit onto an owner balance.
#[derive(Clone, Debug)]
pub struct DepositCmd {
    pub owner_user_id: String,
    pub magnitude: MoneyCents,
    pub currency: Currency,
    pub executor_user_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DepositCmd {
    #[must_use]
    pub fn new(
        owner_user_id: impl Into<String>,
        executor_user_id: impl Into<String>,
        magnitude: MoneyCents,
        currency: Currency,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            magnitude,
            currency,
            executor_user_id: executor_user_id.into(),
            description: None,
            created_at,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Record a withdrawal from an owner balance.
#[derive(Clone, Debug)]
pub struct WithdrawCmd {
    pub owner_user_id: String,
    pub magnitude: MoneyCents,
    pub currency: Currency,
    pub executor_user_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WithdrawCmd {
    #[must_use]
    pub fn new(
        owner_user_id: impl Into<String>,
        executor_user_id: impl Into<String>,
        magnitude: MoneyCents,
        currency: Currency,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            magnitude,
            currency,
            executor_user_id: executor_user_id.into(),
            description: None,
            created_at,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Record a sale: credits the owner, optionally linked to a client.
#[derive(Clone, Debug)]
pub struct SaleCmd {
    pub owner_user_id: String,
    pub magnitude: MoneyCents,
    pub currency: Currency,
    pub counterparty_client_id: Option<Uuid>,
    pub executor_user_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SaleCmd {
    #[must_use]
    pub fn new(
        owner_user_id: impl Into<String>,
        executor_user_id: impl Into<String>,
        magnitude: MoneyCents,
        currency: Currency,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            magnitude,
            currency,
            counterparty_client_id: None,
            executor_user_id: executor_user_id.into(),
            description: None,
            created_at,
        }
    }

    #[must_use]
    pub fn counterparty(mut self, client_id: Uuid) -> Self {
        self.counterparty_client_id = Some(client_id);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Record a purchase: debits the owner, optionally linked to a client.
///
/// When `quantity` is present the generated description carries the derived
/// unit price (total / quantity, CEILING at 6 digits).
#[derive(Clone, Debug)]
pub struct PurchaseCmd {
    pub owner_user_id: String,
    pub magnitude: MoneyCents,
    pub currency: Currency,
    pub counterparty_client_id: Option<Uuid>,
    pub quantity: Option<i64>,
    pub executor_user_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseCmd {
    #[must_use]
    pub fn new(
        owner_user_id: impl Into<String>,
        executor_user_id: impl Into<String>,
        magnitude: MoneyCents,
        currency: Currency,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            magnitude,
            currency,
            counterparty_client_id: None,
            quantity: None,
            executor_user_id: executor_user_id.into(),
            description: None,
            created_at,
        }
    }

    #[must_use]
    pub fn counterparty(mut self, client_id: Uuid) -> Self {
        self.counterparty_client_id = Some(client_id);
        self
    }

    #[must_use]
    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Replace the amount of an existing transaction.
///
/// `new_magnitude` is positive; the stored sign is re-derived from the
/// transaction kind. Only the resulting delta ever reaches the balance.
#[derive(Clone, Debug)]
pub struct CorrectAmountCmd {
    pub transaction_id: Uuid,
    pub new_magnitude: MoneyCents,
    pub executor_user_id: String,
}

impl CorrectAmountCmd {
    #[must_use]
    pub fn new(
        transaction_id: Uuid,
        executor_user_id: impl Into<String>,
        new_magnitude: MoneyCents,
    ) -> Self {
        Self {
            transaction_id,
            new_magnitude,
            executor_user_id: executor_user_id.into(),
        }
    }
}
