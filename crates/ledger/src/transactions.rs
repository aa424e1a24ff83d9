//! Transaction primitives.
//!
//! A `Transaction` is a monetary event applied to exactly one owner balance.
//! Rows are append-mostly: the only in-place mutation is an explicit amount
//! correction, which bumps `revision` so the matching balance delta can be
//! applied exactly once.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, LedgerError, MoneyCents, ResultLedger};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
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

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Sale => "sale",
            Self::Purchase => "purchase",
            Self::ClientPayment => "client_payment",
            Self::InternalTransfer => "internal_transfer",
            Self::CurrencyConversion => "currency_conversion",
            Self::VehicleExpense => "vehicle_expense",
        }
    }

    /// Sign the kind imposes on amounts. Callers always pass magnitudes; the
    /// ledger signs them, never the other way round.
    #[must_use]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Deposit
            | Self::Sale
            | Self::ClientPayment
            | Self::InternalTransfer
            | Self::CurrencyConversion => 1,
            Self::Withdrawal | Self::Purchase | Self::VehicleExpense => -1,
        }
    }

    /// Applies the kind's sign to a positive magnitude.
    pub fn signed_amount(self, magnitude: MoneyCents) -> ResultLedger<MoneyCents> {
        if !magnitude.is_positive() {
            return Err(LedgerError::Validation(
                "amount must be > 0".to_string(),
            ));
        }
        Ok(if self.sign() < 0 { -magnitude } else { magnitude })
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "sale" => Ok(Self::Sale),
            "purchase" => Ok(Self::Purchase),
            "client_payment" => Ok(Self::ClientPayment),
            "internal_transfer" => Ok(Self::InternalTransfer),
            "currency_conversion" => Ok(Self::CurrencyConversion),
            "vehicle_expense" => Ok(Self::VehicleExpense),
            other => Err(LedgerError::Validation(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Account the amount is applied to.
    pub owner_user_id: String,
    /// Authenticated caller who triggered the event; kept for audit and may
    /// differ from the owner.
    pub executor_user_id: String,
    pub counterparty_client_id: Option<Uuid>,
    pub kind: TransactionKind,
    /// Signed amount; the sign always matches `kind.sign()`.
    pub amount: MoneyCents,
    pub currency: Currency,
    pub description: Option<String>,
    /// Bumped by each amount correction.
    pub revision: i32,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_user_id: String,
        executor_user_id: String,
        counterparty_client_id: Option<Uuid>,
        kind: TransactionKind,
        magnitude: MoneyCents,
        currency: Currency,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> ResultLedger<Self> {
        let amount = kind.signed_amount(magnitude)?;
        Ok(Self {
            id: Uuid::new_v4(),
            owner_user_id,
            executor_user_id,
            counterparty_client_id,
            kind,
            amount,
            currency,
            description,
            revision: 0,
            created_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_user_id: String,
    pub executor_user_id: String,
    pub counterparty_client_id: Option<String>,
    pub kind: String,
    pub amount_minor: i64,
    pub currency: String,
    pub description: Option<String>,
    pub revision: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::postings::Entity")]
    Postings,
}

impl Related<super::postings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Postings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            owner_user_id: ActiveValue::Set(tx.owner_user_id.clone()),
            executor_user_id: ActiveValue::Set(tx.executor_user_id.clone()),
            counterparty_client_id: ActiveValue::Set(
                tx.counterparty_client_id.map(|id| id.to_string()),
            ),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount.cents()),
            currency: ActiveValue::Set(tx.currency.code().to_string()),
            description: ActiveValue::Set(tx.description.clone()),
            revision: ActiveValue::Set(tx.revision),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| LedgerError::NotFound("transaction".to_string()))?,
            owner_user_id: model.owner_user_id,
            executor_user_id: model.executor_user_id,
            counterparty_client_id: model
                .counterparty_client_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            kind: TransactionKind::try_from(model.kind.as_str())?,
            amount: MoneyCents::new(model.amount_minor),
            currency: Currency::try_from(model.currency.as_str())?,
            description: model.description,
            revision: model.revision,
            created_at: model.created_at,
        })
    }
}
