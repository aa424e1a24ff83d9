//! Balance aggregate: one row per (owner, currency).
//!
//! A row is created lazily by the first delta and must always equal the sum
//! of deltas successfully applied for that owner+currency. A missing row is
//! `BalanceNotFound`, which is distinct from a zero balance.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Currency, LedgerError, MoneyCents};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub owner_id: String,
    pub currency: Currency,
    pub amount: MoneyCents,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub owner_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub currency: String,
    pub amount_minor: i64,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Balance {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            owner_id: model.owner_id,
            currency: Currency::try_from(model.currency.as_str())?,
            amount: MoneyCents::new(model.amount_minor),
            updated_at: model.updated_at,
        })
    }
}
