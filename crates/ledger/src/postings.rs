//! Balance postings: the applied-delta journal.
//!
//! One row per balance delta that was actually applied, keyed UNIQUE on
//! `(transaction_id, revision)`. The key is what makes propagation
//! idempotent: a retry that finds the row (or loses the insert race) knows
//! the delta already reached the balance and must not apply it again.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{Currency, MoneyCents};

#[derive(Clone, Debug, PartialEq)]
pub struct BalancePosting {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub revision: i32,
    pub owner_id: String,
    pub currency: Currency,
    pub delta: MoneyCents,
    pub posted_at: DateTime<Utc>,
}

impl BalancePosting {
    pub fn new(
        transaction_id: Uuid,
        revision: i32,
        owner_id: String,
        currency: Currency,
        delta: MoneyCents,
        posted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            revision,
            owner_id,
            currency,
            delta,
            posted_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "balance_postings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub transaction_id: String,
    pub revision: i32,
    pub owner_id: String,
    pub currency: String,
    pub delta_minor: i64,
    pub posted_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id"
    )]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BalancePosting> for ActiveModel {
    fn from(posting: &BalancePosting) -> Self {
        Self {
            id: ActiveValue::Set(posting.id.to_string()),
            transaction_id: ActiveValue::Set(posting.transaction_id.to_string()),
            revision: ActiveValue::Set(posting.revision),
            owner_id: ActiveValue::Set(posting.owner_id.clone()),
            currency: ActiveValue::Set(posting.currency.code().to_string()),
            delta_minor: ActiveValue::Set(posting.delta.cents()),
            posted_at: ActiveValue::Set(posting.posted_at),
        }
    }
}
