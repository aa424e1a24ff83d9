//! Reporting-currency aggregation over the transaction log.

use std::collections::BTreeMap;

use sea_orm::prelude::*;
use serde::Serialize;

use crate::{
    Currency, LedgerError, MoneyCents, ResultLedger, TransactionFilter, TransactionKind,
    transactions,
};

use super::Ledger;
use super::transactions::apply_filter;

/// Totals converted to the reporting currency (EUR), grouped two ways.
#[derive(Clone, Debug, Serialize)]
pub struct ReportTotals {
    pub total: MoneyCents,
    pub by_owner: Vec<OwnerTotal>,
    pub by_kind: Vec<KindTotal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OwnerTotal {
    pub owner_user_id: String,
    pub total: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KindTotal {
    pub kind: TransactionKind,
    pub total: MoneyCents,
}

impl Ledger {
    /// Sums the filtered transactions in the reporting currency.
    ///
    /// Each row is converted at the current stored rate (HALF_UP at cents)
    /// before aggregation, so the grand total equals the sum of its converted
    /// rows. Fails with `RateNotFound` when a row's currency has no stored
    /// rate; a partial report would be worse than none.
    pub async fn report_totals(&self, filter: &TransactionFilter) -> ResultLedger<ReportTotals> {
        let models = apply_filter(transactions::Entity::find(), filter)
            .all(&self.database)
            .await?;

        let mut total = MoneyCents::ZERO;
        let mut by_owner: BTreeMap<String, MoneyCents> = BTreeMap::new();
        let mut by_kind: BTreeMap<&'static str, (TransactionKind, MoneyCents)> = BTreeMap::new();

        for model in &models {
            let currency = Currency::try_from(model.currency.as_str())?;
            let kind = TransactionKind::try_from(model.kind.as_str())?;
            let rate = self.rate_to_reporting(currency).await?;
            let converted = MoneyCents::new(model.amount_minor)
                .convert(rate)
                .ok_or_else(|| {
                    LedgerError::Validation(format!(
                        "conversion overflow for transaction {}",
                        model.id
                    ))
                })?;

            total = total
                .checked_add(converted)
                .ok_or_else(|| LedgerError::Validation("report total overflow".to_string()))?;

            let owner_total = by_owner
                .entry(model.owner_user_id.clone())
                .or_insert(MoneyCents::ZERO);
            *owner_total = owner_total
                .checked_add(converted)
                .ok_or_else(|| LedgerError::Validation("report total overflow".to_string()))?;

            let kind_total = by_kind
                .entry(kind.as_str())
                .or_insert((kind, MoneyCents::ZERO));
            kind_total.1 = kind_total
                .1
                .checked_add(converted)
                .ok_or_else(|| LedgerError::Validation("report total overflow".to_string()))?;
        }

        Ok(ReportTotals {
            total,
            by_owner: by_owner
                .into_iter()
                .map(|(owner_user_id, total)| OwnerTotal {
                    owner_user_id,
                    total,
                })
                .collect(),
            by_kind: by_kind
                .into_values()
                .map(|(kind, total)| KindTotal { kind, total })
                .collect(),
        })
    }
}
