//! Exchange-rate store: cached reads, admin-editable writes.

use chrono::Utc;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};

use crate::{Currency, ExchangeRate, LedgerError, RateMicros, ResultLedger, rates};

use super::{Ledger, with_tx};

/// Outcome of a cache lookup. A miss carries the generation the reader saw,
/// which gates the later populate.
enum CacheRead {
    Hit(RateMicros),
    Miss { generation: u64 },
}

impl Ledger {
    /// Returns the rate from `currency` to the reporting currency (EUR).
    ///
    /// EUR is always exactly 1 and never touches the store or the cache.
    /// Fails with `RateNotFound` when no rate has been stored; callers must
    /// not guess one.
    pub async fn rate_to_reporting(&self, currency: Currency) -> ResultLedger<RateMicros> {
        if currency.is_reporting() {
            return Ok(RateMicros::ONE);
        }

        let generation = match self.cached_rate(currency)? {
            CacheRead::Hit(rate) => return Ok(rate),
            CacheRead::Miss { generation } => generation,
        };

        let model = rates::Entity::find_by_id(currency.code().to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| LedgerError::RateNotFound(currency.code().to_string()))?;
        let rate = RateMicros::new(model.rate_micros);

        self.store_cached_rate(currency, rate, generation)?;
        Ok(rate)
    }

    fn cached_rate(&self, currency: Currency) -> ResultLedger<CacheRead> {
        let cache = self
            .rate_cache
            .read()
            .map_err(|_| LedgerError::Cache("rate cache poisoned".to_string()))?;
        Ok(match cache.rates.get(&currency) {
            Some(rate) => CacheRead::Hit(*rate),
            None => CacheRead::Miss {
                generation: cache.generation,
            },
        })
    }

    /// Inserts a rate read from the store, unless a write confirmed since the
    /// lookup started. A populate from a superseded generation would pin the
    /// old rate past its eviction, so it is dropped; the next read re-fetches.
    fn store_cached_rate(
        &self,
        currency: Currency,
        rate: RateMicros,
        seen_generation: u64,
    ) -> ResultLedger<()> {
        let mut cache = self
            .rate_cache
            .write()
            .map_err(|_| LedgerError::Cache("rate cache poisoned".to_string()))?;
        if cache.generation == seen_generation {
            cache.rates.insert(currency, rate);
        }
        Ok(())
    }

    fn evict_cached_rate(&self, currency: Currency) -> ResultLedger<()> {
        let mut cache = self
            .rate_cache
            .write()
            .map_err(|_| LedgerError::Cache("rate cache poisoned".to_string()))?;
        cache.rates.remove(&currency);
        cache.generation = cache.generation.wrapping_add(1);
        Ok(())
    }

    /// Upserts the rate for `currency` and evicts its cache entry before
    /// returning, so no later read observes the old value.
    pub async fn set_rate(
        &self,
        currency: Currency,
        rate: RateMicros,
        updated_by: &str,
    ) -> ResultLedger<ExchangeRate> {
        if currency.is_reporting() {
            return Err(LedgerError::InvalidRate(
                "the reporting currency rate is fixed to 1".to_string(),
            ));
        }
        if !rate.is_valid_rate() {
            return Err(LedgerError::InvalidRate(format!(
                "rate must be > 0, got {rate}"
            )));
        }

        let updated_by = updated_by.to_string();
        let now = Utc::now();

        let model: rates::Model = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &updated_by).await?;

            let existing = rates::Entity::find_by_id(currency.code().to_string())
                .one(&db_tx)
                .await?;
            let model = match existing {
                Some(_) => {
                    let update = rates::ActiveModel {
                        currency: ActiveValue::Set(currency.code().to_string()),
                        rate_micros: ActiveValue::Set(rate.micros()),
                        updated_at: ActiveValue::Set(now),
                        updated_by: ActiveValue::Set(updated_by.clone()),
                    };
                    update.update(&db_tx).await?
                }
                None => {
                    let insert = rates::ActiveModel {
                        currency: ActiveValue::Set(currency.code().to_string()),
                        rate_micros: ActiveValue::Set(rate.micros()),
                        updated_at: ActiveValue::Set(now),
                        updated_by: ActiveValue::Set(updated_by.clone()),
                    };
                    insert.insert(&db_tx).await?
                }
            };
            Ok(model)
        })?;

        // Evict before returning success; a stale entry must not outlive a
        // confirmed write.
        self.evict_cached_rate(currency)?;

        tracing::info!(currency = currency.code(), %rate, "exchange rate updated");
        ExchangeRate::try_from(model)
    }

    /// Lists all stored rates (the reporting currency is implicit).
    pub async fn list_rates(&self) -> ResultLedger<Vec<ExchangeRate>> {
        let models = rates::Entity::find().all(&self.database).await?;
        models.into_iter().map(ExchangeRate::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populate_from_the_seen_generation_lands() {
        let ledger = Ledger::builder().build();
        let CacheRead::Miss { generation } = ledger.cached_rate(Currency::Usd).unwrap() else {
            panic!("expected a cache miss");
        };

        ledger
            .store_cached_rate(Currency::Usd, RateMicros::new(920_000), generation)
            .unwrap();

        match ledger.cached_rate(Currency::Usd).unwrap() {
            CacheRead::Hit(rate) => assert_eq!(rate, RateMicros::new(920_000)),
            CacheRead::Miss { .. } => panic!("expected a cache hit"),
        }
    }

    #[test]
    fn populate_after_an_interleaved_eviction_is_discarded() {
        let ledger = Ledger::builder().build();
        let CacheRead::Miss { generation } = ledger.cached_rate(Currency::Usd).unwrap() else {
            panic!("expected a cache miss");
        };

        // A rate write confirms between the reader's store fetch and its
        // cache insert. The insert carries the old generation and must not
        // resurrect the superseded rate.
        ledger.evict_cached_rate(Currency::Usd).unwrap();
        ledger
            .store_cached_rate(Currency::Usd, RateMicros::new(920_000), generation)
            .unwrap();

        assert!(matches!(
            ledger.cached_rate(Currency::Usd).unwrap(),
            CacheRead::Miss { .. }
        ));
    }
}
