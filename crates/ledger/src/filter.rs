//! Typed search filters.
//!
//! Search requests arrive as a JSON object mapping filter name to a list of
//! string values. Instead of interpreting that map ad hoc inside the query
//! builder, it is parsed up front into `TransactionFilter`; an unrecognized
//! key fails with `UnknownFilterKey` at parse time rather than being
//! silently ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{Currency, LedgerError, ResultLedger, TransactionKind};

/// Filters for searching transactions.
///
/// `date_from` is inclusive and `date_to` is exclusive (`[from, to)`), both
/// in UTC. List fields are allow-lists; an empty list means "no constraint".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionFilter {
    pub owner_user_ids: Vec<String>,
    pub counterparty_client_ids: Vec<Uuid>,
    pub kinds: Vec<TransactionKind>,
    pub currencies: Vec<Currency>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    /// Parses the request-level `name -> [values]` map.
    ///
    /// Recognized keys: `userIds`, `clientIds`, `kinds`, `currencies`,
    /// `dateFrom`, `dateTo`.
    pub fn from_spec(spec: &BTreeMap<String, Vec<String>>) -> ResultLedger<Self> {
        let mut filter = TransactionFilter::default();

        for (key, values) in spec {
            match key.as_str() {
                "userIds" => filter.owner_user_ids = values.clone(),
                "clientIds" => {
                    filter.counterparty_client_ids = values
                        .iter()
                        .map(|v| {
                            Uuid::parse_str(v.trim()).map_err(|_| {
                                LedgerError::Validation(format!("invalid client id: {v}"))
                            })
                        })
                        .collect::<ResultLedger<Vec<_>>>()?;
                }
                "kinds" => {
                    filter.kinds = values
                        .iter()
                        .map(|v| TransactionKind::try_from(v.trim()))
                        .collect::<ResultLedger<Vec<_>>>()?;
                }
                "currencies" => {
                    filter.currencies = values
                        .iter()
                        .map(|v| Currency::try_from(v.as_str()))
                        .collect::<ResultLedger<Vec<_>>>()?;
                }
                "dateFrom" => filter.date_from = Some(parse_single_date(key, values)?),
                "dateTo" => filter.date_to = Some(parse_single_date(key, values)?),
                other => return Err(LedgerError::UnknownFilterKey(other.to_string())),
            }
        }

        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to)
            && from >= to
        {
            return Err(LedgerError::Validation(
                "invalid range: dateFrom must be < dateTo".to_string(),
            ));
        }

        Ok(filter)
    }
}

fn parse_single_date(key: &str, values: &[String]) -> ResultLedger<DateTime<Utc>> {
    let [value] = values else {
        return Err(LedgerError::Validation(format!(
            "{key} expects exactly one value"
        )));
    };
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Date-only inputs mean midnight UTC.
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        && let Some(dt) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(dt.and_utc());
    }

    Err(LedgerError::Validation(format!("invalid date: {value}")))
}

/// Sortable transaction fields exposed to search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    Amount,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

/// Sort specification parsed from `field` or `field,dir`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub dir: SortDir,
}

impl SortSpec {
    pub fn parse(input: &str) -> ResultLedger<Self> {
        let mut parts = input.split(',').map(str::trim);
        let field = match parts.next() {
            None | Some("") | Some("createdAt") => SortField::CreatedAt,
            Some("amount") => SortField::Amount,
            Some(other) => {
                return Err(LedgerError::Validation(format!(
                    "unsupported sort field: {other}"
                )));
            }
        };
        let dir = match parts.next() {
            None | Some("desc") => SortDir::Desc,
            Some("asc") => SortDir::Asc,
            Some(other) => {
                return Err(LedgerError::Validation(format!(
                    "unsupported sort direction: {other}"
                )));
            }
        };
        if parts.next().is_some() {
            return Err(LedgerError::Validation("invalid sort spec".to_string()));
        }
        Ok(Self { field, dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(k, vs)| {
                (
                    k.to_string(),
                    vs.iter().map(ToString::to_string).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn parses_recognized_keys() {
        let id = Uuid::new_v4();
        let spec = spec(&[
            ("userIds", &["7", "9"]),
            ("clientIds", &[&id.to_string()]),
            ("kinds", &["sale", "purchase"]),
            ("currencies", &["uah", "USD"]),
            ("dateFrom", &["2026-01-01"]),
            ("dateTo", &["2026-02-01T00:00:00Z"]),
        ]);

        let filter = TransactionFilter::from_spec(&spec).unwrap();
        assert_eq!(filter.owner_user_ids, vec!["7", "9"]);
        assert_eq!(filter.counterparty_client_ids, vec![id]);
        assert_eq!(
            filter.kinds,
            vec![TransactionKind::Sale, TransactionKind::Purchase]
        );
        assert_eq!(filter.currencies, vec![Currency::Uah, Currency::Usd]);
        assert!(filter.date_from.unwrap() < filter.date_to.unwrap());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let spec = spec(&[("productIds", &["1"])]);
        assert_eq!(
            TransactionFilter::from_spec(&spec),
            Err(LedgerError::UnknownFilterKey("productIds".to_string()))
        );
    }

    #[test]
    fn invalid_date_and_inverted_range_are_rejected() {
        assert!(TransactionFilter::from_spec(&spec(&[("dateFrom", &["soon"])])).is_err());
        let inverted = spec(&[("dateFrom", &["2026-02-01"]), ("dateTo", &["2026-01-01"])]);
        assert!(TransactionFilter::from_spec(&inverted).is_err());
    }

    #[test]
    fn sort_spec_parses_field_and_direction() {
        assert_eq!(SortSpec::parse("createdAt,desc").unwrap(), SortSpec::default());
        assert_eq!(
            SortSpec::parse("amount,asc").unwrap(),
            SortSpec {
                field: SortField::Amount,
                dir: SortDir::Asc
            }
        );
        assert!(SortSpec::parse("note,asc").is_err());
        assert!(SortSpec::parse("amount,sideways").is_err());
    }
}
