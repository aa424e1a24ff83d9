use chrono::Utc;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use ledger::{
    CorrectAmountCmd, Currency, DepositCmd, Ledger, LedgerError, MoneyCents, PurchaseCmd,
    RateMicros, SaleCmd, SortSpec, TransactionFilter, TransactionKind, WithdrawCmd,
};
use migration::MigratorTrait;

async fn seed(db: &DatabaseConnection) -> Uuid {
    let backend = db.get_database_backend();
    for (username, admin) in [("alice", false), ("boss", true)] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password, admin) VALUES (?, ?, ?)",
            vec![username.into(), "password".into(), admin.into()],
        ))
        .await
        .unwrap();
    }

    let client_id = Uuid::new_v4();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO clients (id, name) VALUES (?, ?)",
        vec![client_id.to_string().into(), "Fenix Trade".into()],
    ))
    .await
    .unwrap();
    client_id
}

async fn ledger_with_db() -> (Ledger, DatabaseConnection, Uuid) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let client_id = seed(&db).await;
    let ledger = Ledger::builder().database(db.clone()).build();
    (ledger, db, client_id)
}

async fn ledger_with_file_db() -> (Ledger, DatabaseConnection, std::path::PathBuf) {
    let root =
        std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("ledger_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    seed(&db).await;
    let ledger = Ledger::builder().database(db.clone()).build();
    (ledger, db, path)
}

fn cents(s: &str) -> MoneyCents {
    s.parse().unwrap()
}

fn rate(s: &str) -> RateMicros {
    s.parse().unwrap()
}

#[tokio::test]
async fn deposit_creates_transaction_and_balance() {
    let (ledger, _db, _) = ledger_with_db().await;

    ledger
        .deposit(DepositCmd::new("alice", "alice", cents("100.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();

    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("100.00")
    );

    let txs = ledger.transactions_for_owner("alice").await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].kind, TransactionKind::Deposit);
    assert_eq!(txs[0].amount, cents("100.00"));
    assert_eq!(txs[0].revision, 0);
}

#[tokio::test]
async fn withdrawal_reduces_the_balance_and_may_go_negative() {
    let (ledger, _db, _) = ledger_with_db().await;

    ledger
        .deposit(DepositCmd::new("alice", "alice", cents("100.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();
    ledger
        .withdraw(WithdrawCmd::new("alice", "alice", cents("30.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("70.00")
    );

    // No overdraft guard: the first event on a currency may be negative.
    ledger
        .withdraw(WithdrawCmd::new("alice", "alice", cents("5.00"), Currency::Usd, Utc::now()))
        .await
        .unwrap();
    assert_eq!(
        ledger.balance("alice", Currency::Usd).await.unwrap(),
        cents("-5.00")
    );
}

#[tokio::test]
async fn writes_require_known_users() {
    let (ledger, _db, _) = ledger_with_db().await;

    let err = ledger
        .deposit(DepositCmd::new("ghost", "alice", cents("1.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("user ghost".to_string()));
}

#[tokio::test]
async fn correction_applies_only_the_delta() {
    let (ledger, _db, _) = ledger_with_db().await;

    let id = ledger
        .deposit(DepositCmd::new("alice", "alice", cents("100.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();

    let delta = ledger
        .correct_amount(CorrectAmountCmd::new(id, "alice", cents("120.00")))
        .await
        .unwrap();
    assert_eq!(delta, cents("20.00"));
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("120.00")
    );

    let txs = ledger.transactions_for_owner("alice").await.unwrap();
    assert_eq!(txs[0].amount, cents("120.00"));
    assert_eq!(txs[0].revision, 1);

    // Correcting to the current magnitude is a no-op.
    let delta = ledger
        .correct_amount(CorrectAmountCmd::new(id, "alice", cents("120.00")))
        .await
        .unwrap();
    assert!(delta.is_zero());
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("120.00")
    );
    let txs = ledger.transactions_for_owner("alice").await.unwrap();
    assert_eq!(txs[0].revision, 1);
}

#[tokio::test]
async fn deposit_withdraw_correct_scenario_agrees_with_the_log() {
    let (ledger, _db, _) = ledger_with_db().await;

    let deposit_id = ledger
        .deposit(DepositCmd::new("alice", "alice", cents("100.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();
    ledger
        .withdraw(WithdrawCmd::new("alice", "alice", cents("30.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("70.00")
    );

    ledger
        .correct_amount(CorrectAmountCmd::new(deposit_id, "alice", cents("120.00")))
        .await
        .unwrap();
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("90.00")
    );
}

#[tokio::test]
async fn correction_keeps_the_kind_sign() {
    let (ledger, _db, _) = ledger_with_db().await;

    let id = ledger
        .withdraw(WithdrawCmd::new("alice", "alice", cents("30.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();
    ledger
        .correct_amount(CorrectAmountCmd::new(id, "alice", cents("50.00")))
        .await
        .unwrap();

    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("-50.00")
    );
    let txs = ledger.transactions_for_owner("alice").await.unwrap();
    assert_eq!(txs[0].amount, cents("-50.00"));
}

#[tokio::test]
async fn correction_rejects_non_positive_magnitudes() {
    let (ledger, _db, _) = ledger_with_db().await;

    let id = ledger
        .deposit(DepositCmd::new("alice", "alice", cents("100.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();
    assert!(
        ledger
            .correct_amount(CorrectAmountCmd::new(id, "alice", MoneyCents::ZERO))
            .await
            .is_err()
    );
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("100.00")
    );
}

#[tokio::test]
async fn propagate_is_idempotent() {
    let (ledger, _db, _) = ledger_with_db().await;

    let id = ledger
        .deposit(DepositCmd::new("alice", "alice", cents("100.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();

    ledger.propagate(id).await.unwrap();
    ledger.propagate(id).await.unwrap();

    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("100.00")
    );
}

#[tokio::test]
async fn propagate_reapplies_a_lost_delta() {
    let (ledger, db, _) = ledger_with_db().await;

    let id = ledger
        .deposit(DepositCmd::new("alice", "alice", cents("100.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();

    // Stage the failure mode: the ledger row is committed but its balance
    // delta never landed.
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        "DELETE FROM balance_postings".to_string(),
    ))
    .await
    .unwrap();
    db.execute(Statement::from_string(
        backend,
        "UPDATE balances SET amount_minor = 0".to_string(),
    ))
    .await
    .unwrap();

    ledger.propagate(id).await.unwrap();
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("100.00")
    );

    // And only once.
    ledger.propagate(id).await.unwrap();
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("100.00")
    );
}

#[tokio::test]
async fn propagate_unknown_transaction_is_not_found() {
    let (ledger, _db, _) = ledger_with_db().await;
    let missing = Uuid::new_v4();
    let err = ledger.propagate(missing).await.unwrap_err();
    assert_eq!(err, LedgerError::NotFound(format!("transaction {missing}")));
}

#[tokio::test]
async fn reconcile_overwrites_a_drifted_balance() {
    let (ledger, db, _) = ledger_with_db().await;

    ledger
        .deposit(DepositCmd::new("alice", "alice", cents("100.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "UPDATE balances SET amount_minor = 424242".to_string(),
    ))
    .await
    .unwrap();

    ledger.reconcile_balances("alice").await.unwrap();
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("100.00")
    );
}

#[tokio::test]
async fn reconcile_backfills_lost_postings_without_double_apply() {
    let (ledger, db, _) = ledger_with_db().await;

    let id = ledger
        .deposit(DepositCmd::new("alice", "alice", cents("100.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();

    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        "DELETE FROM balance_postings".to_string(),
    ))
    .await
    .unwrap();
    db.execute(Statement::from_string(
        backend,
        "UPDATE balances SET amount_minor = 0".to_string(),
    ))
    .await
    .unwrap();

    ledger.reconcile_balances("alice").await.unwrap();
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("100.00")
    );

    // The backfilled posting means a later propagate finds nothing to do.
    ledger.propagate(id).await.unwrap();
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("100.00")
    );
}

#[tokio::test]
async fn balance_not_found_is_distinct_from_zero() {
    let (ledger, _db, _) = ledger_with_db().await;

    let err = ledger.balance("alice", Currency::Uah).await.unwrap_err();
    assert_eq!(err, LedgerError::BalanceNotFound("alice/UAH".to_string()));

    ledger
        .deposit(DepositCmd::new("alice", "alice", cents("10.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();
    ledger
        .withdraw(WithdrawCmd::new("alice", "alice", cents("10.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();
    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        MoneyCents::ZERO
    );
}

#[tokio::test]
async fn owner_cleanup_drops_transactions_and_balances() {
    let (ledger, _db, _) = ledger_with_db().await;

    ledger
        .deposit(DepositCmd::new("alice", "alice", cents("10.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();

    ledger.delete_transactions_for_owner("alice").await.unwrap();
    ledger.delete_balances_for_owner("alice").await.unwrap();

    assert!(ledger.transactions_for_owner("alice").await.unwrap().is_empty());
    assert!(matches!(
        ledger.balance("alice", Currency::Uah).await,
        Err(LedgerError::BalanceNotFound(_))
    ));
}

#[tokio::test]
async fn eur_rate_is_fixed_and_not_editable() {
    let (ledger, _db, _) = ledger_with_db().await;

    assert_eq!(
        ledger.rate_to_reporting(Currency::Eur).await.unwrap(),
        RateMicros::ONE
    );
    assert!(matches!(
        ledger.set_rate(Currency::Eur, rate("1.10"), "boss").await,
        Err(LedgerError::InvalidRate(_))
    ));
}

#[tokio::test]
async fn missing_rate_is_an_error_not_a_guess() {
    let (ledger, _db, _) = ledger_with_db().await;
    assert_eq!(
        ledger.rate_to_reporting(Currency::Usd).await.unwrap_err(),
        LedgerError::RateNotFound("USD".to_string())
    );
}

#[tokio::test]
async fn set_rate_validates_and_persists() {
    let (ledger, _db, _) = ledger_with_db().await;

    assert!(matches!(
        ledger.set_rate(Currency::Usd, RateMicros::new(0), "boss").await,
        Err(LedgerError::InvalidRate(_))
    ));
    assert!(matches!(
        ledger.set_rate(Currency::Usd, RateMicros::new(-5), "boss").await,
        Err(LedgerError::InvalidRate(_))
    ));

    let stored = ledger
        .set_rate(Currency::Usd, rate("0.92"), "boss")
        .await
        .unwrap();
    assert_eq!(stored.rate, rate("0.92"));
    assert_eq!(stored.updated_by, "boss");

    assert_eq!(
        ledger.rate_to_reporting(Currency::Usd).await.unwrap(),
        rate("0.92")
    );

    let listed = ledger.list_rates().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].currency, Currency::Usd);
}

#[tokio::test]
async fn rate_update_is_visible_immediately() {
    let (ledger, _db, _) = ledger_with_db().await;

    ledger.set_rate(Currency::Usd, rate("0.92"), "boss").await.unwrap();
    // Warm the cache.
    ledger.rate_to_reporting(Currency::Usd).await.unwrap();

    ledger.set_rate(Currency::Usd, rate("0.95"), "boss").await.unwrap();
    assert_eq!(
        ledger.rate_to_reporting(Currency::Usd).await.unwrap(),
        rate("0.95")
    );
}

#[tokio::test]
async fn purchase_with_quantity_records_the_unit_price() {
    let (ledger, _db, _) = ledger_with_db().await;

    ledger
        .record_purchase(
            PurchaseCmd::new("alice", "alice", cents("10.00"), Currency::Usd, Utc::now())
                .quantity(3),
        )
        .await
        .unwrap();

    let txs = ledger.transactions_for_owner("alice").await.unwrap();
    let description = txs[0].description.clone().unwrap();
    // 10.00 / 3, rounded up at the sixth digit.
    assert!(description.contains("3.333334"), "{description}");
    assert_eq!(txs[0].amount, cents("-10.00"));
}

#[tokio::test]
async fn search_filters_paginates_and_enriches() {
    let (ledger, _db, client_id) = ledger_with_db().await;

    for i in 1..=5i64 {
        ledger
            .record_sale(
                SaleCmd::new(
                    "alice",
                    "alice",
                    MoneyCents::new(i * 1000),
                    Currency::Uah,
                    Utc::now(),
                )
                .counterparty(client_id),
            )
            .await
            .unwrap();
    }
    ledger
        .record_purchase(PurchaseCmd::new("alice", "boss", cents("7.00"), Currency::Usd, Utc::now()))
        .await
        .unwrap();

    let mut spec = std::collections::BTreeMap::new();
    spec.insert("kinds".to_string(), vec!["sale".to_string()]);
    let filter = TransactionFilter::from_spec(&spec).unwrap();

    let page = ledger
        .search(&filter, 0, 2, SortSpec::parse("amount,asc").unwrap())
        .await
        .unwrap();
    assert_eq!(page.total_items, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].transaction.amount, cents("10.00"));
    assert_eq!(
        page.items[0].counterparty_name.as_deref(),
        Some("Fenix Trade")
    );

    let last = ledger
        .search(&filter, 2, 2, SortSpec::parse("amount,asc").unwrap())
        .await
        .unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].transaction.amount, cents("50.00"));

    // A counterparty without a client row degrades to no name.
    ledger
        .record_sale(
            SaleCmd::new("alice", "alice", cents("1.00"), Currency::Uah, Utc::now())
                .counterparty(Uuid::new_v4()),
        )
        .await
        .unwrap();
    let all = ledger
        .search(&filter, 0, 10, SortSpec::default())
        .await
        .unwrap();
    assert!(
        all.items
            .iter()
            .any(|item| item.counterparty_name.is_none())
    );
}

#[tokio::test]
async fn search_rejects_bad_page_sizes() {
    let (ledger, _db, _) = ledger_with_db().await;
    let filter = TransactionFilter::default();
    assert!(ledger.search(&filter, 0, 0, SortSpec::default()).await.is_err());
    assert!(ledger.search(&filter, 0, 500, SortSpec::default()).await.is_err());
}

#[tokio::test]
async fn report_totals_convert_each_row_before_summing() {
    let (ledger, _db, _) = ledger_with_db().await;

    ledger.set_rate(Currency::Usd, rate("0.92"), "boss").await.unwrap();
    ledger
        .deposit(DepositCmd::new("alice", "alice", cents("10.00"), Currency::Usd, Utc::now()))
        .await
        .unwrap();
    ledger
        .deposit(DepositCmd::new("boss", "boss", cents("5.00"), Currency::Eur, Utc::now()))
        .await
        .unwrap();
    ledger
        .withdraw(WithdrawCmd::new("alice", "alice", cents("1.00"), Currency::Eur, Utc::now()))
        .await
        .unwrap();

    let totals = ledger
        .report_totals(&TransactionFilter::default())
        .await
        .unwrap();
    // 9.20 + 5.00 - 1.00
    assert_eq!(totals.total, cents("13.20"));

    let alice = totals
        .by_owner
        .iter()
        .find(|t| t.owner_user_id == "alice")
        .unwrap();
    assert_eq!(alice.total, cents("8.20"));

    let deposits = totals
        .by_kind
        .iter()
        .find(|t| t.kind == TransactionKind::Deposit)
        .unwrap();
    assert_eq!(deposits.total, cents("14.20"));
}

#[tokio::test]
async fn report_totals_fail_without_a_stored_rate() {
    let (ledger, _db, _) = ledger_with_db().await;

    ledger
        .deposit(DepositCmd::new("alice", "alice", cents("10.00"), Currency::Uah, Utc::now()))
        .await
        .unwrap();

    assert_eq!(
        ledger
            .report_totals(&TransactionFilter::default())
            .await
            .unwrap_err(),
        LedgerError::RateNotFound("UAH".to_string())
    );
}

#[tokio::test]
async fn concurrent_deltas_all_land() {
    let (ledger, db, path) = ledger_with_file_db().await;
    let ledger = std::sync::Arc::new(ledger);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .apply_delta("alice", Currency::Uah, cents("1.00"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        ledger.balance("alice", Currency::Uah).await.unwrap(),
        cents("10.00")
    );

    drop(ledger);
    db.close().await.unwrap();
    let _ = std::fs::remove_file(path);
}
