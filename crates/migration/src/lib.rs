pub use sea_orm_migration::prelude::*;

mod m20260110_000001_users;
mod m20260110_000002_clients;
mod m20260110_000003_transactions;
mod m20260110_000004_balances;
mod m20260110_000005_exchange_rates;
mod m20260110_000006_balance_postings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260110_000001_users::Migration),
            Box::new(m20260110_000002_clients::Migration),
            Box::new(m20260110_000003_transactions::Migration),
            Box::new(m20260110_000004_balances::Migration),
            Box::new(m20260110_000005_exchange_rates::Migration),
            Box::new(m20260110_000006_balance_postings::Migration),
        ]
    }
}
