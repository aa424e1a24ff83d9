use sea_orm_migration::prelude::*;

use crate::m20260110_000003_transactions::Transactions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum BalancePostings {
    Table,
    Id,
    TransactionId,
    Revision,
    OwnerId,
    Currency,
    DeltaMinor,
    PostedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BalancePostings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BalancePostings::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BalancePostings::TransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalancePostings::Revision)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BalancePostings::OwnerId).string().not_null())
                    .col(
                        ColumnDef::new(BalancePostings::Currency)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalancePostings::DeltaMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalancePostings::PostedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-balance_postings-transaction_id")
                            .from(BalancePostings::Table, BalancePostings::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // The propagation idempotency key.
        manager
            .create_index(
                Index::create()
                    .name("uidx-balance_postings-transaction_id-revision")
                    .table(BalancePostings::Table)
                    .col(BalancePostings::TransactionId)
                    .col(BalancePostings::Revision)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-balance_postings-owner_id")
                    .table(BalancePostings::Table)
                    .col(BalancePostings::OwnerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BalancePostings::Table).to_owned())
            .await
    }
}
