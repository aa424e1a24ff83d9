use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum Balances {
    Table,
    OwnerId,
    Currency,
    AmountMinor,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Balances::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Balances::OwnerId).string().not_null())
                    .col(ColumnDef::new(Balances::Currency).string().not_null())
                    .col(
                        ColumnDef::new(Balances::AmountMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Balances::UpdatedAt).timestamp().not_null())
                    .primary_key(
                        Index::create()
                            .col(Balances::OwnerId)
                            .col(Balances::Currency),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Balances::Table).to_owned())
            .await
    }
}
