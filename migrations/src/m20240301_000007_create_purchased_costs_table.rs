use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PurchasedCosts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchasedCosts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PurchasedCosts::PriceItemId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PurchasedCosts::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(PurchasedCosts::DateOfPurchase)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_purchased_costs_date")
                    .table(PurchasedCosts::Table)
                    .col(PurchasedCosts::DateOfPurchase)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PurchasedCosts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PurchasedCosts {
    Table,
    Id,
    PriceItemId,
    Quantity,
    DateOfPurchase,
}
