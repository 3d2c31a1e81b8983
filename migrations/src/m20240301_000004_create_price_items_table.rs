use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PriceItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PriceItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PriceItems::ProductId).big_integer().not_null())
                    .col(ColumnDef::new(PriceItems::Price).decimal_len(16, 2).not_null())
                    .col(
                        ColumnDef::new(PriceItems::Markup)
                            .decimal_len(16, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PriceItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceItems::UpdatedAt)
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
                    .name("idx_price_items_product_id")
                    .table(PriceItems::Table)
                    .col(PriceItems::ProductId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PriceItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PriceItems {
    Table,
    Id,
    ProductId,
    Price,
    Markup,
    CreatedAt,
    UpdatedAt,
}
