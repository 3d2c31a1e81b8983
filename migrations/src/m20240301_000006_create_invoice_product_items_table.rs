use sea_orm_migration::prelude::*;

use super::m20240301_000005_create_invoices_table::Invoices;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InvoiceProductItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InvoiceProductItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InvoiceProductItems::InvoiceId).big_integer().not_null())
                    .col(ColumnDef::new(InvoiceProductItems::PriceItemId).big_integer().not_null())
                    .col(ColumnDef::new(InvoiceProductItems::ProductId).big_integer().not_null())
                    .col(ColumnDef::new(InvoiceProductItems::Name).string().not_null())
                    .col(
                        ColumnDef::new(InvoiceProductItems::Price)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(InvoiceProductItems::Quantity).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoice_product_items_invoice_id")
                            .from(InvoiceProductItems::Table, InvoiceProductItems::InvoiceId)
                            .to(Invoices::Table, Invoices::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InvoiceProductItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum InvoiceProductItems {
    Table,
    Id,
    InvoiceId,
    PriceItemId,
    ProductId,
    Name,
    Price,
    Quantity,
}
