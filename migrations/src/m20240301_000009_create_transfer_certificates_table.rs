use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TransferCertificates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransferCertificates::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TransferCertificates::CertificateNumber)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(TransferCertificates::OrderId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TransferCertificates::InvoiceId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransferCertificates::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TransferCertificates::Comment).string().null())
                    .col(
                        ColumnDef::new(TransferCertificates::CreatedAt)
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
                    .name("idx_transfer_certificates_order_id")
                    .table(TransferCertificates::Table)
                    .col(TransferCertificates::OrderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TransferCertificates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TransferCertificates {
    Table,
    Id,
    CertificateNumber,
    OrderId,
    InvoiceId,
    Status,
    Comment,
    CreatedAt,
}
