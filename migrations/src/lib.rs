pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_products_table;
mod m20240301_000002_create_orders_table;
mod m20240301_000003_create_order_items_table;
mod m20240301_000004_create_price_items_table;
mod m20240301_000005_create_invoices_table;
mod m20240301_000006_create_invoice_product_items_table;
mod m20240301_000007_create_purchased_costs_table;
mod m20240301_000008_create_store_table;
mod m20240301_000009_create_transfer_certificates_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_products_table::Migration),
            Box::new(m20240301_000002_create_orders_table::Migration),
            Box::new(m20240301_000003_create_order_items_table::Migration),
            Box::new(m20240301_000004_create_price_items_table::Migration),
            Box::new(m20240301_000005_create_invoices_table::Migration),
            Box::new(m20240301_000006_create_invoice_product_items_table::Migration),
            Box::new(m20240301_000007_create_purchased_costs_table::Migration),
            Box::new(m20240301_000008_create_store_table::Migration),
            Box::new(m20240301_000009_create_transfer_certificates_table::Migration),
        ]
    }
}
