pub mod invoice;
pub mod invoice_item;
pub mod order;
pub mod order_item;
pub mod price_item;
pub mod product;
pub mod purchased_cost;
pub mod store_item;
pub mod transfer_certificate;
