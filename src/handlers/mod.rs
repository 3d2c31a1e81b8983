pub mod accountancy;
pub mod orders;
pub mod products;
pub mod store;

use std::sync::Arc;

use crate::{
    clients::PeerClients,
    db::DbPool,
    services::{
        invoices::InvoiceService, orders::OrderService, price_items::PriceItemService,
        products::ProductService, purchased_costs::PurchasedCostService, store::StoreService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub products: Arc<ProductService>,
    pub invoices: Arc<InvoiceService>,
    pub price_items: Arc<PriceItemService>,
    pub purchased_costs: Arc<PurchasedCostService>,
    pub store: Arc<StoreService>,
}

impl AppServices {
    /// Wires every service to the shared pool and the peer clients.
    pub fn new(db_pool: Arc<DbPool>, clients: PeerClients) -> Self {
        let PeerClients {
            order,
            product,
            accountancy,
            store,
        } = clients;

        Self {
            orders: Arc::new(OrderService::new(
                db_pool.clone(),
                accountancy.clone(),
                product.clone(),
            )),
            products: Arc::new(ProductService::new(db_pool.clone(), order.clone())),
            invoices: Arc::new(InvoiceService::new(
                db_pool.clone(),
                product.clone(),
                store,
                order.clone(),
            )),
            price_items: Arc::new(PriceItemService::new(db_pool.clone())),
            purchased_costs: Arc::new(PurchasedCostService::new(db_pool.clone())),
            store: Arc::new(StoreService::new(db_pool, accountancy, product, order)),
        }
    }
}
