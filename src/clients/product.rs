use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use tracing::instrument;

use super::PeerClient;
use crate::dto::join_ids;
use crate::dto::product::{CreateProductRequest, ProductDetails, ProductQuantity, ProductResponse};
use crate::errors::ServiceError;

pub type DynProductClient = Arc<dyn ProductClient + Send + Sync>;

/// Calls made to the Product service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductClient: Send + Sync {
    async fn details(&self, ids: Vec<i64>) -> Result<Vec<ProductDetails>, ServiceError>;

    async fn create_products(
        &self,
        products: Vec<CreateProductRequest>,
    ) -> Result<Vec<ProductResponse>, ServiceError>;

    /// Marks the products as received into the store.
    async fn receive(&self, ids: Vec<i64>) -> Result<(), ServiceError>;

    /// Takes delivered quantities off the products.
    async fn deliver(&self, items: Vec<ProductQuantity>) -> Result<(), ServiceError>;
}

pub struct HttpProductClient {
    peer: PeerClient,
}

impl HttpProductClient {
    pub fn new(peer: PeerClient) -> Self {
        Self { peer }
    }
}

#[async_trait]
impl ProductClient for HttpProductClient {
    #[instrument(skip(self), fields(peer = self.peer.service()))]
    async fn details(&self, ids: Vec<i64>) -> Result<Vec<ProductDetails>, ServiceError> {
        let request = self
            .peer
            .request(Method::GET, "/api/v1/products/details")
            .query(&[("ids", join_ids(&ids))]);
        self.peer.send_json(request).await
    }

    #[instrument(skip(self, products), fields(peer = self.peer.service(), count = products.len()))]
    async fn create_products(
        &self,
        products: Vec<CreateProductRequest>,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        let request = self
            .peer
            .request(Method::POST, "/api/v1/products")
            .json(&products);
        self.peer.send_json(request).await
    }

    #[instrument(skip(self), fields(peer = self.peer.service()))]
    async fn receive(&self, ids: Vec<i64>) -> Result<(), ServiceError> {
        let request = self
            .peer
            .request(Method::PUT, "/api/v1/products/receive")
            .json(&ids);
        self.peer.send_empty(request).await
    }

    #[instrument(skip(self, items), fields(peer = self.peer.service(), count = items.len()))]
    async fn deliver(&self, items: Vec<ProductQuantity>) -> Result<(), ServiceError> {
        let request = self
            .peer
            .request(Method::PUT, "/api/v1/products/deliver")
            .json(&items);
        self.peer.send_empty(request).await
    }
}
