use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use tracing::instrument;

use super::PeerClient;
use crate::dto::store::{CheckTransferResponse, StoreQuantityRequest, StoreResponse};
use crate::errors::ServiceError;

pub type DynStoreClient = Arc<dyn StoreClient + Send + Sync>;

/// Calls made to the Store service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn reduce(
        &self,
        items: Vec<StoreQuantityRequest>,
    ) -> Result<Vec<StoreResponse>, ServiceError>;

    async fn increase(
        &self,
        items: Vec<StoreQuantityRequest>,
    ) -> Result<Vec<StoreResponse>, ServiceError>;

    /// Fails with a conflict once the order has been delivered.
    async fn check_transfer(&self, order_id: i64) -> Result<CheckTransferResponse, ServiceError>;
}

pub struct HttpStoreClient {
    peer: PeerClient,
}

impl HttpStoreClient {
    pub fn new(peer: PeerClient) -> Self {
        Self { peer }
    }

    async fn put_quantities(
        &self,
        path: &str,
        items: &[StoreQuantityRequest],
    ) -> Result<Vec<StoreResponse>, ServiceError> {
        let request = self.peer.request(Method::PUT, path).json(items);
        self.peer.send_json(request).await
    }
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    #[instrument(skip(self, items), fields(peer = self.peer.service(), count = items.len()))]
    async fn reduce(
        &self,
        items: Vec<StoreQuantityRequest>,
    ) -> Result<Vec<StoreResponse>, ServiceError> {
        self.put_quantities("/api/v1/store/reduce", &items).await
    }

    #[instrument(skip(self, items), fields(peer = self.peer.service(), count = items.len()))]
    async fn increase(
        &self,
        items: Vec<StoreQuantityRequest>,
    ) -> Result<Vec<StoreResponse>, ServiceError> {
        self.put_quantities("/api/v1/store/increase", &items).await
    }

    #[instrument(skip(self), fields(peer = self.peer.service()))]
    async fn check_transfer(&self, order_id: i64) -> Result<CheckTransferResponse, ServiceError> {
        let request = self.peer.request(
            Method::GET,
            &format!("/api/v1/store/check-transfer/{}", order_id),
        );
        self.peer.send_json(request).await
    }
}
