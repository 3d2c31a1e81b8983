use async_trait::async_trait;
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use super::PeerClient;
use crate::entities::order::OrderStatus;
use crate::errors::ServiceError;
use crate::proto::{ProductQuantityMap, PROTOBUF_CONTENT_TYPE};

pub type DynOrderClient = Arc<dyn OrderClient + Send + Sync>;

/// Calls made to the Order service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderClient: Send + Sync {
    /// Moves the order to `status`.
    async fn change_status(&self, order_id: i64, status: OrderStatus) -> Result<(), ServiceError>;

    /// Bought quantity per product id over all live orders.
    async fn total_buys(&self) -> Result<HashMap<i64, i32>, ServiceError>;
}

pub struct HttpOrderClient {
    peer: PeerClient,
}

impl HttpOrderClient {
    pub fn new(peer: PeerClient) -> Self {
        Self { peer }
    }
}

#[async_trait]
impl OrderClient for HttpOrderClient {
    #[instrument(skip(self), fields(peer = self.peer.service()))]
    async fn change_status(&self, order_id: i64, status: OrderStatus) -> Result<(), ServiceError> {
        let request = self
            .peer
            .request(
                Method::PUT,
                &format!("/api/v1/orders/change-status/{}", order_id),
            )
            .json(&status);
        self.peer.send_empty(request).await
    }

    #[instrument(skip(self), fields(peer = self.peer.service()))]
    async fn total_buys(&self) -> Result<HashMap<i64, i32>, ServiceError> {
        let request = self
            .peer
            .request(Method::GET, "/api/v1/orders/total-buys")
            .header(reqwest::header::ACCEPT, PROTOBUF_CONTENT_TYPE);
        let map: ProductQuantityMap = self.peer.send_protobuf(request).await?;
        Ok(map.quantities)
    }
}
