use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use super::PeerClient;
use crate::dto::accountancy::{CreateOutcomeInvoiceRequest, InvoiceResponse};
use crate::dto::join_ids;
use crate::errors::ServiceError;
use crate::proto::{InvoiceDetails, PROTOBUF_CONTENT_TYPE};

pub type DynAccountancyClient = Arc<dyn AccountancyClient + Send + Sync>;

/// Calls made to the Accountancy service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountancyClient: Send + Sync {
    async fn create_outcome_invoice(
        &self,
        request: CreateOutcomeInvoiceRequest,
    ) -> Result<InvoiceResponse, ServiceError>;

    async fn invoice_details(&self, invoice_id: i64) -> Result<InvoiceDetails, ServiceError>;

    async fn invoice_details_by_order(&self, order_id: i64)
        -> Result<InvoiceDetails, ServiceError>;

    /// Sale price of the newest price item of every product.
    async fn sale_prices(&self, product_ids: Vec<i64>)
        -> Result<HashMap<i64, Decimal>, ServiceError>;
}

pub struct HttpAccountancyClient {
    peer: PeerClient,
}

impl HttpAccountancyClient {
    pub fn new(peer: PeerClient) -> Self {
        Self { peer }
    }

    async fn details(&self, path: String) -> Result<InvoiceDetails, ServiceError> {
        let request = self
            .peer
            .request(Method::GET, &path)
            .header(reqwest::header::ACCEPT, PROTOBUF_CONTENT_TYPE);
        self.peer.send_protobuf(request).await
    }
}

#[async_trait]
impl AccountancyClient for HttpAccountancyClient {
    #[instrument(skip(self, request), fields(peer = self.peer.service(), order_id = request.order_id))]
    async fn create_outcome_invoice(
        &self,
        request: CreateOutcomeInvoiceRequest,
    ) -> Result<InvoiceResponse, ServiceError> {
        let builder = self
            .peer
            .request(Method::POST, "/api/v1/accountancy/invoice/outcome")
            .json(&request);
        self.peer.send_json(builder).await
    }

    #[instrument(skip(self), fields(peer = self.peer.service()))]
    async fn invoice_details(&self, invoice_id: i64) -> Result<InvoiceDetails, ServiceError> {
        self.details(format!("/api/v1/accountancy/invoice/details/{}", invoice_id))
            .await
    }

    #[instrument(skip(self), fields(peer = self.peer.service()))]
    async fn invoice_details_by_order(
        &self,
        order_id: i64,
    ) -> Result<InvoiceDetails, ServiceError> {
        self.details(format!(
            "/api/v1/accountancy/invoice/details/order-id/{}",
            order_id
        ))
        .await
    }

    #[instrument(skip(self), fields(peer = self.peer.service()))]
    async fn sale_prices(
        &self,
        product_ids: Vec<i64>,
    ) -> Result<HashMap<i64, Decimal>, ServiceError> {
        let request = self
            .peer
            .request(Method::GET, "/api/v1/accountancy/sale-price")
            .query(&[("productIds", join_ids(&product_ids))]);
        self.peer.send_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::InvoiceDetailsItem;
    use prost::Message;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpAccountancyClient {
        HttpAccountancyClient::new(
            PeerClient::new("accountancy", server.uri(), Duration::from_secs(2)).unwrap(),
        )
    }

    #[tokio::test]
    async fn invoice_details_by_order_decodes_protobuf() {
        let server = MockServer::start().await;
        let details = InvoiceDetails {
            invoice_id: 9,
            order_id: Some(4),
            status: "PAID".into(),
            invoice_type: "OUTCOME".into(),
            items: vec![InvoiceDetailsItem {
                price_item_id: 2,
                product_id: 1,
                name: "Aspirin".into(),
                quantity: 3,
                price: "30.60".into(),
            }],
            total: "91.80".into(),
        };
        Mock::given(method("GET"))
            .and(path("/api/v1/accountancy/invoice/details/order-id/4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(details.encode_to_vec(), PROTOBUF_CONTENT_TYPE),
            )
            .mount(&server)
            .await;

        let fetched = client(&server).invoice_details_by_order(4).await.unwrap();
        assert_eq!(fetched, details);
    }

    #[tokio::test]
    async fn sale_prices_reads_map_keyed_by_product() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accountancy/sale-price"))
            .and(query_param("productIds", "1,2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"1": "30.60", "2": "46.15"}
            })))
            .mount(&server)
            .await;

        let prices = client(&server).sale_prices(vec![1, 2]).await.unwrap();
        assert_eq!(prices.get(&1), Some(&dec!(30.60)));
        assert_eq!(prices.get(&2), Some(&dec!(46.15)));
    }
}
