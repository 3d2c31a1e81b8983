//! HTTP clients for the peer services.
//!
//! Every service reaches the others through these clients only. Calls forward the current
//! `x-request-id`; transport failures become [`ServiceError::GatewayTimeout`] and error
//! responses are mapped back onto the matching [`ServiceError`] variant.

pub mod accountancy;
pub mod order;
pub mod product;
pub mod store;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ClientsConfig;
use crate::errors::{ErrorResponse, ServiceError};
use crate::middleware_helpers::request_id::REQUEST_ID_HEADER;
use crate::ApiResponse;

pub use accountancy::{AccountancyClient, DynAccountancyClient, HttpAccountancyClient};
pub use order::{DynOrderClient, HttpOrderClient, OrderClient};
pub use product::{DynProductClient, HttpProductClient, ProductClient};
pub use store::{DynStoreClient, HttpStoreClient, StoreClient};

/// Shared plumbing of the typed clients: base URL, timeout and response decoding.
#[derive(Clone, Debug)]
pub struct PeerClient {
    service: &'static str,
    base_url: String,
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new(
        service: &'static str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("Failed to build {} client: {}", service, e))
            })?;

        Ok(Self {
            service,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(service = self.service, %method, %url, "Calling peer service");

        let builder = self.http.request(method, url);
        match crate::tracing::current_request_id() {
            Some(request_id) => builder.header(REQUEST_ID_HEADER, request_id.as_str()),
            None => builder,
        }
    }

    /// Sends the request and unwraps the `data` of the JSON envelope.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ServiceError> {
        let response = self.execute(builder).await?;
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            ServiceError::SerializationError(format!(
                "Malformed response from {} service: {}",
                self.service, e
            ))
        })?;

        envelope.data.ok_or_else(|| {
            ServiceError::ServiceUnavailable(format!(
                "{} service returned an empty response",
                self.service
            ))
        })
    }

    /// Sends the request, discarding any successful body.
    pub async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ServiceError> {
        self.execute(builder).await.map(|_| ())
    }

    /// Sends the request and decodes a protobuf body.
    pub async fn send_protobuf<M: prost::Message + Default>(
        &self,
        builder: RequestBuilder,
    ) -> Result<M, ServiceError> {
        let response = self.execute(builder).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        Ok(M::decode(bytes)?)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response, ServiceError> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(self.error_from_response(response).await)
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ServiceError {
        warn!(service = self.service, error = %err, "Peer service unreachable");
        if err.is_timeout() {
            ServiceError::GatewayTimeout(format!("{} service timed out", self.service))
        } else {
            ServiceError::GatewayTimeout(format!("{} service is unreachable: {}", self.service, err))
        }
    }

    async fn error_from_response(&self, response: Response) -> ServiceError {
        let status = response.status();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        };

        warn!(
            service = self.service,
            status = status.as_u16(),
            message = %message,
            "Peer service returned an error"
        );

        match status {
            StatusCode::BAD_REQUEST => ServiceError::BadRequest(message),
            StatusCode::PAYMENT_REQUIRED => ServiceError::PaymentFailed(message),
            StatusCode::NOT_FOUND => ServiceError::NotFound(message),
            StatusCode::CONFLICT => ServiceError::Conflict(message),
            StatusCode::UNPROCESSABLE_ENTITY => ServiceError::InsufficientStock(message),
            _ => ServiceError::ServiceUnavailable(format!(
                "{} service responded with {}: {}",
                self.service,
                status.as_u16(),
                message
            )),
        }
    }
}

/// The four peer clients, as used by the services.
#[derive(Clone)]
pub struct PeerClients {
    pub order: DynOrderClient,
    pub product: DynProductClient,
    pub accountancy: DynAccountancyClient,
    pub store: DynStoreClient,
}

impl PeerClients {
    pub fn from_config(config: &ClientsConfig) -> Result<Self, ServiceError> {
        let timeout = config.timeout();
        Ok(Self {
            order: Arc::new(HttpOrderClient::new(PeerClient::new(
                "order",
                &config.order_url,
                timeout,
            )?)),
            product: Arc::new(HttpProductClient::new(PeerClient::new(
                "product",
                &config.product_url,
                timeout,
            )?)),
            accountancy: Arc::new(HttpAccountancyClient::new(PeerClient::new(
                "accountancy",
                &config.accountancy_url,
                timeout,
            )?)),
            store: Arc::new(HttpStoreClient::new(PeerClient::new(
                "store",
                &config.store_url,
                timeout,
            )?)),
        })
    }
}
