use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{
    store_item,
    transfer_certificate::{self, TransferStatus},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    pub price_item_id: i64,
    #[validate(range(min = 0, max = 1000000))]
    pub quantity: i32,
}

/// Quantity change of one store counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreQuantityRequest {
    pub price_item_id: i64,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreResponse {
    pub id: i64,
    pub price_item_id: i64,
    pub quantity: i32,
}

impl From<store_item::Model> for StoreResponse {
    fn from(model: store_item::Model) -> Self {
        Self {
            id: model.id,
            price_item_id: model.price_item_id,
            quantity: model.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferCertificateResponse {
    pub id: i64,
    pub certificate_number: String,
    pub order_id: Option<i64>,
    pub invoice_id: i64,
    pub status: TransferStatus,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<transfer_certificate::Model> for TransferCertificateResponse {
    fn from(model: transfer_certificate::Model) -> Self {
        Self {
            id: model.id,
            certificate_number: model.certificate_number,
            order_id: model.order_id,
            invoice_id: model.invoice_id,
            status: model.status,
            comment: model.comment,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckTransferResponse {
    pub order_id: i64,
    pub comment: String,
}
