use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::entities::{
    invoice::{self, InvoiceStatus, InvoiceType},
    invoice_item, price_item, purchased_cost,
};
use crate::services::pricing::round_money;

/// Ordered quantity of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderedProduct {
    pub product_id: i64,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcomeInvoiceRequest {
    pub order_id: i64,
    #[serde(default)]
    #[validate]
    pub items: Vec<OrderedProduct>,
}

/// A purchased product line: creates the product, its price item and a purchased cost.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncomeItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom = "super::validate_amount")]
    #[schema(value_type = String, example = "25.50")]
    pub price: Decimal,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: i32,
    #[validate(custom = "super::validate_amount")]
    #[schema(value_type = String, example = "0.20")]
    pub markup: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIncomeInvoiceRequest {
    #[serde(default)]
    #[validate]
    pub items: Vec<IncomeItemRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemResponse {
    pub price_item_id: i64,
    pub product_id: i64,
    pub name: String,
    #[schema(value_type = String, example = "30.60")]
    pub price: Decimal,
    pub quantity: i32,
}

impl From<invoice_item::Model> for InvoiceItemResponse {
    fn from(model: invoice_item::Model) -> Self {
        Self {
            price_item_id: model.price_item_id,
            product_id: model.product_id,
            name: model.name,
            price: round_money(model.price),
            quantity: model.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: i64,
    pub order_id: Option<i64>,
    pub invoice_type: InvoiceType,
    pub status: InvoiceStatus,
    pub items: Vec<InvoiceItemResponse>,
    #[schema(value_type = String, example = "61.20")]
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceResponse {
    pub fn from_parts(invoice: invoice::Model, items: Vec<invoice_item::Model>) -> Self {
        Self {
            id: invoice.id,
            order_id: invoice.order_id,
            invoice_type: invoice.invoice_type,
            status: invoice.status,
            items: items.into_iter().map(Into::into).collect(),
            total: round_money(invoice.total),
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayInvoiceRequest {
    /// Amount handed over by the customer; checked against the invoice total when present
    #[schema(value_type = Option<String>, example = "100.00")]
    pub money: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceItemRequest {
    pub product_id: i64,
    #[validate(custom = "super::validate_amount")]
    #[schema(value_type = String, example = "25.50")]
    pub price: Decimal,
    #[validate(custom = "super::validate_amount")]
    #[schema(value_type = String, example = "0.20")]
    pub markup: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceItemResponse {
    pub id: i64,
    pub product_id: i64,
    #[schema(value_type = String, example = "25.50")]
    pub price: Decimal,
    #[schema(value_type = String, example = "0.20")]
    pub markup: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<price_item::Model> for PriceItemResponse {
    fn from(model: price_item::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            price: round_money(model.price),
            markup: model.markup.normalize(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PriceItemsByIdsQuery {
    /// Comma-separated price item ids
    pub ids: String,
    /// Apply the markup to the returned prices
    #[serde(default)]
    pub markup: bool,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SalePriceQuery {
    /// Comma-separated product ids
    pub product_ids: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkupRequest {
    pub price_item_id: i64,
    #[validate(custom = "super::validate_amount")]
    #[schema(value_type = String, example = "0.20")]
    pub markup: Decimal,
}

/// Current markup of a price item.
pub type MarkupResponse = MarkupRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkupUpdateResponse {
    pub price_item_id: i64,
    pub product_id: i64,
    #[schema(value_type = String, example = "25.50")]
    pub price: Decimal,
    #[schema(value_type = String, example = "0.20")]
    pub markup: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedCostRequest {
    pub price_item_id: i64,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: i32,
    /// Defaults to now
    pub date_of_purchase: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedCostResponse {
    pub id: i64,
    pub price_item_id: i64,
    pub quantity: i32,
    pub date_of_purchase: DateTime<Utc>,
}

impl From<purchased_cost::Model> for PurchasedCostResponse {
    fn from(model: purchased_cost::Model) -> Self {
        Self {
            id: model.id,
            price_item_id: model.price_item_id,
            quantity: model.quantity,
            date_of_purchase: model.date_of_purchase,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PurchasedCostQuery {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}
