use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::entities::product::{self, ProductStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom = "super::validate_amount")]
    #[schema(value_type = String, example = "25.50")]
    pub price: Decimal,
    #[validate(range(min = 0, max = 1000000))]
    pub quantity: i32,
}

/// Replaces the mutable fields of a product.
pub type UpdateProductRequest = CreateProductRequest;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    #[schema(value_type = String, example = "25.50")]
    pub price: Decimal,
    pub quantity: i32,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: crate::services::pricing::round_money(model.price),
            quantity: model.quantity,
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub id: i64,
    pub name: String,
    #[schema(value_type = String, example = "25.50")]
    pub price: Decimal,
    pub quantity: i32,
    pub status: ProductStatus,
}

impl From<product::Model> for ProductDetails {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: crate::services::pricing::round_money(model.price),
            quantity: model.quantity,
            status: model.status,
        }
    }
}

/// Quantity change for one product (deliver, reduce, return).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuantity {
    pub id: i64,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ProductSortField {
    Name,
    Price,
    Quantity,
    CreatedAt,
    #[default]
    Popularity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductSearchQuery {
    /// Zero-based page number
    #[serde(default)]
    pub page: u64,
    #[serde(default = "crate::default_page_size")]
    pub size: u64,
    /// Case-insensitive substring of the product name
    pub search: Option<String>,
    #[serde(default)]
    pub sort_field: ProductSortField,
    #[serde(default)]
    pub sort_direction: SortDirection,
}
