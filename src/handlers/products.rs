use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;

use crate::{
    dto::product::{
        CreateProductRequest, ProductDetails, ProductQuantity, ProductResponse, ProductSearchQuery,
        UpdateProductRequest,
    },
    dto::IdsQuery,
    errors::ServiceError,
    ApiResponse, AppState, Page, PageQuery,
};

/// Creates the router for product endpoints
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_products))
        .route("/search", get(search_products))
        .route("/popular", get(popular_products))
        .route("/details", get(product_details))
        .route("/prices", get(product_prices))
        .route("/receive", put(receive_products))
        .route("/deliver", put(deliver_products))
        .route("/reduce-quantity", put(reduce_quantity))
        .route("/return", put(return_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create products",
    request_body = Vec<CreateProductRequest>,
    responses(
        (status = 201, description = "Products created", body = ApiResponse<Vec<ProductResponse>>),
        (status = 400, description = "Empty or invalid request list", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn create_products(
    State(state): State<AppState>,
    Json(requests): Json<Vec<CreateProductRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ProductResponse>>>), ServiceError> {
    let products = state.services.products.create_products(requests).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(products))))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    params(("id" = i64, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product found", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.products.get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    summary = "Update product",
    params(("id" = i64, Path, description = "Product ID")),
    request_body = CreateProductRequest,
    responses(
        (status = 202, description = "Product updated", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ServiceError> {
    let product = state.services.products.update_product(id, request).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(product))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    summary = "Delete product",
    params(("id" = i64, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServiceError> {
    state.services.products.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/products/search",
    summary = "Search products",
    description = "Case-insensitive name search, sorted by name, price, quantity, createdAt or popularity",
    params(ProductSearchQuery),
    responses(
        (status = 200, description = "Page of products", body = ApiResponse<Page<ProductResponse>>),
    ),
    tag = "products"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<ProductSearchQuery>,
) -> Result<Json<ApiResponse<Page<ProductResponse>>>, ServiceError> {
    let page = state.services.products.search(query).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/popular",
    summary = "Most bought products",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of products by bought quantity", body = ApiResponse<Page<ProductResponse>>),
        (status = 504, description = "Order service unreachable", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn popular_products(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<ProductResponse>>>, ServiceError> {
    let page = state.services.products.popular(query).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/details",
    summary = "Product details by ids",
    params(IdsQuery),
    responses(
        (status = 200, description = "Details of every requested product", body = ApiResponse<Vec<ProductDetails>>),
        (status = 404, description = "A product does not exist", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn product_details(
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<ApiResponse<Vec<ProductDetails>>>, ServiceError> {
    let details = state.services.products.details(query.parse()?).await?;
    Ok(Json(ApiResponse::success(details)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/prices",
    summary = "Product prices by ids",
    params(IdsQuery),
    responses(
        (status = 200, description = "Map of product id to price", body = ApiResponse<HashMap<i64, String>>),
    ),
    tag = "products"
)]
pub async fn product_prices(
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<ApiResponse<HashMap<i64, Decimal>>>, ServiceError> {
    let prices = state.services.products.prices(query.parse()?).await?;
    Ok(Json(ApiResponse::success(prices)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/receive",
    summary = "Mark products received",
    request_body = Vec<i64>,
    responses(
        (status = 202, description = "Products received", body = ApiResponse<Vec<ProductResponse>>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn receive_products(
    State(state): State<AppState>,
    Json(ids): Json<Vec<i64>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ProductResponse>>>), ServiceError> {
    let products = state.services.products.receive(ids).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(products))))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/deliver",
    summary = "Deliver received products",
    request_body = Vec<ProductQuantity>,
    responses(
        (status = 202, description = "Quantities reduced", body = ApiResponse<Vec<ProductResponse>>),
        (status = 400, description = "Product not received", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough quantity", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn deliver_products(
    State(state): State<AppState>,
    Json(items): Json<Vec<ProductQuantity>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ProductResponse>>>), ServiceError> {
    let products = state.services.products.deliver(items).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(products))))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/reduce-quantity",
    summary = "Reduce product quantities",
    request_body = Vec<ProductQuantity>,
    responses(
        (status = 202, description = "Quantities reduced", body = ApiResponse<Vec<ProductResponse>>),
        (status = 422, description = "Not enough quantity", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn reduce_quantity(
    State(state): State<AppState>,
    Json(items): Json<Vec<ProductQuantity>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ProductResponse>>>), ServiceError> {
    let products = state.services.products.reduce_quantity(items).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(products))))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/return",
    summary = "Return products",
    request_body = Vec<ProductQuantity>,
    responses(
        (status = 202, description = "Quantities increased", body = ApiResponse<Vec<ProductResponse>>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn return_products(
    State(state): State<AppState>,
    Json(items): Json<Vec<ProductQuantity>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ProductResponse>>>), ServiceError> {
    let products = state.services.products.return_products(items).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(products))))
}
