use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};

use crate::{
    dto::order::{ConfirmOrderResponse, OrderDetailsResponse, OrderRequest, OrderResponse},
    entities::order::OrderStatus,
    errors::ServiceError,
    proto::{ProductQuantityMap, Protobuf},
    ApiResponse, AppState, Page, PageQuery,
};

/// Creates the router for order endpoints
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order).put(update_order).delete(delete_order))
        .route("/:id/details", get(order_details))
        .route("/change-status/:id", put(change_status))
        .route("/status/:status", get(orders_by_status))
        .route("/total-buys", get(total_buys))
        .route("/confirm/:id", post(confirm_order))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    request_body = OrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "No order items", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of orders", body = ApiResponse<Page<OrderResponse>>),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<OrderResponse>>>, ServiceError> {
    let page = state.services.orders.list_orders(query).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    summary = "Replace the items of an order",
    params(("id" = i64, Path, description = "Order ID")),
    request_body = OrderRequest,
    responses(
        (status = 202, description = "Order updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "No order items", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state.services.orders.update_order(id, request).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete order",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServiceError> {
    state.services.orders.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/change-status/{id}",
    summary = "Change order status",
    params(("id" = i64, Path, description = "Order ID")),
    request_body = OrderStatus,
    responses(
        (status = 202, description = "Status changed", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(status): Json<OrderStatus>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state.services.orders.change_status(id, status).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/details",
    summary = "Order items with names and sale prices",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order details", body = ApiResponse<OrderDetailsResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 504, description = "Peer service unreachable", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn order_details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<OrderDetailsResponse>>, ServiceError> {
    let details = state.services.orders.order_details(id).await?;
    Ok(Json(ApiResponse::success(details)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/status/{status}",
    summary = "Orders by status",
    params(("status" = String, Path, description = "Order status, e.g. PAID")),
    responses(
        (status = 200, description = "Orders with the status", body = ApiResponse<Vec<OrderResponse>>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn orders_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ServiceError> {
    let status = OrderStatus::from_str(&status)
        .map_err(|_| ServiceError::BadRequest(format!("Unknown order status: {}", status)))?;
    let orders = state.services.orders.orders_by_status(status).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/total-buys",
    summary = "Bought quantity per product",
    description = "Sums the ordered quantities of every product over orders that were not cancelled or refunded",
    responses(
        (status = 200, description = "ProductQuantityMap message", content_type = "application/x-protobuf", body = Vec<u8>),
    ),
    tag = "orders"
)]
pub async fn total_buys(
    State(state): State<AppState>,
) -> Result<Protobuf<ProductQuantityMap>, ServiceError> {
    let quantities = state.services.orders.total_buys().await?;
    Ok(Protobuf(ProductQuantityMap { quantities }))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/confirm/{id}",
    summary = "Confirm order",
    description = "Requests an outcome invoice for the order and moves it to CONFIRMED",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 201, description = "Order confirmed", body = ApiResponse<ConfirmOrderResponse>),
        (status = 400, description = "No order items", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or price item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already has an invoice", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough goods in store", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn confirm_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<ConfirmOrderResponse>>), ServiceError> {
    let confirmed = state.services.orders.confirm_order(id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(confirmed))))
}
