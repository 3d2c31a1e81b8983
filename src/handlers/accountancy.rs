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
    dto::accountancy::{
        CreateIncomeInvoiceRequest, CreateOutcomeInvoiceRequest, InvoiceResponse, MarkupRequest,
        MarkupResponse, MarkupUpdateResponse, PayInvoiceRequest, PriceItemRequest,
        PriceItemResponse, PriceItemsByIdsQuery, PurchasedCostQuery, PurchasedCostRequest,
        PurchasedCostResponse, SalePriceQuery,
    },
    dto::{parse_ids, IdsQuery},
    errors::ServiceError,
    proto::{InvoiceDetails, Protobuf},
    ApiResponse, AppState,
};

/// Creates the router for invoice, price item and purchased cost endpoints
pub fn accountancy_routes() -> Router<AppState> {
    Router::new()
        .route("/invoice/outcome", post(create_outcome_invoice))
        .route("/invoice/income", post(create_income_invoice))
        .route("/invoice/:id", get(get_invoice))
        .route("/invoice/order-id/:order_id", get(invoice_by_order))
        .route("/invoice/details/:id", get(invoice_details))
        .route(
            "/invoice/details/order-id/:order_id",
            get(invoice_details_by_order),
        )
        .route("/invoice/pay/:id", put(pay_invoice))
        .route("/invoice/refund/:id", put(refund_invoice))
        .route("/invoice/cancel/:id", put(cancel_invoice))
        .route("/price-item", post(create_price_item))
        .route("/price-item/markup", get(get_markups).put(update_markups))
        .route("/price-item/:id", get(get_price_item).put(update_price_item))
        .route("/product-id", get(price_items_by_product_ids))
        .route("/price-items-by-ids", get(price_items_by_ids))
        .route("/sale-price", get(sale_prices))
        .route(
            "/purchased-costs",
            post(create_purchased_cost).get(list_purchased_costs),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/accountancy/invoice/outcome",
    summary = "Create outcome invoice for an order",
    description = "Prices the ordered products at their sale price and reserves them in the store",
    request_body = CreateOutcomeInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = ApiResponse<InvoiceResponse>),
        (status = 400, description = "No items", body = crate::errors::ErrorResponse),
        (status = 404, description = "No price item for a product", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already has an invoice", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough goods in store", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn create_outcome_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateOutcomeInvoiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceResponse>>), ServiceError> {
    let invoice = state.services.invoices.create_outcome_invoice(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(invoice))))
}

#[utoipa::path(
    post,
    path = "/api/v1/accountancy/invoice/income",
    summary = "Record purchased goods",
    description = "Creates the products, their price items and purchased costs under a paid income invoice",
    request_body = CreateIncomeInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = ApiResponse<InvoiceResponse>),
        (status = 400, description = "Invalid items", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn create_income_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateIncomeInvoiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceResponse>>), ServiceError> {
    let invoice = state.services.invoices.create_income_invoice(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(invoice))))
}

#[utoipa::path(
    get,
    path = "/api/v1/accountancy/invoice/{id}",
    summary = "Get invoice",
    params(("id" = i64, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice found", body = ApiResponse<InvoiceResponse>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<InvoiceResponse>>, ServiceError> {
    let invoice = state.services.invoices.get_invoice(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    get,
    path = "/api/v1/accountancy/invoice/order-id/{order_id}",
    summary = "Latest live invoice of an order",
    params(("order_id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Invoice found", body = ApiResponse<InvoiceResponse>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn invoice_by_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<InvoiceResponse>>, ServiceError> {
    let invoice = state.services.invoices.invoice_by_order(order_id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    get,
    path = "/api/v1/accountancy/invoice/details/{id}",
    summary = "Invoice details",
    params(("id" = i64, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "InvoiceDetails message", content_type = "application/x-protobuf", body = Vec<u8>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn invoice_details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Protobuf<InvoiceDetails>, ServiceError> {
    let details = state.services.invoices.invoice_details(id).await?;
    Ok(Protobuf(details))
}

#[utoipa::path(
    get,
    path = "/api/v1/accountancy/invoice/details/order-id/{order_id}",
    summary = "Invoice details by order",
    params(("order_id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "InvoiceDetails message", content_type = "application/x-protobuf", body = Vec<u8>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn invoice_details_by_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Protobuf<InvoiceDetails>, ServiceError> {
    let details = state
        .services
        .invoices
        .invoice_details_by_order(order_id)
        .await?;
    Ok(Protobuf(details))
}

#[utoipa::path(
    put,
    path = "/api/v1/accountancy/invoice/pay/{id}",
    summary = "Pay invoice",
    params(("id" = i64, Path, description = "Invoice ID")),
    request_body(content = Option<PayInvoiceRequest>, description = "Money handed over, checked against the total when present"),
    responses(
        (status = 202, description = "Invoice paid", body = ApiResponse<InvoiceResponse>),
        (status = 400, description = "Invoice is not awaiting payment", body = crate::errors::ErrorResponse),
        (status = 402, description = "Not enough money", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn pay_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<PayInvoiceRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceResponse>>), ServiceError> {
    let money = body.and_then(|Json(request)| request.money);
    let invoice = state.services.invoices.pay(id, money).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(invoice))))
}

#[utoipa::path(
    put,
    path = "/api/v1/accountancy/invoice/refund/{id}",
    summary = "Refund invoice",
    params(("id" = i64, Path, description = "Invoice ID")),
    responses(
        (status = 202, description = "Invoice refunded", body = ApiResponse<InvoiceResponse>),
        (status = 400, description = "Invoice is not paid", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already delivered", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn refund_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceResponse>>), ServiceError> {
    let invoice = state.services.invoices.refund(id).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(invoice))))
}

#[utoipa::path(
    put,
    path = "/api/v1/accountancy/invoice/cancel/{id}",
    summary = "Cancel invoice",
    params(("id" = i64, Path, description = "Invoice ID")),
    responses(
        (status = 202, description = "Invoice cancelled", body = ApiResponse<InvoiceResponse>),
        (status = 400, description = "Invoice already paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn cancel_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceResponse>>), ServiceError> {
    let invoice = state.services.invoices.cancel(id).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(invoice))))
}

#[utoipa::path(
    post,
    path = "/api/v1/accountancy/price-item",
    summary = "Create price item",
    request_body = PriceItemRequest,
    responses(
        (status = 201, description = "Price item created", body = ApiResponse<PriceItemResponse>),
        (status = 400, description = "Invalid price or markup", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn create_price_item(
    State(state): State<AppState>,
    Json(request): Json<PriceItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PriceItemResponse>>), ServiceError> {
    let item = state.services.price_items.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

#[utoipa::path(
    get,
    path = "/api/v1/accountancy/price-item/{id}",
    summary = "Get price item",
    params(("id" = i64, Path, description = "Price item ID")),
    responses(
        (status = 200, description = "Price item found", body = ApiResponse<PriceItemResponse>),
        (status = 404, description = "Price item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn get_price_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PriceItemResponse>>, ServiceError> {
    let item = state.services.price_items.get(id).await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    put,
    path = "/api/v1/accountancy/price-item/{id}",
    summary = "Update price item",
    params(("id" = i64, Path, description = "Price item ID")),
    request_body = PriceItemRequest,
    responses(
        (status = 202, description = "Price item updated", body = ApiResponse<PriceItemResponse>),
        (status = 404, description = "Price item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn update_price_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<PriceItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PriceItemResponse>>), ServiceError> {
    let item = state.services.price_items.update(id, request).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(item))))
}

#[utoipa::path(
    get,
    path = "/api/v1/accountancy/product-id",
    summary = "Price items of products",
    params(IdsQuery),
    responses(
        (status = 200, description = "Price items", body = ApiResponse<Vec<PriceItemResponse>>),
    ),
    tag = "accountancy"
)]
pub async fn price_items_by_product_ids(
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<ApiResponse<Vec<PriceItemResponse>>>, ServiceError> {
    let items = state
        .services
        .price_items
        .by_product_ids(query.parse()?)
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    get,
    path = "/api/v1/accountancy/price-items-by-ids",
    summary = "Price items by ids",
    params(PriceItemsByIdsQuery),
    responses(
        (status = 200, description = "Price items, with sale prices when markup=true", body = ApiResponse<Vec<PriceItemResponse>>),
    ),
    tag = "accountancy"
)]
pub async fn price_items_by_ids(
    State(state): State<AppState>,
    Query(query): Query<PriceItemsByIdsQuery>,
) -> Result<Json<ApiResponse<Vec<PriceItemResponse>>>, ServiceError> {
    let items = state
        .services
        .price_items
        .by_ids(parse_ids(&query.ids)?, query.markup)
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    get,
    path = "/api/v1/accountancy/sale-price",
    summary = "Sale prices of products",
    params(SalePriceQuery),
    responses(
        (status = 200, description = "Map of product id to sale price", body = ApiResponse<HashMap<i64, String>>),
    ),
    tag = "accountancy"
)]
pub async fn sale_prices(
    State(state): State<AppState>,
    Query(query): Query<SalePriceQuery>,
) -> Result<Json<ApiResponse<HashMap<i64, Decimal>>>, ServiceError> {
    let prices = state
        .services
        .price_items
        .sale_prices(parse_ids(&query.product_ids)?)
        .await?;
    Ok(Json(ApiResponse::success(prices)))
}

#[utoipa::path(
    get,
    path = "/api/v1/accountancy/price-item/markup",
    summary = "Markups of price items",
    params(IdsQuery),
    responses(
        (status = 200, description = "Markups", body = ApiResponse<Vec<MarkupResponse>>),
    ),
    tag = "accountancy"
)]
pub async fn get_markups(
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<ApiResponse<Vec<MarkupResponse>>>, ServiceError> {
    let markups = state.services.price_items.markups(query.parse()?).await?;
    Ok(Json(ApiResponse::success(markups)))
}

#[utoipa::path(
    put,
    path = "/api/v1/accountancy/price-item/markup",
    summary = "Update markups",
    request_body = Vec<MarkupRequest>,
    responses(
        (status = 202, description = "Markups updated", body = ApiResponse<Vec<MarkupUpdateResponse>>),
        (status = 404, description = "Price item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn update_markups(
    State(state): State<AppState>,
    Json(requests): Json<Vec<MarkupRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<MarkupUpdateResponse>>>), ServiceError> {
    let updated = state.services.price_items.update_markups(requests).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/accountancy/purchased-costs",
    summary = "Record a purchase",
    request_body = PurchasedCostRequest,
    responses(
        (status = 201, description = "Purchased cost recorded", body = ApiResponse<PurchasedCostResponse>),
        (status = 404, description = "Price item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "accountancy"
)]
pub async fn create_purchased_cost(
    State(state): State<AppState>,
    Json(request): Json<PurchasedCostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PurchasedCostResponse>>), ServiceError> {
    let cost = state.services.purchased_costs.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(cost))))
}

#[utoipa::path(
    get,
    path = "/api/v1/accountancy/purchased-costs",
    summary = "Purchases in a period",
    params(PurchasedCostQuery),
    responses(
        (status = 200, description = "Purchased costs", body = ApiResponse<Vec<PurchasedCostResponse>>),
    ),
    tag = "accountancy"
)]
pub async fn list_purchased_costs(
    State(state): State<AppState>,
    Query(query): Query<PurchasedCostQuery>,
) -> Result<Json<ApiResponse<Vec<PurchasedCostResponse>>>, ServiceError> {
    let costs = state.services.purchased_costs.list(query).await?;
    Ok(Json(ApiResponse::success(costs)))
}
