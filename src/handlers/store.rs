use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};

use crate::{
    dto::store::{
        CheckTransferResponse, CreateStoreRequest, StoreQuantityRequest, StoreResponse,
        TransferCertificateResponse,
    },
    dto::IdsQuery,
    errors::ServiceError,
    ApiResponse, AppState, Page, PageQuery,
};

/// Creates the router for store endpoints
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_store).post(create_store))
        .route("/price-ids", get(store_by_price_items))
        .route("/increase", put(increase))
        .route("/reduce", put(reduce))
        .route("/availability", put(availability))
        .route("/deliver/:order_id", put(deliver))
        .route("/receive/:invoice_id", put(receive))
        .route("/check-transfer/:order_id", get(check_transfer))
        .route("/transfer-certificate", get(certificates))
        .route(
            "/transfer-certificate/order/:order_id",
            get(certificates_by_order),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/store",
    summary = "Create store counter",
    request_body = CreateStoreRequest,
    responses(
        (status = 201, description = "Counter created", body = ApiResponse<StoreResponse>),
        (status = 409, description = "Counter for the price item exists", body = crate::errors::ErrorResponse),
    ),
    tag = "store"
)]
pub async fn create_store(
    State(state): State<AppState>,
    Json(request): Json<CreateStoreRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StoreResponse>>), ServiceError> {
    let counter = state.services.store.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(counter))))
}

#[utoipa::path(
    get,
    path = "/api/v1/store",
    summary = "List store counters",
    responses(
        (status = 200, description = "All counters", body = ApiResponse<Vec<StoreResponse>>),
    ),
    tag = "store"
)]
pub async fn list_store(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<StoreResponse>>>, ServiceError> {
    let counters = state.services.store.list().await?;
    Ok(Json(ApiResponse::success(counters)))
}

#[utoipa::path(
    get,
    path = "/api/v1/store/price-ids",
    summary = "Store counters of price items",
    params(IdsQuery),
    responses(
        (status = 200, description = "Counters", body = ApiResponse<Vec<StoreResponse>>),
    ),
    tag = "store"
)]
pub async fn store_by_price_items(
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<ApiResponse<Vec<StoreResponse>>>, ServiceError> {
    let counters = state.services.store.by_price_items(query.parse()?).await?;
    Ok(Json(ApiResponse::success(counters)))
}

#[utoipa::path(
    put,
    path = "/api/v1/store/increase",
    summary = "Increase store counters",
    request_body = Vec<StoreQuantityRequest>,
    responses(
        (status = 202, description = "Counters increased", body = ApiResponse<Vec<StoreResponse>>),
        (status = 400, description = "Empty request list", body = crate::errors::ErrorResponse),
    ),
    tag = "store"
)]
pub async fn increase(
    State(state): State<AppState>,
    Json(items): Json<Vec<StoreQuantityRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<StoreResponse>>>), ServiceError> {
    let counters = state.services.store.increase(items).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(counters))))
}

#[utoipa::path(
    put,
    path = "/api/v1/store/reduce",
    summary = "Reduce store counters",
    request_body = Vec<StoreQuantityRequest>,
    responses(
        (status = 202, description = "Counters reduced", body = ApiResponse<Vec<StoreResponse>>),
        (status = 422, description = "Insufficient amount in store", body = crate::errors::ErrorResponse),
    ),
    tag = "store"
)]
pub async fn reduce(
    State(state): State<AppState>,
    Json(items): Json<Vec<StoreQuantityRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<StoreResponse>>>), ServiceError> {
    let counters = state.services.store.reduce(items).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(counters))))
}

#[utoipa::path(
    put,
    path = "/api/v1/store/availability",
    summary = "Check store availability",
    request_body = Vec<StoreQuantityRequest>,
    responses(
        (status = 200, description = "Current counters", body = ApiResponse<Vec<StoreResponse>>),
        (status = 422, description = "Insufficient amount in store", body = crate::errors::ErrorResponse),
    ),
    tag = "store"
)]
pub async fn availability(
    State(state): State<AppState>,
    Json(items): Json<Vec<StoreQuantityRequest>>,
) -> Result<Json<ApiResponse<Vec<StoreResponse>>>, ServiceError> {
    let counters = state.services.store.availability(items).await?;
    Ok(Json(ApiResponse::success(counters)))
}

#[utoipa::path(
    put,
    path = "/api/v1/store/deliver/{order_id}",
    summary = "Deliver a paid order",
    params(("order_id" = i64, Path, description = "Order ID")),
    responses(
        (status = 202, description = "Delivery certificate", body = ApiResponse<TransferCertificateResponse>),
        (status = 400, description = "Invoice not paid", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already delivered", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough product quantity", body = crate::errors::ErrorResponse),
    ),
    tag = "store"
)]
pub async fn deliver(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<TransferCertificateResponse>>), ServiceError> {
    let certificate = state.services.store.deliver(order_id).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(certificate))))
}

#[utoipa::path(
    put,
    path = "/api/v1/store/receive/{invoice_id}",
    summary = "Receive goods of a paid income invoice",
    params(("invoice_id" = i64, Path, description = "Invoice ID")),
    responses(
        (status = 202, description = "Receipt certificate", body = ApiResponse<TransferCertificateResponse>),
        (status = 400, description = "Not a paid income invoice", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invoice already received", body = crate::errors::ErrorResponse),
    ),
    tag = "store"
)]
pub async fn receive(
    State(state): State<AppState>,
    Path(invoice_id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<TransferCertificateResponse>>), ServiceError> {
    let certificate = state.services.store.receive(invoice_id).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(certificate))))
}

#[utoipa::path(
    get,
    path = "/api/v1/store/check-transfer/{order_id}",
    summary = "Check that an order was not delivered",
    params(("order_id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order not delivered", body = ApiResponse<CheckTransferResponse>),
        (status = 409, description = "Order already delivered", body = crate::errors::ErrorResponse),
    ),
    tag = "store"
)]
pub async fn check_transfer(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<CheckTransferResponse>>, ServiceError> {
    let response = state.services.store.check_transfer(order_id).await?;
    Ok(Json(ApiResponse::success(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/store/transfer-certificate",
    summary = "List transfer certificates",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of certificates", body = ApiResponse<Page<TransferCertificateResponse>>),
    ),
    tag = "store"
)]
pub async fn certificates(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<TransferCertificateResponse>>>, ServiceError> {
    let page = state.services.store.certificates(query).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/store/transfer-certificate/order/{order_id}",
    summary = "Transfer certificates of an order",
    params(("order_id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Certificates", body = ApiResponse<Vec<TransferCertificateResponse>>),
    ),
    tag = "store"
)]
pub async fn certificates_by_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<TransferCertificateResponse>>>, ServiceError> {
    let certificates = state.services.store.certificates_by_order(order_id).await?;
    Ok(Json(ApiResponse::success(certificates)))
}
