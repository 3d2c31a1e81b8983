mod common;

use axum::http::StatusCode;
use sea_orm::EntityTrait;
use serde_json::json;

use common::{body_bytes, expect_data, expect_error, TestApp};
use drugstore_api::{
    entities::order::{Entity as OrderEntity, OrderStatus},
    proto::ProductQuantityMap,
};
use prost::Message;

#[tokio::test]
async fn create_order_persists_items() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/api/v1/orders",
            json!({ "orderItems": [
                { "productId": 1, "quantity": 2 },
                { "productId": 2, "quantity": 1 }
            ]}),
        )
        .await;
    let order = expect_data(response, StatusCode::CREATED).await;

    assert_eq!(order["orderStatus"], "CREATED");
    assert_eq!(order["orderItems"].as_array().map(Vec::len), Some(2));

    let id = order["id"].as_i64().expect("order id");
    let saved = OrderEntity::find_by_id(id)
        .one(&*app.state.db)
        .await
        .expect("query order")
        .expect("order should exist");
    assert_eq!(saved.order_status, OrderStatus::Created);
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let app = TestApp::new().await;

    let message = expect_error(app.get("/api/v1/orders/999").await, StatusCode::NOT_FOUND).await;
    assert_eq!(message, "Order with 999 was not found");
}

#[tokio::test]
async fn order_without_items_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .post("/api/v1/orders", json!({ "orderItems": [] }))
        .await;
    let message = expect_error(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "You have to add minimum one order item");
}

#[tokio::test]
async fn update_replaces_items_and_delete_removes_order() {
    let app = TestApp::new().await;
    let id = app.order(&[(1, 1)]).await;

    let response = app
        .put(
            &format!("/api/v1/orders/{}", id),
            Some(json!({ "orderItems": [{ "productId": 3, "quantity": 4 }] })),
        )
        .await;
    let order = expect_data(response, StatusCode::ACCEPTED).await;
    assert_eq!(order["orderItems"], json!([{ "productId": 3, "quantity": 4 }]));

    let response = app
        .request(
            axum::http::Method::DELETE,
            &format!("/api/v1/orders/{}", id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get(&format!("/api/v1/orders/{}", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn orders_are_listed_by_status() {
    let app = TestApp::new().await;
    let first = app.order(&[(1, 1)]).await;
    let second = app.order(&[(2, 1)]).await;

    let response = app
        .put(
            &format!("/api/v1/orders/change-status/{}", second),
            Some(json!("CANCELLED")),
        )
        .await;
    expect_data(response, StatusCode::ACCEPTED).await;

    let created = expect_data(app.get("/api/v1/orders/status/created").await, StatusCode::OK).await;
    let ids: Vec<i64> = created
        .as_array()
        .expect("order list")
        .iter()
        .filter_map(|order| order["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![first]);

    let message = expect_error(
        app.get("/api/v1/orders/status/SHIPPED").await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(message, "Unknown order status: SHIPPED");
}

#[tokio::test]
async fn orders_are_paged_from_zero() {
    let app = TestApp::new().await;
    for product_id in 1..=3 {
        app.order(&[(product_id, 1)]).await;
    }

    let page = expect_data(app.get("/api/v1/orders?page=1&size=2").await, StatusCode::OK).await;
    assert_eq!(page["content"].as_array().map(Vec::len), Some(1));
    assert_eq!(page["totalElements"], 3);
    assert_eq!(page["totalPages"], 2);
}

#[tokio::test]
async fn total_buys_skip_cancelled_orders() {
    let app = TestApp::new().await;
    app.order(&[(1, 2), (2, 1)]).await;
    app.order(&[(1, 3)]).await;
    let cancelled = app.order(&[(2, 10)]).await;
    app.put(
        &format!("/api/v1/orders/change-status/{}", cancelled),
        Some(json!("CANCELLED")),
    )
    .await;

    let response = app.get("/api/v1/orders/total-buys").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[axum::http::header::CONTENT_TYPE],
        "application/x-protobuf"
    );

    let map = ProductQuantityMap::decode(body_bytes(response).await).expect("decode buys");
    assert_eq!(map.quantities.get(&1), Some(&5));
    assert_eq!(map.quantities.get(&2), Some(&1));
}

#[tokio::test]
async fn confirming_without_price_items_fails_and_keeps_order_created() {
    let app = TestApp::new().await;
    let id = app.order(&[(42, 1)]).await;

    let response = app
        .request(
            axum::http::Method::POST,
            &format!("/api/v1/orders/confirm/{}", id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let order = expect_data(app.get(&format!("/api/v1/orders/{}", id)).await, StatusCode::OK).await;
    assert_eq!(order["orderStatus"], "CREATED");
}
