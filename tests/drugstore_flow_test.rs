mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use common::{expect_data, expect_error, TestApp};

struct Stocked {
    product_id: i64,
    price_item_id: i64,
}

async fn stock_one(app: &TestApp, quantity: i32) -> Stocked {
    let invoice = app.stock(&[("Amoxicillin", "25.50", quantity, "0.20")]).await;
    Stocked {
        product_id: invoice["items"][0]["productId"].as_i64().expect("product id"),
        price_item_id: invoice["items"][0]["priceItemId"].as_i64().expect("price item id"),
    }
}

async fn confirm(app: &TestApp, order_id: i64) -> Value {
    expect_data(
        app.request(Method::POST, &format!("/api/v1/orders/confirm/{}", order_id), None)
            .await,
        StatusCode::CREATED,
    )
    .await
}

async fn outcome_invoice(app: &TestApp, order_id: i64) -> Value {
    expect_data(
        app.get(&format!("/api/v1/accountancy/invoice/order-id/{}", order_id))
            .await,
        StatusCode::OK,
    )
    .await
}

async fn order_status(app: &TestApp, order_id: i64) -> Value {
    let order = expect_data(
        app.get(&format!("/api/v1/orders/{}", order_id)).await,
        StatusCode::OK,
    )
    .await;
    order["orderStatus"].clone()
}

async fn store_quantity(app: &TestApp, price_item_id: i64) -> i64 {
    let counters = expect_data(
        app.get(&format!("/api/v1/store/price-ids?ids={}", price_item_id))
            .await,
        StatusCode::OK,
    )
    .await;
    counters[0]["quantity"].as_i64().expect("store quantity")
}

#[tokio::test]
async fn order_is_confirmed_paid_and_delivered() {
    let app = TestApp::new().await;
    let stocked = stock_one(&app, 10).await;
    let order_id = app.order(&[(stocked.product_id, 2)]).await;

    let details = expect_data(
        app.get(&format!("/api/v1/orders/{}/details", order_id)).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(details["orderItemDetails"][0]["name"], "Amoxicillin");
    let total = Decimal::from_str(details["total"].as_str().expect("total")).unwrap();
    assert_eq!(total, Decimal::new(6120, 2));

    let confirmed = confirm(&app, order_id).await;
    let amount = Decimal::from_str(confirmed["amount"].as_str().expect("amount")).unwrap();
    assert_eq!(amount, Decimal::new(6120, 2));
    assert_eq!(order_status(&app, order_id).await, "CONFIRMED");
    assert_eq!(store_quantity(&app, stocked.price_item_id).await, 8);

    let invoice = outcome_invoice(&app, order_id).await;
    assert_eq!(invoice["invoiceType"], "OUTCOME");
    assert_eq!(invoice["status"], "CREATED");

    let message = expect_error(
        app.put(&format!("/api/v1/store/deliver/{}", order_id), None)
            .await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(message, format!("Invoice with id = {} not paid !", invoice["id"]));

    let paid = expect_data(
        app.put(
            &format!("/api/v1/accountancy/invoice/pay/{}", invoice["id"]),
            Some(json!({ "money": "100.00" })),
        )
        .await,
        StatusCode::ACCEPTED,
    )
    .await;
    assert_eq!(paid["status"], "PAID");
    assert_eq!(order_status(&app, order_id).await, "PAID");

    let certificate = expect_data(
        app.put(&format!("/api/v1/store/deliver/{}", order_id), None)
            .await,
        StatusCode::ACCEPTED,
    )
    .await;
    assert_eq!(certificate["status"], "DELIVERED");
    assert_eq!(certificate["orderId"], order_id);
    assert_eq!(
        certificate["comment"],
        format!("Delivered order with id = {}", order_id)
    );
    assert_eq!(order_status(&app, order_id).await, "DELIVERED");

    let product = expect_data(
        app.get(&format!("/api/v1/products/{}", stocked.product_id))
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(product["quantity"], 8);

    let message = expect_error(
        app.put(&format!("/api/v1/store/deliver/{}", order_id), None)
            .await,
        StatusCode::CONFLICT,
    )
    .await;
    assert_eq!(
        message,
        format!("Order with id = {} was already delivered", order_id)
    );

    let response = app
        .put(&format!("/api/v1/accountancy/invoice/refund/{}", invoice["id"]), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let certificates = expect_data(
        app.get(&format!("/api/v1/store/transfer-certificate/order/{}", order_id))
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(certificates.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn confirming_beyond_stock_leaves_the_order_untouched() {
    let app = TestApp::new().await;
    let stocked = stock_one(&app, 1).await;
    let order_id = app.order(&[(stocked.product_id, 3)]).await;

    let response = app
        .request(Method::POST, &format!("/api/v1/orders/confirm/{}", order_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(order_status(&app, order_id).await, "CREATED");
    assert_eq!(store_quantity(&app, stocked.price_item_id).await, 1);
}

#[tokio::test]
async fn second_confirmation_conflicts() {
    let app = TestApp::new().await;
    let stocked = stock_one(&app, 5).await;
    let order_id = app.order(&[(stocked.product_id, 1)]).await;
    confirm(&app, order_id).await;

    let message = expect_error(
        app.request(Method::POST, &format!("/api/v1/orders/confirm/{}", order_id), None)
            .await,
        StatusCode::CONFLICT,
    )
    .await;
    assert_eq!(message, "This order already have some invoice");
    assert_eq!(store_quantity(&app, stocked.price_item_id).await, 4);
}

#[tokio::test]
async fn cancelled_invoice_returns_goods_to_the_store() {
    let app = TestApp::new().await;
    let stocked = stock_one(&app, 5).await;
    let order_id = app.order(&[(stocked.product_id, 2)]).await;
    confirm(&app, order_id).await;
    assert_eq!(store_quantity(&app, stocked.price_item_id).await, 3);

    let invoice = outcome_invoice(&app, order_id).await;
    let cancelled = expect_data(
        app.put(&format!("/api/v1/accountancy/invoice/cancel/{}", invoice["id"]), None)
            .await,
        StatusCode::ACCEPTED,
    )
    .await;
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(store_quantity(&app, stocked.price_item_id).await, 5);
    assert_eq!(order_status(&app, order_id).await, "CANCELLED");

    let response = app
        .put(&format!("/api/v1/accountancy/invoice/pay/{}", invoice["id"]), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refund_before_delivery_restocks_and_marks_order() {
    let app = TestApp::new().await;
    let stocked = stock_one(&app, 4).await;
    let order_id = app.order(&[(stocked.product_id, 4)]).await;
    confirm(&app, order_id).await;

    let invoice = outcome_invoice(&app, order_id).await;
    app.put(&format!("/api/v1/accountancy/invoice/pay/{}", invoice["id"]), None)
        .await;

    let refunded = expect_data(
        app.put(&format!("/api/v1/accountancy/invoice/refund/{}", invoice["id"]), None)
            .await,
        StatusCode::ACCEPTED,
    )
    .await;
    assert_eq!(refunded["status"], "REFUND");
    assert_eq!(store_quantity(&app, stocked.price_item_id).await, 4);
    assert_eq!(order_status(&app, order_id).await, "REFUND");
}

#[tokio::test]
async fn short_payment_is_refused() {
    let app = TestApp::new().await;
    let stocked = stock_one(&app, 2).await;
    let order_id = app.order(&[(stocked.product_id, 1)]).await;
    confirm(&app, order_id).await;
    let invoice = outcome_invoice(&app, order_id).await;

    let message = expect_error(
        app.put(
            &format!("/api/v1/accountancy/invoice/pay/{}", invoice["id"]),
            Some(json!({ "money": "1.00" })),
        )
        .await,
        StatusCode::PAYMENT_REQUIRED,
    )
    .await;
    assert_eq!(
        message,
        format!("Not enough money to pay the invoice with id = {}", invoice["id"])
    );
    assert_eq!(order_status(&app, order_id).await, "CONFIRMED");
}
