mod common;

use std::str::FromStr;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use common::{expect_data, expect_error, TestApp};

async fn create_catalog(app: &TestApp) -> Vec<i64> {
    let response = app
        .post(
            "/api/v1/products",
            json!([
                { "name": "Aspirin", "price": "4.20", "quantity": 10 },
                { "name": "Ibuprofen", "price": "6.75", "quantity": 5 },
                { "name": "Vitamin C", "price": "3.10", "quantity": 20 }
            ]),
        )
        .await;
    let products = expect_data(response, StatusCode::CREATED).await;
    products
        .as_array()
        .expect("created products")
        .iter()
        .filter_map(|p| p["id"].as_i64())
        .collect()
}

fn names(page: &Value) -> Vec<String> {
    page["content"]
        .as_array()
        .expect("page content")
        .iter()
        .filter_map(|p| p["name"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn created_products_start_in_created_status() {
    let app = TestApp::new().await;
    let ids = create_catalog(&app).await;
    assert_eq!(ids.len(), 3);

    let product = expect_data(
        app.get(&format!("/api/v1/products/{}", ids[0])).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(product["name"], "Aspirin");
    assert_eq!(product["status"], "CREATED");
    assert_eq!(product["quantity"], 10);
}

#[tokio::test]
async fn empty_product_list_is_rejected() {
    let app = TestApp::new().await;

    let message = expect_error(
        app.post("/api/v1/products", json!([])).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(message, "Should not be empty request list");
}

#[tokio::test]
async fn search_matches_names_case_insensitively() {
    let app = TestApp::new().await;
    create_catalog(&app).await;

    let page = expect_data(
        app.get("/api/v1/products/search?search=PROFEN").await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(names(&page), vec!["Ibuprofen".to_string()]);
}

#[tokio::test]
async fn search_sorts_by_price_ascending() {
    let app = TestApp::new().await;
    create_catalog(&app).await;

    let page = expect_data(
        app.get("/api/v1/products/search?sortField=price&sortDirection=ASC")
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(names(&page), vec!["Vitamin C", "Aspirin", "Ibuprofen"]);
    assert_eq!(page["totalElements"], 3);
}

#[tokio::test]
async fn popular_products_follow_ordered_quantities() {
    let app = TestApp::new().await;
    let ids = create_catalog(&app).await;
    app.order(&[(ids[2], 4), (ids[1], 1)]).await;
    app.order(&[(ids[1], 1)]).await;

    let page = expect_data(app.get("/api/v1/products/popular").await, StatusCode::OK).await;
    let popular = names(&page);
    assert_eq!(popular.first().map(String::as_str), Some("Vitamin C"));
    assert_eq!(popular.get(1).map(String::as_str), Some("Ibuprofen"));
}

#[tokio::test]
async fn details_and_prices_by_ids() {
    let app = TestApp::new().await;
    let ids = create_catalog(&app).await;

    let uri = format!("/api/v1/products/details?ids={},{}", ids[0], ids[1]);
    let details = expect_data(app.get(&uri).await, StatusCode::OK).await;
    assert_eq!(details.as_array().map(Vec::len), Some(2));

    let uri = format!("/api/v1/products/prices?ids={}", ids[1]);
    let prices = expect_data(app.get(&uri).await, StatusCode::OK).await;
    let price = prices[ids[1].to_string()].as_str().expect("price string");
    assert_eq!(Decimal::from_str(price).unwrap(), Decimal::new(675, 2));

    let response = app.get("/api/v1/products/details?ids=9999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delivery_requires_received_products() {
    let app = TestApp::new().await;
    let ids = create_catalog(&app).await;

    let response = app
        .put(
            "/api/v1/products/deliver",
            Some(json!([{ "id": ids[0], "quantity": 1 }])),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let received = expect_data(
        app.put("/api/v1/products/receive", Some(json!([ids[0]]))).await,
        StatusCode::ACCEPTED,
    )
    .await;
    assert_eq!(received[0]["status"], "RECEIVED");

    let delivered = expect_data(
        app.put(
            "/api/v1/products/deliver",
            Some(json!([{ "id": ids[0], "quantity": 4 }])),
        )
        .await,
        StatusCode::ACCEPTED,
    )
    .await;
    assert_eq!(delivered[0]["quantity"], 6);

    let response = app
        .put(
            "/api/v1/products/deliver",
            Some(json!([{ "id": ids[0], "quantity": 7 }])),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn returned_products_add_quantity_back() {
    let app = TestApp::new().await;
    let ids = create_catalog(&app).await;

    let returned = expect_data(
        app.put(
            "/api/v1/products/return",
            Some(json!([{ "id": ids[1], "quantity": 3 }])),
        )
        .await,
        StatusCode::ACCEPTED,
    )
    .await;
    assert_eq!(returned[0]["quantity"], 8);
}
