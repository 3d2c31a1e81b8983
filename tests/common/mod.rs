#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use drugstore_api::{
    app_router, clients::PeerClients, config::AppConfig, db, AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

/// One process hosting all four services on a real port, so peer calls loop back over HTTP.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub addr: SocketAddr,
    _server: JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with a fresh SQLite database file.
    pub async fn new() -> Self {
        let db_dir = TempDir::new().expect("create temp dir");
        let db_path = db_dir.path().join("drugstore_test.db");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let base_url = format!("http://{}", addr);

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            addr.port(),
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 5;
        cfg.db_min_connections = 1;
        cfg.invoice_expiry.enabled = false;
        cfg.clients.order_url = base_url.clone();
        cfg.clients.product_url = base_url.clone();
        cfg.clients.accountancy_url = base_url.clone();
        cfg.clients.store_url = base_url;
        cfg.clients.timeout_secs = 5;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let clients = PeerClients::from_config(&cfg.clients).expect("peer clients");
        let state = AppState::new(Arc::new(pool), cfg, clients);
        let router = app_router(state.clone());

        let server_router = router.clone();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, server_router.into_make_service()).await;
        });

        Self {
            router,
            state,
            addr,
            _server: server,
            _db_dir: db_dir,
        }
    }

    /// Send a request against the router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("failed to build request"))
            .await
            .expect("request failed")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Option<Value>) -> Response {
        self.request(Method::PUT, uri, body).await
    }

    /// Books an income invoice for the given `(name, price, quantity, markup)` lines, then
    /// receives it into the store. Returns the invoice JSON.
    pub async fn stock(&self, lines: &[(&str, &str, i32, &str)]) -> Value {
        let items: Vec<Value> = lines
            .iter()
            .map(|(name, price, quantity, markup)| {
                json!({ "name": name, "price": price, "quantity": quantity, "markup": markup })
            })
            .collect();

        let response = self
            .post("/api/v1/accountancy/invoice/income", json!({ "items": items }))
            .await;
        let invoice = expect_data(response, StatusCode::CREATED).await;

        let receive_uri = format!("/api/v1/store/receive/{}", invoice["id"]);
        expect_data(self.put(&receive_uri, None).await, StatusCode::ACCEPTED).await;
        invoice
    }

    /// Creates an order of `(product_id, quantity)` lines and returns its id.
    pub async fn order(&self, lines: &[(i64, i32)]) -> i64 {
        let items: Vec<Value> = lines
            .iter()
            .map(|(product_id, quantity)| json!({ "productId": product_id, "quantity": quantity }))
            .collect();
        let response = self
            .post("/api/v1/orders", json!({ "orderItems": items }))
            .await;
        let order = expect_data(response, StatusCode::CREATED).await;
        order["id"].as_i64().expect("order id")
    }
}

pub async fn body_bytes(response: Response) -> bytes::Bytes {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body")
}

pub async fn body_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("parse response body")
}

/// Asserts the status and returns the `data` field of the envelope.
pub async fn expect_data(response: Response, status: StatusCode) -> Value {
    let actual = response.status();
    let body = body_json(response).await;
    assert_eq!(actual, status, "unexpected status, body: {}", body);
    assert_eq!(body["success"], true);
    body["data"].clone()
}

/// Asserts the status and returns the error message.
pub async fn expect_error(response: Response, status: StatusCode) -> String {
    let actual = response.status();
    let body = body_json(response).await;
    assert_eq!(actual, status, "unexpected status, body: {}", body);
    body["message"].as_str().unwrap_or_default().to_string()
}
