//! Drugstore API Library
//!
//! Order, product, accountancy and store services of the drugstore backend. Each service owns
//! its tables and reaches its peers over HTTP through [`clients`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod clients;
pub mod config;
pub mod db;
pub mod dto;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod proto;
pub mod services;
pub mod tracing;

use axum::{middleware, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::config::ServiceKind;

/// Shared by every handler: the pool, the configuration and the service layer.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        clients: clients::PeerClients,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), clients);
        Self {
            db,
            config,
            services,
        }
    }
}

/// Zero-based page request shared by the list endpoints.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number, starting at 0
    #[serde(default)]
    pub page: u64,
    /// Page size
    #[serde(default = "default_page_size")]
    pub size: u64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: default_page_size(),
        }
    }
}

impl PageQuery {
    pub fn size(&self) -> u64 {
        self.size.max(1)
    }
}

pub fn default_page_size() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, query: &PageQuery, total_elements: u64) -> Self {
        let size = query.size();
        Self {
            content,
            page: query.page,
            size,
            total_elements,
            total_pages: total_elements.div_ceil(size),
        }
    }

    /// Slices an already sorted, fully loaded list.
    pub fn from_sorted(items: Vec<T>, query: &PageQuery) -> Self {
        let total = items.len() as u64;
        let size = query.size();
        let content = items
            .into_iter()
            .skip((query.page.saturating_mul(size)) as usize)
            .take(size as usize)
            .collect();
        Self::new(content, query, total)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

/// Envelope of every successful JSON response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Routes of the selected services, mounted under `/api/v1`.
pub fn api_routes(services: &[ServiceKind]) -> Router<AppState> {
    services
        .iter()
        .fold(Router::new(), |router, kind| match kind {
            ServiceKind::Order => router.nest("/api/v1/orders", handlers::orders::order_routes()),
            ServiceKind::Product => {
                router.nest("/api/v1/products", handlers::products::product_routes())
            }
            ServiceKind::Accountancy => router.nest(
                "/api/v1/accountancy",
                handlers::accountancy::accountancy_routes(),
            ),
            ServiceKind::Store => router.nest("/api/v1/store", handlers::store::store_routes()),
        })
}

/// The API, health, metrics and documentation routes with request-id propagation,
/// HTTP tracing and request metrics, ready to serve.
pub fn app_router(state: AppState) -> Router {
    let services = state.config.enabled_services();

    api_routes(&services)
        .merge(health::health_routes())
        .merge(crate::metrics::metrics_routes())
        .with_state(state)
        .merge(openapi::swagger_ui())
        .layer(middleware::from_fn(crate::metrics::track_http_metrics))
        .layer(crate::tracing::configure_http_tracing())
        // Outermost, so spans and metrics already see the id
        .layer(middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let json = serde_json::to_string(&ApiResponse::success(vec![1, 2])).unwrap();
        let parsed: ApiResponse<Vec<i32>> = serde_json::from_str(&json).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.data, Some(vec![1, 2]));
    }

    #[test]
    fn page_counts_are_zero_based() {
        let query = PageQuery { page: 1, size: 2 };
        let page = Page::from_sorted(vec![1, 2, 3, 4, 5], &query);
        assert_eq!(page.content, vec![3, 4]);
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn page_size_of_zero_is_clamped() {
        let query = PageQuery { page: 0, size: 0 };
        let page = Page::<i32>::new(vec![], &query, 0);
        assert_eq!(page.size, 1);
        assert_eq!(page.total_pages, 0);
    }
}
