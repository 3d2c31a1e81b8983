/*!
 * # Metrics Module
 *
 * In-process counters, gauges and histograms for the drugstore services.
 *
 * Metrics are exposed in the following formats:
 * - Prometheus text format at `/metrics`
 * - JSON format at `/metrics/json`
 *
 * Business events (invoices created, paid, cancelled, orders delivered) are counted by the
 * services through [`increment_counter`]; HTTP traffic is recorded by [`track_http_metrics`].
 */

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use dashmap::DashMap;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        error!(error = %self, "Metrics export failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Holds the bit pattern of an `f64`.
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    bits: Arc<AtomicU64>,
}

impl Gauge {
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Count and sum of observations; the sum is kept in microseconds.
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    sum_micros: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    pub fn observe(&self, seconds: f64) {
        let micros = (seconds.max(0.0) * 1_000_000.0) as u64;
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Counter>,
    gauges: DashMap<String, Gauge>,
    histograms: DashMap<String, Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_counter(&self, name: &str) -> Counter {
        self.counters
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn get_or_create_gauge(&self, name: &str) -> Gauge {
        self.gauges.entry(name.to_string()).or_default().clone()
    }

    pub fn get_or_create_histogram(&self, name: &str) -> Histogram {
        self.histograms
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Prometheus text exposition, sorted by metric name.
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        use std::fmt::Write;

        let mut output = String::new();
        let write_err = |e: std::fmt::Error| MetricsError::ExportError(e.to_string());

        let mut counters: Vec<(String, u64)> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), e.value().get()))
            .collect();
        counters.sort();
        for (name, value) in counters {
            writeln!(output, "# TYPE {} counter", name).map_err(write_err)?;
            writeln!(output, "{} {}", name, value).map_err(write_err)?;
        }

        let mut gauges: Vec<(String, f64)> = self
            .gauges
            .iter()
            .map(|e| (e.key().clone(), e.value().get()))
            .collect();
        gauges.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in gauges {
            writeln!(output, "# TYPE {} gauge", name).map_err(write_err)?;
            writeln!(output, "{} {}", name, value).map_err(write_err)?;
        }

        let mut histograms: Vec<(String, Histogram)> = self
            .histograms
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        histograms.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, histogram) in histograms {
            writeln!(output, "# TYPE {} histogram", name).map_err(write_err)?;
            writeln!(output, "{}_count {}", name, histogram.get_count()).map_err(write_err)?;
            writeln!(output, "{}_sum {}", name, histogram.get_sum()).map_err(write_err)?;
        }

        Ok(output)
    }

    pub fn export_metrics_json(&self) -> serde_json::Value {
        let counters: serde_json::Map<String, serde_json::Value> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), json!(e.value().get())))
            .collect();

        let gauges: serde_json::Map<String, serde_json::Value> = self
            .gauges
            .iter()
            .map(|e| (e.key().clone(), json!(e.value().get())))
            .collect();

        let histograms: serde_json::Map<String, serde_json::Value> = self
            .histograms
            .iter()
            .map(|e| {
                (
                    e.key().clone(),
                    json!({
                        "count": e.value().get_count(),
                        "sum": e.value().get_sum(),
                    }),
                )
            })
            .collect();

        json!({
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }
}

// Global metrics registry
lazy_static::lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

pub fn increment_counter(name: &str) {
    METRICS.get_or_create_counter(name).inc();
}

pub fn increment_counter_by(name: &str, value: u64) {
    METRICS.get_or_create_counter(name).inc_by(value);
}

pub fn set_gauge(name: &str, value: f64) {
    METRICS.get_or_create_gauge(name).set(value);
}

pub fn observe_histogram(name: &str, value: f64) {
    METRICS.get_or_create_histogram(name).observe(value);
}

/// Records one served request by status class.
pub fn record_http_request(duration: Duration, status: StatusCode) {
    increment_counter("http_requests_total");
    observe_histogram("http_request_duration_seconds", duration.as_secs_f64());

    let class = match status.as_u16() {
        200..=299 => "http_status_2xx_total",
        300..=399 => "http_status_3xx_total",
        400..=499 => "http_status_4xx_total",
        _ => "http_status_5xx_total",
    };
    increment_counter(class);
}

/// Middleware timing every request
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    record_http_request(started.elapsed(), response.status());
    response
}

pub async fn metrics_handler() -> Result<Response, MetricsError> {
    let body = METRICS.export_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

pub async fn metrics_json_handler() -> Json<serde_json::Value> {
    Json(METRICS.export_metrics_json())
}

/// `/metrics` and `/metrics/json`; mergeable into any router.
pub fn metrics_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/metrics/json", get(metrics_json_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_is_sorted_prometheus_text() {
        let registry = MetricsRegistry::new();
        registry.get_or_create_counter("b_total").inc_by(2);
        registry.get_or_create_counter("a_total").inc();
        registry.get_or_create_gauge("pool_size").set(4.0);

        let text = registry.export_metrics().unwrap();
        let a = text.find("a_total 1").unwrap();
        let b = text.find("b_total 2").unwrap();
        assert!(a < b);
        assert!(text.contains("# TYPE pool_size gauge\npool_size 4\n"));
    }

    #[test]
    fn gauge_keeps_fractions() {
        let gauge = Gauge::default();
        gauge.set(0.25);
        assert_eq!(gauge.get(), 0.25);
    }

    #[test]
    fn histogram_accumulates_seconds() {
        let registry = MetricsRegistry::new();
        let histogram = registry.get_or_create_histogram("latency");
        histogram.observe(0.5);
        histogram.observe(0.25);

        let json = registry.export_metrics_json();
        assert_eq!(json["histograms"]["latency"]["count"], 2);
        assert_eq!(json["histograms"]["latency"]["sum"], 0.75);
    }
}
