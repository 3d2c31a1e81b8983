use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PEER_URL: &str = "http://localhost:8080";
const CONFIG_DIR: &str = "config";

/// One of the four drugstore services hosted by this binary.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ServiceKind {
    Order,
    Product,
    Accountancy,
    Store,
}

/// Base URLs of the peer services and the shared request timeout.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ClientsConfig {
    #[serde(default = "default_peer_url")]
    #[validate(custom = "validate_base_url")]
    pub order_url: String,

    #[serde(default = "default_peer_url")]
    #[validate(custom = "validate_base_url")]
    pub product_url: String,

    #[serde(default = "default_peer_url")]
    #[validate(custom = "validate_base_url")]
    pub accountancy_url: String,

    #[serde(default = "default_peer_url")]
    #[validate(custom = "validate_base_url")]
    pub store_url: String,

    /// Per-request timeout for peer calls, in seconds
    #[serde(default = "default_client_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            order_url: default_peer_url(),
            product_url: default_peer_url(),
            accountancy_url: default_peer_url(),
            store_url: default_peer_url(),
            timeout_secs: default_client_timeout_secs(),
        }
    }
}

impl ClientsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Schedule of the job that cancels unpaid invoices.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct InvoiceExpiryConfig {
    #[serde(default = "default_true_bool")]
    pub enabled: bool,

    /// Age after which a `CREATED` invoice is cancelled
    #[serde(default = "default_invoice_ttl_days")]
    #[validate(range(min = 1, max = 3650))]
    pub ttl_days: i64,

    #[serde(default = "default_invoice_interval_secs")]
    #[validate(range(min = 1, max = 604800))]
    pub interval_secs: u64,
}

impl Default for InvoiceExpiryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true_bool(),
            ttl_days: default_invoice_ttl_days(),
            interval_secs: default_invoice_interval_secs(),
        }
    }
}

/// Settings of one drugstore process.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Services mounted by this process: "all" or a comma-separated list
    #[serde(default = "default_services")]
    #[validate(custom = "validate_services")]
    pub services: String,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    #[serde(default)]
    #[validate]
    pub clients: ClientsConfig,

    #[serde(default)]
    #[validate]
    pub invoice_expiry: InvoiceExpiryConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            services: default_services(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            clients: ClientsConfig::default(),
            invoice_expiry: InvoiceExpiryConfig::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Development, or an explicit opt-in, accepts any CORS origin.
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Services to mount, in a stable order.
    pub fn enabled_services(&self) -> Vec<ServiceKind> {
        parse_services(&self.services).unwrap_or_default()
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("cannot read configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_services() -> String {
    "all".to_string()
}

fn default_peer_url() -> String {
    DEFAULT_PEER_URL.to_string()
}

fn default_client_timeout_secs() -> u64 {
    10
}

fn default_invoice_ttl_days() -> i64 {
    3
}

fn default_invoice_interval_secs() -> u64 {
    3600
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    30
}

fn default_true_bool() -> bool {
    true
}

fn parse_services(raw: &str) -> Result<Vec<ServiceKind>, String> {
    use strum::IntoEnumIterator;

    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        return Ok(ServiceKind::iter().collect());
    }

    let mut services = Vec::new();
    for name in trimmed.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = ServiceKind::from_str(name).map_err(|_| name.to_string())?;
        if !services.contains(&kind) {
            services.push(kind);
        }
    }
    Ok(services)
}

fn validate_services(raw: &str) -> Result<(), ValidationError> {
    parse_services(raw).map(|_| ()).map_err(|unknown| {
        let mut err = ValidationError::new("services");
        err.message = Some(
            format!(
                "Unknown service '{}'; expected all, order, product, accountancy or store",
                unknown
            )
            .into(),
        );
        err
    })
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_base_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        let mut err = ValidationError::new("base_url");
        err.message = Some("Peer URLs must start with http:// or https://".into());
        Err(err)
    }
}

fn otel_requested() -> bool {
    let flag = env::var("APP__OTEL_ENABLED")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true"))
        .unwrap_or(false);
    flag || env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
}

fn otlp_tracer() -> Result<opentelemetry_sdk::trace::Tracer, opentelemetry::trace::TraceError> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());
    let service_name =
        env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "drugstore-api".to_string());

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(
            sdktrace::config()
                .with_resource(Resource::new(vec![KeyValue::new("service.name", service_name)])),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
}

/// Installs the global subscriber: plain or JSON lines, plus OTLP export when requested.
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("drugstore_api={},tower_http=debug", level));

    let output = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let tracer = if otel_requested() {
        match otlp_tracer() {
            Ok(tracer) => Some(tracer),
            Err(err) => {
                // Subscriber is not up yet
                eprintln!("OTLP exporter unavailable, logging locally only: {}", err);
                None
            }
        }
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new(directive))
        .with(output)
        .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
        .try_init();
}

/// Reads the configuration from `config/` and the environment.
///
/// Later sources win: built-in defaults, `default.toml`, `{RUN_ENV}.toml`, then `APP__*`
/// variables (`APP__CLIENTS__STORE_URL` sets `clients.store_url`).
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    if !config_dir.exists() {
        info!(dir = %config_dir.display(), "No config directory, using defaults and environment");
    }

    let file_source =
        |name: &str| File::with_name(&config_dir.join(name).to_string_lossy()).required(false);

    let app_config: AppConfig = Config::builder()
        .set_default("database_url", "sqlite://drugstore.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("services", "all")?
        .add_source(file_source("default"))
        .add_source(file_source(&run_env))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    app_config
        .validate()
        .and_then(|_| app_config.validate_additional_constraints())
        .map_err(|e| {
            error!(environment = %run_env, errors = ?e, "Rejected configuration");
            AppConfigError::Validation(e)
        })?;

    info!(
        environment = %run_env,
        services = %app_config.services,
        "Configuration loaded"
    );
    Ok(app_config)
}
