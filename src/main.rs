use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use http::HeaderValue;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::{error, info};

use drugstore_api::config::{AppConfig, ServiceKind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Drugstore backend server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Services to host, e.g. `--service order,product`; overrides APP__SERVICES
    #[arg(long = "service", value_enum, value_delimiter = ',')]
    services: Vec<ServiceKind>,

    /// Port to listen on; overrides APP__PORT
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Apply database migrations before serving
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = drugstore_api::config::load_config().context("failed to load configuration")?;
    if !cli.services.is_empty() {
        cfg.services = cli
            .services
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
    }
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    cfg.auto_migrate |= cli.migrate;

    drugstore_api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = drugstore_api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        drugstore_api::db::run_migrations(&db_pool).await?;
    }
    let clients = drugstore_api::clients::PeerClients::from_config(&cfg.clients)?;
    let app_state = drugstore_api::AppState::new(Arc::new(db_pool), cfg.clone(), clients);

    let services = cfg.enabled_services();
    let expiry_job = if services.contains(&ServiceKind::Accountancy) {
        drugstore_api::jobs::invoice_expiry::start(
            app_state.services.invoices.clone(),
            &cfg.invoice_expiry,
        )
    } else {
        None
    };

    let cors = cors_layer(&cfg)?;
    let app = drugstore_api::app_router(app_state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(cors);

    // Bind and serve
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let hosted = services
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    info!(services = %hosted, "drugstore-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(job) = expiry_job {
        job.abort();
    }
    info!("drugstore-api stopped");
    Ok(())
}

/// Explicit origins win; otherwise development or the opt-in flag allow any origin.
fn cors_layer(cfg: &AppConfig) -> anyhow::Result<CorsLayer> {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any));
    }
    if cfg.should_allow_permissive_cors() {
        info!(environment = %cfg.environment, "CORS allows any origin");
        return Ok(CorsLayer::permissive());
    }
    anyhow::bail!("no CORS origins configured; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
