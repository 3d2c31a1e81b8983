use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{config::InvoiceExpiryConfig, metrics, services::invoices::InvoiceService};

/// Periodically cancels `CREATED` invoices older than the configured age, returning their
/// goods to the store. Returns `None` when the job is disabled.
pub fn start(service: Arc<InvoiceService>, config: &InvoiceExpiryConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("Invoice expiry job disabled");
        return None;
    }

    let ttl = chrono::Duration::days(config.ttl_days);
    let period = Duration::from_secs(config.interval_secs);
    info!(
        ttl_days = config.ttl_days,
        interval_secs = config.interval_secs,
        "Starting invoice expiry job"
    );

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            run_once(&service, ttl).await;
        }
    }))
}

/// One sweep; failures are logged and retried on the next tick.
pub async fn run_once(service: &InvoiceService, ttl: chrono::Duration) -> usize {
    match service.cancel_expired(ttl).await {
        Ok(cancelled) => {
            metrics::increment_counter_by("drugstore_invoices_expired_total", cancelled as u64);
            cancelled
        }
        Err(e) => {
            error!(error = %e, "Invoice expiry sweep failed");
            0
        }
    }
}
