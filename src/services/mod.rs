//! Business logic of the four services.
//!
//! Each service owns its tables, guards its own writes with a local transaction and reaches
//! the other services only through [`crate::clients`].

pub mod invoices;
pub mod orders;
pub mod price_items;
pub mod pricing;
pub mod products;
pub mod purchased_costs;
pub mod store;

use sea_orm::DbErr;
use tracing::error;

use crate::errors::ServiceError;

/// Logs a database failure with its context and wraps it.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(DbErr) -> ServiceError {
    move |e| {
        error!(error = %e, "{}", context);
        ServiceError::DatabaseError(e)
    }
}

/// `current + delta`, refused when it leaves the `i32` range of the quantity columns.
pub(crate) fn add_quantity(current: i32, delta: i32) -> Result<i32, ServiceError> {
    current
        .checked_add(delta)
        .ok_or_else(|| ServiceError::ValidationError("Quantity is out of range".to_string()))
}
