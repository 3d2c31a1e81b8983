pub mod accountancy;
pub mod order;
pub mod product;
pub mod store;

use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::ValidationError;

use crate::errors::ServiceError;

/// `?ids=1,2,3` query used by the batch lookup endpoints.
#[derive(Debug, Deserialize, IntoParams)]
pub struct IdsQuery {
    /// Comma-separated identifiers
    pub ids: String,
}

impl IdsQuery {
    pub fn parse(&self) -> Result<Vec<i64>, ServiceError> {
        parse_ids(&self.ids)
    }
}

pub fn parse_ids(raw: &str) -> Result<Vec<i64>, ServiceError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ServiceError::BadRequest(format!("Invalid id: {}", s)))
        })
        .collect()
}

/// Joins ids the way [`parse_ids`] reads them.
pub fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Upper bound of prices and markups accepted from clients.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

pub(crate) fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("Must not be negative".into());
        return Err(err);
    }
    if *value > MAX_AMOUNT {
        let mut err = ValidationError::new("max_amount");
        err.message = Some("Must not exceed 1000000000".into());
        return Err(err);
    }
    Ok(())
}
