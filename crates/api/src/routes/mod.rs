//! HTTP route handlers.

pub mod carts;
pub mod catalog;
pub mod health;
pub mod inventory;
pub mod metrics;
pub mod orders;
pub mod sagas;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path or body identifier, reporting which field was malformed.
pub(crate) fn parse_id<T>(field: &str, value: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    value
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {field}: {e}")))
}
