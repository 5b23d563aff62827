//! Helpers shared by the endpoint handlers.

use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse a path or body identifier, mapping failure to a 400.
pub fn parse_id(raw: &str, field: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::invalid_id(field))
}

/// Blank strings in optional text fields are stored as `NULL`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
