//! Field format checks applied to incoming records before they are stored.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

static MRN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9-]{2,19}$").unwrap());
static STATE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());
static POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}(?:-\d{4})?$").unwrap());
static CVX_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,3}$").unwrap());
/// CPT (five digits) or HCPCS level II (letter + four digits).
static PROCEDURE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z0-9]\d{3}[0-9A-Z]$").unwrap());
static MEMBER_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]{3,30}$").unwrap());

fn check(re: &Regex, field: &'static str, value: &str, expected: &str) -> Result<(), ValidationError> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new(field, format!("'{value}' is not {expected}")))
    }
}

/// Non-blank text, returned trimmed.
pub fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(trimmed.to_string())
}

pub fn mrn(value: &str) -> Result<(), ValidationError> {
    check(&MRN, "mrn", value, "3-20 uppercase letters, digits or dashes")
}

pub fn state_code(field: &'static str, value: &str) -> Result<(), ValidationError> {
    check(&STATE_CODE, field, value, "a two-letter state code")
}

pub fn postal_code(value: &str) -> Result<(), ValidationError> {
    check(&POSTAL_CODE, "postal_code", value, "a ZIP or ZIP+4 code")
}

pub fn cvx_code(value: &str) -> Result<(), ValidationError> {
    check(&CVX_CODE, "cvx_code", value, "a numeric CVX code")
}

pub fn procedure_code(field: &'static str, value: &str) -> Result<(), ValidationError> {
    check(&PROCEDURE_CODE, field, value, "a CPT or HCPCS code")
}

pub fn member_id(value: &str) -> Result<(), ValidationError> {
    check(&MEMBER_ID, "member_id", value, "3-30 letters, digits or dashes")
}

pub fn non_negative(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(())
}
