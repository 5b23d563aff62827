//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, looks up the SHA-256 digest
//! in `staff_tokens`, and injects `StaffContext` into request extensions
//! for downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{hash_token, ApiContext, StaffContext};
use crate::db::repository::find_active_token;

/// Require a valid, non-revoked staff token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

pub(crate) fn bearer_token(req: &Request<axum::body::Body>) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token_hash = hash_token(bearer_token(&req).ok_or(ApiError::Unauthorized)?);

    let staff = {
        let conn = ctx.core.open_db()?;
        find_active_token(&conn, &token_hash)?
    };
    let Some(staff) = staff else {
        tracing::debug!("Rejected unknown or revoked token");
        return Err(ApiError::Unauthorized);
    };

    req.extensions_mut().insert(StaffContext {
        token_id: staff.id,
        staff_name: staff.staff_name,
        role: staff.role,
    });

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));

    Ok(response)
}
