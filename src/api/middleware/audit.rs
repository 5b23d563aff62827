//! Audit logging middleware.
//!
//! Logs every authenticated API request with staff name, method, path
//! and response status. Runs innermost (after auth has injected
//! `StaffContext`).

use axum::extract::OriginalUri;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, StaffContext};

/// Log API access for audit trail.
/// Accesses `ApiContext` from request extensions.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Nested routers see the path with the `/api` prefix stripped.
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let source = req
        .extensions()
        .get::<StaffContext>()
        .map(StaffContext::access_source);

    let response = next.run(req).await;

    if let (Some(ctx), Some(source)) = (ctx, source) {
        let status = response.status().as_u16();
        ctx.core
            .log_access(source, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
