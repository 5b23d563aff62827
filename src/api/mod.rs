//! HTTP API for clinic staff.
//!
//! Routes are nested under `/api/` and protected by a middleware stack:
//! Rate Limit → Auth → Audit → Handler. `clinic_api_router()` returns a
//! `Router` that can be served by [`server::start_api_server`] or driven
//! directly in tests.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::clinic_api_router;
pub use server::{shutdown_signal, start_api_server, ApiServer};
pub use types::ApiContext;
