pub mod api;
pub mod billing; // OTP bundle vs APG pricing
pub mod config;
pub mod core_state;
pub mod db;
pub mod diversion; // Biometric + geofence verification
pub mod dosing; // Take-home kits and compliance alerts
pub mod dual_eligible;
pub mod eligibility;
pub mod equity; // Health-equity stratified outcomes
pub mod facility;
pub mod labs;
pub mod models;
pub mod pmp;
pub mod prior_auth;
pub mod support;
pub mod vaccination;
pub mod validation;
pub mod workflow;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::endpoints::auth::seed_bootstrap_token;
use crate::api::server::ServerError;
use crate::config::ServerConfig;
use crate::core_state::{CoreError, CoreState};
use crate::db::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Audit(#[from] CoreError),
}

/// Initialize the global tracing subscriber. Later calls are ignored.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter)
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Migrate the database, seed the bootstrap token, serve until a shutdown
/// signal arrives, then flush the audit buffer.
pub async fn run(config: ServerConfig) -> Result<(), StartupError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let conn = db::open_database(&config.db_path)?;
    if let Some(token) = config.bootstrap_token.as_deref() {
        if seed_bootstrap_token(&conn, token)? {
            tracing::info!("Bootstrap admin token stored");
        }
    }
    drop(conn);
    tracing::info!(db = %config.db_path.display(), "Database ready");

    let core = Arc::new(CoreState::new(config.db_path.clone(), config.diversion));
    let app = api::clinic_api_router(core.clone(), config.cors_origin.as_deref());
    let server = api::start_api_server(config.socket_addr(), app).await?;

    api::shutdown_signal().await;
    server.stop().await?;

    core.flush_and_prune_audit()?;
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
