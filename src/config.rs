use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::diversion::DiversionSettings;

/// Application-level constants
pub const APP_NAME: &str = "ClinicOps";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 8787;

/// Default tracing filter when neither `CLINICOPS_LOG` nor `RUST_LOG` is set.
pub fn default_log_filter() -> &'static str {
    "clinicops=info,tower_http=warn"
}

/// Get the application data directory (`<data dir>/ClinicOps`).
/// Falls back to the working directory when the platform has none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join("clinicops.db")
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration, read from `CLINICOPS_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    pub log_filter: String,
    /// Admin token seeded into `staff_tokens` on first start.
    pub bootstrap_token: Option<String>,
    pub diversion: DiversionSettings,
    /// Allowed browser origin. No CORS layer when unset.
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            db_path: default_db_path(),
            log_filter: default_log_filter().to_string(),
            bootstrap_token: None,
            diversion: DiversionSettings::default(),
            cors_origin: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests need not touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("CLINICOPS_HOST") {
            config.host = parse_var("CLINICOPS_HOST", &host)?;
        }
        if let Some(port) = lookup("CLINICOPS_PORT") {
            config.port = parse_var("CLINICOPS_PORT", &port)?;
        }
        if let Some(path) = lookup("CLINICOPS_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(filter) = lookup("CLINICOPS_LOG").or_else(|| lookup("RUST_LOG")) {
            config.log_filter = filter;
        }
        config.bootstrap_token = lookup("CLINICOPS_BOOTSTRAP_TOKEN").filter(|t| !t.trim().is_empty());
        config.cors_origin = lookup("CLINICOPS_CORS_ORIGIN").filter(|o| !o.trim().is_empty());

        if let Some(radius) = lookup("CLINICOPS_GEOFENCE_RADIUS_M") {
            let value: f64 = parse_var("CLINICOPS_GEOFENCE_RADIUS_M", &radius)?;
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid("CLINICOPS_GEOFENCE_RADIUS_M", &radius, "must be a positive distance"));
            }
            config.diversion.geofence_radius_m = value;
        }
        if let Some(threshold) = lookup("CLINICOPS_BIOMETRIC_THRESHOLD") {
            let value: f64 = parse_var("CLINICOPS_BIOMETRIC_THRESHOLD", &threshold)?;
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid("CLINICOPS_BIOMETRIC_THRESHOLD", &threshold, "must be between 0 and 1"));
            }
            config.diversion.biometric_threshold = value;
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(var, value, &e.to_string()))
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
