use std::process::ExitCode;

use clinicops::config::ServerConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("clinicops: {e}");
            return ExitCode::FAILURE;
        }
    };
    clinicops::init_tracing(&config.log_filter);

    match clinicops::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
