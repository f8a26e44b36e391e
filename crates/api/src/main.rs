//! Fulfillment service entry point.

use std::process::ExitCode;

use api::config::Config;
use api::runtime::{init_tracing, install_metrics};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.log_format, &config.log_level);

    let metrics_handle = match install_metrics() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    match api::service::run(config, metrics_handle).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "service failed");
            ExitCode::FAILURE
        }
    }
}
