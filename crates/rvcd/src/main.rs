//! rvcd - RV-C-over-CAN bridge daemon

use clap::Parser;
use rvcd::{Config, Daemon};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    let env_filter = EnvFilter::new(&config.logging_level);
    let registry = tracing_subscriber::registry().with(env_filter);
    if config.logging_log_format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    if let Err(err) = config.validate() {
        error!("invalid configuration: {err}");
        return ExitCode::FAILURE;
    }

    info!("rvcd v{} starting", env!("CARGO_PKG_VERSION"));

    let daemon = match Daemon::new(&config).await {
        Ok(daemon) => daemon,
        Err(err) => {
            error!("failed to initialize rvcd: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = daemon.run().await {
        error!("rvcd exited with error: {err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
