use anyhow::{Context, Result};
use moltin::app_log;
use moltin::{start_web_server, EnvironmentConfig};
use std::fs::OpenOptions;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = EnvironmentConfig::load()?;

    // Optional JSON log file next to the console output
    let file_layer = match &config.log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_current_span(false)
                    .with_span_list(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("moltin=info,rocket::server=off")),
        )
        .init();

    app_log!(info, "Environment: {}", config.environment);
    if let Some(path) = &config.log_file {
        app_log!(info, "Log file: {}", path.display());
    }

    start_web_server(config).await
}
