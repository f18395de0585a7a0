use anyhow::Result;
use clap::Parser;
use moltin::admin_cli::{handle_admin_command, AdminCli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("moltin=info")),
        )
        .with_target(false)
        .without_time()
        .init();

    handle_admin_command(AdminCli::parse()).await
}
