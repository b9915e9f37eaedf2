use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use authtoken_store::store::{sweep_daemon, PgTokenRows, TokenMapper};
use authtoken_store::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authtoken_store=info,authtoken_sweeper=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("authtoken-sweeper v{}", env!("CARGO_PKG_VERSION"));

    let rows = PgTokenRows::connect(&config.database_url, config.max_connections).await?;
    rows.migrate().await?;
    info!("Database connected and migrated ✓");

    let mapper = TokenMapper::new(Arc::new(rows));
    let daemon = tokio::spawn(sweep_daemon(
        mapper,
        config.sweep_policy()?,
        config.sweep_interval(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    daemon.abort();

    Ok(())
}
