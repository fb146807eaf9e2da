//! Seeds default configuration into a fresh database. Run once per deployment;
//! running it again leaves existing data untouched.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use roombook::config::AppConfig;
use roombook::db;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let mut conn = db::init_db(&config.database_url)
        .with_context(|| format!("failed to open {}", config.database_url))?;

    db::seed::bootstrap(&mut conn)?;
    tracing::info!(database = %config.database_url, "bootstrap complete");
    Ok(())
}
