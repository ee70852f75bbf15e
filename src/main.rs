use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use catalogd::config::{ENV_CONFIG_FILE, CatalogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = CatalogConfig::from_env()?;

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config_file = std::env::var(ENV_CONFIG_FILE).unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "catalogd starting: RUST_LOG='{}', config_file='{}', init_strategy={:?}, service_id={}, load_timeout_ms={}, http_port={}, metastore_root='{}'",
        rust_log, config_file, config.init_strategy, config.service_id, config.load_timeout_ms, config.http_port, config.metastore_root
    );

    catalogd::server::run(config).await
}
