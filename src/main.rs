use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let config = bulletin::config::AppConfig::from_env();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "bulletin",
        "bulletin starting: RUST_LOG='{}', http_port={}, base_uri={:?}, client_id_set={}, post_service_set={}, notify_service_set={}",
        rust_log,
        config.http_port,
        config.base_uri,
        config.client_id.is_some(),
        config.post_service_uri.is_some(),
        config.notify_service_uri.is_some()
    );

    bulletin::server::run(config).await
}
