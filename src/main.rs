use formcraft::{build_app, config::AppConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = AppConfig::from_env();
    match &config.local_state_path {
        Some(path) => tracing::info!("persisting forms and responses to {}", path),
        None => tracing::warn!("LOCAL_STATE_PATH is off, forms and responses live in memory only"),
    }
    let app = build_app(&config);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("backend listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
