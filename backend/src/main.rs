use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use backend::config::Config;
use backend::routes;
use backend::store::TaskStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let store = TaskStore::connect(&config.database_url).await?;

    let cors = routes::cors_layer(&config.allowed_origins)?;
    let app = routes::build_router(store.clone()).layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("server running on http://{}", listener.local_addr()?);
    info!("database: {}", config.database_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
}
