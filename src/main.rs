use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use visit_dashboard::feed::FeedSet;
use visit_dashboard::taxonomy::Catalog;
use visit_dashboard::{AppState, Config, Engine, load_feeds, load_taxonomy, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env()?;
    let catalog = Catalog::from_config(&load_taxonomy(&config.taxonomy_path).await)?;
    info!(
        categories = catalog.categories.len(),
        towns = catalog.towns.len(),
        "loaded taxonomy"
    );
    let feeds = FeedSet::from_snapshot(load_feeds(&config.data_path).await);
    let state = AppState::new(Engine::new(catalog, config.engine), feeds);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
    }
}
