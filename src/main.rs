use std::{net::SocketAddr, sync::Arc, time::Instant};

use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use watchparty::{
    common::{
        banner::{BannerInfo, print_banner},
        logger,
        types::AnyResult,
    },
    configs::Config,
    party::{ContentCatalog, StaticCatalog},
    server::{AppState, SessionDirectory, spawn_sweeper},
    transport,
};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(&config);

    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    print_banner(&BannerInfo::default(), &address.to_string());

    if config.server.password.is_empty() {
        warn!("server.password is empty, requests are not authenticated");
    }

    let catalog = StaticCatalog::from_config(&config.catalog);
    info!(
        "Content catalog: {} entries (strict={})",
        catalog.len(),
        config.catalog.strict
    );
    let catalog: Arc<dyn ContentCatalog> = Arc::new(catalog);

    let shared_state = Arc::new(AppState {
        directory: SessionDirectory::new(config.party.clone(), catalog),
        config,
        start_time: Instant::now(),
    });

    let sweeper = spawn_sweeper(shared_state.clone());

    let app = transport::router(shared_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Watchparty listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
