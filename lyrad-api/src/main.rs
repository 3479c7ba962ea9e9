//! lyrad-api binary entry point

use anyhow::Result;
use lyrad_api::{build_context, build_router, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    info!("Starting lyrad-api");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Default provider: {}", config.default_provider);
    info!(
        "Accounts configured: {}",
        config.accounts().iter().filter(|a| !a.out_of_service).count()
    );

    let bind_addr = config.bind_addr.clone();
    let ctx = build_context(config);

    // background reaper for expired cache entries
    let reaper = lyrad_api::cache::spawn_reaper(
        ctx.cache.clone(),
        ctx.config.reaper_interval(),
        ctx.shutdown.clone(),
    );

    let app = build_router(ctx.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{bind_addr}");

    let shutdown = ctx.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    reaper.await?;
    Ok(())
}
