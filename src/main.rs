use anyhow::Result;
use tokio_util::sync::CancellationToken;

use meddrop::config::ServerConfig;
use meddrop::http::{self, AppState, qr};
use meddrop::sweeper::ExpirySweeper;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meddrop=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        "Starting with backend {:?}, data dir {}",
        config.backend,
        config.data_dir.display()
    );

    let state = AppState::build(config).await?;

    let cancel_token = CancellationToken::new();
    let sweeper = ExpirySweeper::new(
        state.store.clone(),
        state.broadcaster.clone(),
        state.vault.clone(),
        state.config.ttl,
        state.config.sweep_interval,
    );
    let sweeper_handle = sweeper.spawn(cancel_token.clone());

    tracing::info!(
        "Open http://localhost:{}/receive on this machine",
        state.config.port
    );
    tracing::info!(
        "Phones reach uploads at {}",
        qr::upload_url(&state.config, "<transfer-id>")
    );

    let serve_cancel = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received ctrl-c, shutting down");
            serve_cancel.cancel();
        }
    });

    http::serve(state, cancel_token).await?;
    sweeper_handle.await?;

    Ok(())
}
