use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use comic_pipeline::api::{self, AppState};
use comic_pipeline::config::ServiceConfig;
use comic_pipeline::{retention, ComicPipeline, ExecCtx, RequestLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comic_pipeline=debug,comic_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServiceConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(?config, "Loaded service configuration");

    // --- Pipeline ---
    let ctx = ExecCtx::builder(&config.llm_base_url)
        .openai_with_key(&config.llm_api_key)
        .llm_model(&config.llm_model)
        .image_base_url(&config.image_base_url)
        .minimax_with_key(&config.image_api_key)
        .image_model(&config.image_model)
        .build()
        .context("Failed to build HTTP client")?;
    let ledger = Arc::new(RequestLedger::new());
    let pipeline = ComicPipeline::new(ctx, ledger.clone());

    // --- Retention ---
    let retention_cancel = CancellationToken::new();
    let retention_handle = tokio::spawn(retention::run(
        ledger,
        config.sweep_interval,
        config.retention,
        retention_cancel.clone(),
    ));

    // --- Start server ---
    let app = api::router(AppState::new(pipeline));
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    retention_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
