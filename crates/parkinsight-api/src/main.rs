//! ParkInsight API server.
//!
//! Serves voice-feature classification, multi-model comparison, voice
//! analysis of uploaded recordings, and clinical risk assessment. Models
//! load in the background; requests that need them get 503 until the
//! registry is ready.

use parkinsight_api::config::resolve_config;
use parkinsight_api::shutdown::shutdown_signal;
use parkinsight_api::{build_router, spawn_model_loading, AppState};
use parkinsight_core::LoggingConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration: from CLI arg, env var, or default
    let config = resolve_config(std::env::args().nth(1))?;

    init_logging(&config.logging);

    info!(
        listen_addr = %config.listen_addr,
        model_dir = %config.model_dir,
        models = config.models.len(),
        auth = config.auth.enabled,
        "Starting ParkInsight API server"
    );

    let listen_addr = config.listen_addr.clone();
    let state = Arc::new(AppState::new(config)?);
    let loader = spawn_model_loading(Arc::clone(&state));

    let app = build_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!(%listen_addr, "API server listening");

    let coordinator = state.shutdown.clone();
    let signal = shutdown_signal(coordinator.clone());
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
    });

    let shutdown_token = coordinator.token();
    tokio::select! {
        result = &mut server => {
            loader.abort();
            return match result {
                Ok(served) => served.map_err(Into::into),
                Err(e) => Err(anyhow::anyhow!("Server task failed: {}", e)),
            };
        }
        _ = shutdown_token.cancelled() => {}
    }

    loader.abort();
    if !coordinator.drain().await {
        warn!("Exiting with requests still in flight");
    }
    match tokio::time::timeout(Duration::from_secs(1), server).await {
        Ok(Ok(Ok(()))) => info!("Server stopped"),
        Ok(Ok(Err(e))) => warn!(error = %e, "Server exited with error"),
        Ok(Err(e)) => warn!(error = %e, "Server task failed"),
        Err(_) => warn!("Server did not stop in time"),
    }

    Ok(())
}

/// Initialise `tracing` from the logging section; `RUST_LOG` takes precedence.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}
