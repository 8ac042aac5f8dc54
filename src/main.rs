use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seguro_veiculo_api::config::Config;
use seguro_veiculo_api::handlers::{self, AppState};
use seguro_veiculo_api::services;
use seguro_veiculo_api::simulation::QuoteSimulator;

/// Main entry point for the application.
///
/// Initializes tracing, loads the configuration, wires the FIPE and accident history
/// providers into the quote simulator and serves the HTTP API until Ctrl-C / SIGTERM.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seguro_veiculo_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let (valuation, history) = services::build_providers(&config)?;
    let simulator = QuoteSimulator::new(valuation, history);
    tracing::info!("Quote simulator initialized");

    // In-flight simulations observe this and end as cancelled
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app_state = Arc::new(AppState {
        simulator,
        shutdown: shutdown_rx,
    });

    let app = handlers::router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown().await;
            tracing::info!("Shutdown signal received, cancelling in-flight simulations");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
