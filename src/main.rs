use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use ara_reservation_notifier::config::Settings;
use ara_reservation_notifier::postgres::{create_pool, mask_database_url};
use ara_reservation_notifier::server::{create_app, AppState};
use ara_reservation_notifier::storage::create_backends;
use ara_reservation_notifier::telemetry::init_telemetry;
use ara_reservation_notifier::triggers::{LifecycleHandler, LifecycleSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing; the guard flushes spans on exit
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Storage
    let pool = if settings.storage.backend == "postgres" {
        tracing::info!(
            url = %mask_database_url(&settings.database.url),
            "Connecting to PostgreSQL"
        );
        Some(create_pool(&settings.database).await?)
    } else {
        None
    };
    let backends = create_backends(&settings.storage, pool);

    // Create application state
    let state = AppState::new(settings.clone(), &backends);
    tracing::info!(storage = backends.kind, "Application state initialized");

    // Start the lifecycle subscriber in background
    let (redis_handle, shutdown_tx) = if settings.redis.enabled {
        let handler = Arc::new(LifecycleHandler::new(
            state.coordinator.clone(),
            state.scheduler.clone(),
            backends.reservations.clone(),
        ));
        let subscriber = LifecycleSubscriber::new(settings.redis.clone(), handler);
        let shutdown_tx = subscriber.shutdown_signal();

        let handle = tokio::spawn(async move {
            if let Err(e) = subscriber.start().await {
                tracing::error!(error = %e, "Lifecycle subscriber failed");
            }
        });
        (Some(handle), shutdown_tx)
    } else {
        tracing::info!("Redis lifecycle subscriber disabled");
        (None, broadcast::channel::<()>(1).0)
    };

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for background tasks to finish
    if let Some(handle) = redis_handle {
        tracing::info!("Waiting for lifecycle subscriber to finish...");
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Lifecycle subscriber task panicked");
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop background subscribers
    let _ = shutdown_tx.send(());
}
