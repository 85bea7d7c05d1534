use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;

use tixgo_template_service::config::Settings;
use tixgo_template_service::postgres::PostgresPool;
use tixgo_template_service::server::{create_app, AppState};
use tixgo_template_service::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new().context("failed to load configuration")?;

    // Initialize tracing
    init_tracing(&settings.log)?;
    tracing::info!(backend = %settings.template.backend, "Configuration loaded");

    // Connect to PostgreSQL when configured
    let postgres_pool = match settings.database.url {
        Some(_) => {
            let pool = PostgresPool::new(&settings.database)
                .await
                .context("failed to connect to PostgreSQL")?;
            if settings.database.run_migrations {
                pool.run_migrations().await?;
            }
            Some(pool)
        }
        None => None,
    };

    // Create application state
    let state = AppState::new(settings.clone(), postgres_pool.clone());
    tracing::info!("Application state initialized");

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler())
        .await?;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() {
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
                tracing::error!(error = %e, "Failed to install signal handler");
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
}
