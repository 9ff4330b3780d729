//! `scaffold-server` entry point.
//!
//! Startup order: configuration, logging, storage, router, listener. Any
//! failure before the listener is up exits non-zero. Shutdown runs on
//! SIGINT/SIGTERM or a listener fault; the database pool is closed only after
//! the server has stopped.

use std::sync::Arc;

use anyhow::Context;
use scaffold_core::Validator;
use scaffold_server::config::AppConfig;
use scaffold_server::logging;
use scaffold_server::network::{
    build_router, AppState, Cors, HttpServer, MiddlewareChain, Recovery, RequestLogging,
    ShutdownController,
};
use scaffold_server::storage::{InMemoryUserRepository, StorageBackend};
use scaffold_server::traits::UserRepository;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let validator = Arc::new(Validator::new());
    let config = match AppConfig::load(&validator) {
        Ok(config) => config,
        Err(scaffold_server::ConfigError::Parse(e)) => e.exit(),
        Err(e) => return Err(e.into()),
    };
    logging::init(&config.observability)?;

    let (users, pool) = open_storage(&config).await?;

    let shutdown = Arc::new(ShutdownController::new());
    let state = AppState::from_config(&config, users, validator, Arc::clone(&shutdown));
    let chain = MiddlewareChain::new()
        .with(Recovery)
        .with(RequestLogging)
        .with(Cors::new(&config.server.cors_origins));
    info!(interceptors = ?chain, "middleware chain assembled");

    let mut server = HttpServer::new(config.server.clone(), build_router(state, chain), shutdown);
    server.start().await.context("failed to start HTTP server")?;

    let fault = tokio::select! {
        () = shutdown_signal() => None,
        result = server.fault() => Some(result),
    };
    let outcome = match fault {
        None => {
            info!("shutdown signal received");
            server.stop(config.server.shutdown_grace()).await
        }
        Some(result) => {
            if let Err(e) = &result {
                error!(error = %e, "HTTP server stopped unexpectedly");
            }
            result
        }
    };

    close_storage(pool).await;
    outcome.context("HTTP server did not shut down cleanly")?;
    info!("shutdown complete");
    Ok(())
}

#[cfg(feature = "postgres")]
type Pool = Option<sqlx::PgPool>;
#[cfg(not(feature = "postgres"))]
type Pool = Option<()>;

async fn open_storage(config: &AppConfig) -> anyhow::Result<(Arc<dyn UserRepository>, Pool)> {
    match config.storage {
        StorageBackend::Memory => {
            info!("using in-memory user storage");
            let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::new());
            Ok((users, None))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            use scaffold_server::storage::{connect, run_migrations, PgUserRepository};

            let pool = connect(&config.database)
                .await
                .context("database unreachable")?;
            run_migrations(&pool).await?;
            let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
            Ok((users, Some(pool)))
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => {
            anyhow::bail!("built without the `postgres` feature; set API_STORAGE=memory")
        }
    }
}

#[allow(clippy::unused_async)]
async fn close_storage(pool: Pool) {
    #[cfg(feature = "postgres")]
    if let Some(pool) = pool {
        pool.close().await;
        info!("database pool closed");
    }
    #[cfg(not(feature = "postgres"))]
    let _ = pool;
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
