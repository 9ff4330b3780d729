//! HTTP listener lifecycle.
//!
//! [`HttpServer::start`] binds and spawns the accept loop, [`HttpServer::fault`]
//! reports a listener that died on its own, and [`HttpServer::stop`] drains
//! in-flight requests under a deadline.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::shutdown::ShutdownController;

/// How long `stop` waits for force-cancelled requests to unwind before the
/// accept loop is aborted outright.
const FORCE_CLOSE_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("server already started")]
    AlreadyStarted,
    #[error("shutdown already triggered; refusing to start")]
    ShuttingDown,
    #[error("listener failed: {0}")]
    Serve(#[source] io::Error),
    #[error("requests still in flight after {0:?}; remaining work was cancelled")]
    ShutdownTimeout(Duration),
    #[error("server task ended abnormally: {0}")]
    Task(#[from] JoinError),
}

/// Owns the listening socket and the task serving it.
pub struct HttpServer {
    config: NetworkConfig,
    router: Option<Router>,
    shutdown: Arc<ShutdownController>,
    task: Option<JoinHandle<io::Result<()>>>,
    local_addr: Option<SocketAddr>,
}

impl HttpServer {
    /// Prepares a server for `router`. Nothing is bound until [`start`](Self::start).
    ///
    /// `shutdown` must be the controller the router's state was built with,
    /// so readiness probes and request cancellation follow this server.
    #[must_use]
    pub fn new(config: NetworkConfig, router: Router, shutdown: Arc<ShutdownController>) -> Self {
        Self {
            config,
            router: Some(router),
            shutdown,
            task: None,
            local_addr: None,
        }
    }

    /// Bound address once started; with port 0 this is the OS-assigned port.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Binds the configured address and starts serving in a background task.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the address is unavailable,
    /// [`ServerError::AlreadyStarted`] on a second call,
    /// [`ServerError::ShuttingDown`] once the controller has been told to stop.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if self.shutdown.is_shutting_down() {
            return Err(ServerError::ShuttingDown);
        }
        let router = self.router.take().ok_or(ServerError::AlreadyStarted)?;
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(ServerError::Serve)?;

        let mut stop_rx = self.shutdown.shutdown_receiver();
        let graceful = async move {
            // A dropped controller also ends the accept loop.
            let _ = stop_rx.wait_for(|stop| *stop).await;
        };

        self.task = Some(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(graceful)
                .await
        }));
        self.local_addr = Some(local_addr);
        self.shutdown.set_ready();

        info!(address = %local_addr, "HTTP server listening");
        Ok(local_addr)
    }

    /// Completes when the accept loop exits without [`stop`](Self::stop)
    /// having been called. Never completes for a server that is not running.
    ///
    /// # Errors
    ///
    /// The I/O error or panic that ended the loop.
    pub async fn fault(&mut self) -> Result<(), ServerError> {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };
        let joined = task.await;
        self.task = None;
        self.shutdown.set_stopped();
        flatten(joined)
    }

    /// Stops accepting connections and waits up to `grace` for in-flight
    /// requests. Past the deadline every outstanding request is cancelled and
    /// its connection closed. Calling it again, or before `start`, is a no-op.
    ///
    /// # Errors
    ///
    /// [`ServerError::ShutdownTimeout`] when requests had to be cut off, or
    /// the error that ended the accept loop.
    pub async fn stop(&mut self, grace: Duration) -> Result<(), ServerError> {
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        info!(
            grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
            in_flight = self.shutdown.in_flight_count(),
            "stopping HTTP server"
        );
        self.shutdown.trigger_shutdown();

        if let Ok(joined) = tokio::time::timeout(grace, &mut task).await {
            self.shutdown.set_stopped();
            info!("HTTP server stopped");
            return flatten(joined);
        }

        warn!(
            in_flight = self.shutdown.in_flight_count(),
            "grace period elapsed; cancelling remaining requests"
        );
        self.shutdown.force_cancel();
        if tokio::time::timeout(FORCE_CLOSE_WAIT, &mut task).await.is_err() {
            task.abort();
        }
        self.shutdown.set_stopped();
        Err(ServerError::ShutdownTimeout(grace))
    }
}

fn flatten(joined: Result<io::Result<()>, JoinError>) -> Result<(), ServerError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ServerError::Serve(e)),
        Err(e) => Err(ServerError::Task(e)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use axum::middleware;
    use axum::routing::get;

    use super::*;
    use crate::network::handlers::AppState;
    use crate::network::middleware::{MiddlewareChain, Recovery, RequestLogging};
    use crate::network::router::{build_router, track_in_flight};
    use crate::network::HealthState;
    use crate::storage::InMemoryUserRepository;

    fn loopback() -> NetworkConfig {
        NetworkConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..NetworkConfig::default()
        }
    }

    /// A router whose `/slow` handler sleeps for `delay` and records completion.
    fn slow_router(
        shutdown: &Arc<ShutdownController>,
        delay: Duration,
        finished: &Arc<AtomicBool>,
    ) -> Router {
        let finished = Arc::clone(finished);
        Router::new()
            .route(
                "/slow",
                get(move || {
                    let finished = Arc::clone(&finished);
                    async move {
                        tokio::time::sleep(delay).await;
                        finished.store(true, Ordering::SeqCst);
                        "done"
                    }
                }),
            )
            .layer(middleware::from_fn_with_state(
                Arc::clone(shutdown),
                track_in_flight,
            ))
    }

    async fn wait_for_in_flight(shutdown: &ShutdownController) {
        while shutdown.in_flight_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn start_binds_os_assigned_port_and_becomes_ready() {
        let shutdown = Arc::new(ShutdownController::new());
        let mut server = HttpServer::new(loopback(), Router::new(), Arc::clone(&shutdown));
        assert_eq!(shutdown.health_state(), HealthState::Starting);

        let addr = server.start().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.local_addr(), Some(addr));
        assert_eq!(shutdown.health_state(), HealthState::Ready);

        assert!(matches!(server.start().await, Err(ServerError::AlreadyStarted)));
        server.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(shutdown.health_state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn start_after_shutdown_was_triggered_is_refused() {
        let shutdown = Arc::new(ShutdownController::new());
        shutdown.trigger_shutdown();
        let mut server = HttpServer::new(loopback(), Router::new(), Arc::clone(&shutdown));

        assert!(matches!(server.start().await, Err(ServerError::ShuttingDown)));
        assert!(server.local_addr().is_none());
        server.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkConfig {
            port: taken.local_addr().unwrap().port(),
            ..loopback()
        };
        let mut server = HttpServer::new(config, Router::new(), Arc::new(ShutdownController::new()));
        assert!(matches!(server.start().await, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn serves_real_requests() {
        let shutdown = Arc::new(ShutdownController::new());
        let state = AppState::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::clone(&shutdown),
        );
        let router = build_router(state, MiddlewareChain::new().with(Recovery));
        let mut server = HttpServer::new(loopback(), router, Arc::clone(&shutdown));
        let addr = server.start().await.unwrap();

        let response = reqwest::get(format!("http://{addr}/health/ready")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        server.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn stop_lets_in_flight_request_finish_within_grace() {
        let shutdown = Arc::new(ShutdownController::new());
        let finished = Arc::new(AtomicBool::new(false));
        let router = slow_router(&shutdown, Duration::from_millis(200), &finished);
        let mut server = HttpServer::new(loopback(), router, Arc::clone(&shutdown));
        let addr = server.start().await.unwrap();

        let request = tokio::spawn(async move {
            let response = reqwest::get(format!("http://{addr}/slow")).await?;
            response.text().await
        });
        wait_for_in_flight(&shutdown).await;

        server.stop(Duration::from_secs(5)).await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(request.await.unwrap().unwrap(), "done");
        assert_eq!(shutdown.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn stop_times_out_and_cancels_slow_request() {
        let shutdown = Arc::new(ShutdownController::new());
        let finished = Arc::new(AtomicBool::new(false));
        let router = slow_router(&shutdown, Duration::from_secs(30), &finished);
        let mut server = HttpServer::new(loopback(), router, Arc::clone(&shutdown));
        let addr = server.start().await.unwrap();

        let request =
            tokio::spawn(async move { reqwest::get(format!("http://{addr}/slow")).await });
        wait_for_in_flight(&shutdown).await;

        let err = server.stop(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ServerError::ShutdownTimeout(_)));
        assert!(shutdown.is_force_cancelled());
        assert!(!finished.load(Ordering::SeqCst));

        // The abandoned request gets a 503 or a closed connection, never "done".
        if let Ok(response) = request.await.unwrap() {
            assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[tokio::test]
    async fn panic_in_handler_does_not_take_the_server_down() {
        async fn panic_handler() -> &'static str {
            panic!("handler fault")
        }
        let shutdown = Arc::new(ShutdownController::new());
        let router = Router::new()
            .route("/panic", get(panic_handler))
            .route("/ok", get(|| async { "still here" }))
            .layer(
                MiddlewareChain::new()
                    .with(Recovery)
                    .with(RequestLogging)
                    .into_layer(),
            );
        let mut server = HttpServer::new(loopback(), router, Arc::clone(&shutdown));
        let addr = server.start().await.unwrap();

        let response = reqwest::get(format!("http://{addr}/panic")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["code"], "INTERNAL_ERROR");

        let response = reqwest::get(format!("http://{addr}/ok")).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "still here");

        server.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn stop_twice_is_a_no_op() {
        let mut server = HttpServer::new(
            loopback(),
            Router::new(),
            Arc::new(ShutdownController::new()),
        );
        server.start().await.unwrap();
        server.stop(Duration::from_secs(1)).await.unwrap();
        server.stop(Duration::from_secs(1)).await.unwrap();
    }
}
