//! Request interceptor chain.
//!
//! A [`MiddlewareChain`] is an ordered list of [`Interceptor`] values. The
//! first one added is the outermost: it sees the request first and the
//! response last. Each interceptor receives a [`Next`] handle and may call it
//! once to continue, or return its own response without calling it.
//!
//! The chain is installed as a tower [`Layer`] so it wraps the router (and
//! its fallback) the same way any tower middleware would.
//!
//! - [`recovery`]: turns a panic anywhere downstream into a 500 JSON response
//! - [`logging`]: one log event per request with status and duration
//! - [`cors`]: allow-list CORS headers and preflight short-circuit

pub mod cors;
pub mod logging;
pub mod recovery;

pub use cors::Cors;
pub use logging::RequestLogging;
pub use recovery::Recovery;

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::header::HeaderName;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service, ServiceBuilder, ServiceExt};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Boxed response future returned by interceptors.
pub type BoxResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

type Terminal = Box<dyn FnOnce(Request) -> BoxResponseFuture + Send>;

/// One stage of the chain.
///
/// Implementations clone whatever state they need into the returned future;
/// `handle` itself should do no work beyond that.
pub trait Interceptor: Send + Sync + 'static {
    /// Short name used in logs and `Debug` output.
    fn name(&self) -> &'static str;

    fn handle(&self, req: Request, next: Next) -> BoxResponseFuture;
}

/// The remainder of the chain after the current interceptor.
pub struct Next {
    stages: Arc<[Arc<dyn Interceptor>]>,
    index: usize,
    terminal: Terminal,
}

impl Next {
    /// Runs the next interceptor, or the wrapped service once none remain.
    pub fn run(mut self, req: Request) -> BoxResponseFuture {
        match self.stages.get(self.index).cloned() {
            Some(stage) => {
                self.index += 1;
                stage.handle(req, self)
            }
            None => (self.terminal)(req),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.stages.len().saturating_sub(self.index))
            .finish_non_exhaustive()
    }
}

/// Ordered interceptor list. Build it with [`MiddlewareChain::with`], then
/// install it with [`MiddlewareChain::into_layer`].
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stages: Vec<Arc<dyn Interceptor>>,
}

impl MiddlewareChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `interceptor` inside every interceptor added so far.
    #[must_use]
    pub fn with(mut self, interceptor: impl Interceptor) -> Self {
        self.stages.push(Arc::new(interceptor));
        self
    }

    /// Names from outermost to innermost.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[must_use]
    pub fn into_layer(self) -> ChainLayer {
        ChainLayer {
            stages: self.stages.into(),
        }
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Tower layer form of a [`MiddlewareChain`].
#[derive(Clone)]
pub struct ChainLayer {
    stages: Arc<[Arc<dyn Interceptor>]>,
}

impl<S> Layer<S> for ChainLayer {
    type Service = ChainService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ChainService {
            stages: Arc::clone(&self.stages),
            inner,
        }
    }
}

/// Service produced by [`ChainLayer`].
#[derive(Clone)]
pub struct ChainService<S> {
    stages: Arc<[Arc<dyn Interceptor>]>,
    inner: S,
}

impl<S> Service<Request> for ChainService<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Error: Into<Infallible>,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The wrapped service is driven with `oneshot`, which polls readiness itself.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let inner = self.inner.clone();
        let terminal: Terminal = Box::new(move |req| {
            Box::pin(async move {
                match inner.oneshot(req).await {
                    Ok(response) => response.into_response(),
                    Err(err) => match Into::<Infallible>::into(err) {},
                }
            })
        });
        let next = Next {
            stages: Arc::clone(&self.stages),
            index: 0,
            terminal,
        };
        let fut = next.run(req);
        Box::pin(async move { Ok(fut.await) })
    }
}

/// Request-id layer type produced by [`request_id_layers`].
pub type RequestIdLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<SetRequestIdLayer<MakeRequestUuid>, tower::layer::util::Identity>,
>;

/// Transport layers that run outside the interceptor chain: assign an
/// `x-request-id` (UUID v4 unless the client sent one) and copy it onto the
/// response.
#[must_use]
pub fn request_id_layers() -> RequestIdLayers {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(header.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(header))
        .into_inner()
}

/// The request id, or `"-"` when the header is missing or not UTF-8.
#[must_use]
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}
