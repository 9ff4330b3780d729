//! HTTP surface: configuration, interceptor chain, routes, handlers, error
//! responses, and the listener lifecycle.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod router;
pub mod shutdown;

pub use config::NetworkConfig;
pub use error::ApiError;
pub use handlers::{AppState, Ctx};
pub use middleware::{Cors, Interceptor, MiddlewareChain, Next, Recovery, RequestLogging};
pub use module::{HttpServer, ServerError};
pub use router::build_router;
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
