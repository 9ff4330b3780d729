//! Scaffold server: a small HTTP service with a `PostgreSQL`-backed user API.
//!
//! Request flow: listener ([`network::HttpServer`]) -> request id layers ->
//! interceptor chain ([`network::MiddlewareChain`]) -> router -> handler ->
//! [`traits::UserRepository`] -> error classification -> JSON response.

pub mod config;
pub mod logging;
pub mod network;
pub mod storage;
pub mod traits;

pub use config::{AppConfig, ConfigError};
pub use traits::UserRepository;
