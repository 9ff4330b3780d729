//! Panic recovery.
//!
//! Catches a panic raised while handling a request, logs it, and answers
//! with a generic `INTERNAL_ERROR` body. The connection and the process stay
//! up; the next request is served normally.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::extract::Request;
use futures_util::FutureExt;
use scaffold_core::AppError;
use tracing::error;

use super::{request_id, BoxResponseFuture, Interceptor, Next};
use crate::network::error::error_response;

/// Outermost interceptor: converts downstream panics into 500 responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery;

impl Interceptor for Recovery {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn handle(&self, req: Request, next: Next) -> BoxResponseFuture {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let request_id = request_id(req.headers());

        // Calling `next` inside the future puts synchronous panics in
        // downstream `handle` methods under the same catch.
        let downstream = AssertUnwindSafe(async move { next.run(req).await });

        Box::pin(async move {
            match downstream.catch_unwind().await {
                Ok(response) => response,
                Err(panic) => {
                    error!(
                        method = %method,
                        path = %path,
                        request_id = %request_id,
                        panic = %panic_message(panic.as_ref()),
                        "recovered from panic while handling request"
                    );
                    error_response(&AppError::internal("Internal server error"), false)
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
