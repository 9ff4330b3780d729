//! Access logging: one `info` event per completed request.

use std::time::Instant;

use axum::extract::Request;
use tracing::info;

use super::{request_id, BoxResponseFuture, Interceptor, Next};

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogging;

impl Interceptor for RequestLogging {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn handle(&self, req: Request, next: Next) -> BoxResponseFuture {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let request_id = request_id(req.headers());

        Box::pin(async move {
            let start = Instant::now();
            let response = next.run(req).await;

            #[allow(clippy::cast_possible_truncation)]
            let duration_ms = start.elapsed().as_millis() as u64;

            info!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                duration_ms = duration_ms,
                request_id = %request_id,
                "request completed"
            );
            response
        })
    }
}
