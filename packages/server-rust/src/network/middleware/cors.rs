//! Cross-origin resource sharing against a configured allow-list.
//!
//! `*` in the list allows every origin and is answered with a literal `*`.
//! Otherwise a request origin is echoed back only when it is on the list;
//! an unknown origin gets no `Access-Control-Allow-Origin` header at all.
//! `OPTIONS` requests are answered here with an empty 204.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;

use super::{BoxResponseFuture, Interceptor, Next};

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Request-ID";

/// How long browsers may cache a preflight answer.
pub const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct Policy {
    any_origin: bool,
    origins: Vec<HeaderValue>,
}

#[derive(Debug, Clone)]
pub struct Cors {
    policy: Arc<Policy>,
}

impl Cors {
    /// Builds the policy from configured origins. Blank and unparsable
    /// entries are skipped; configuration validation rejects them earlier.
    #[must_use]
    pub fn new<S: AsRef<str>>(origins: &[S]) -> Self {
        let mut any_origin = false;
        let mut parsed = Vec::new();
        for origin in origins.iter().map(|o| o.as_ref().trim()) {
            match origin {
                "" => {}
                "*" => any_origin = true,
                other => {
                    if let Ok(value) = HeaderValue::from_str(other) {
                        parsed.push(value);
                    }
                }
            }
        }
        Self {
            policy: Arc::new(Policy {
                any_origin,
                origins: parsed,
            }),
        }
    }

    /// Value for `Access-Control-Allow-Origin`, if the origin is allowed.
    #[must_use]
    pub fn allowed_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        if self.policy.any_origin {
            return Some(HeaderValue::from_static("*"));
        }
        let origin = origin?;
        self.policy
            .origins
            .iter()
            .any(|allowed| allowed == origin)
            .then(|| origin.clone())
    }

    fn decorate(&self, headers: &mut HeaderMap, allow_origin: Option<HeaderValue>) {
        if let Some(origin) = allow_origin {
            set_default(headers, ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        if !self.policy.any_origin {
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
        set_default(
            headers,
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        set_default(
            headers,
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        set_default(
            headers,
            ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from(PREFLIGHT_MAX_AGE.as_secs()),
        );
    }
}

/// Inserts unless downstream already set the header.
fn set_default(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    headers.entry(name).or_insert(value);
}

impl Interceptor for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn handle(&self, req: Request, next: Next) -> BoxResponseFuture {
        let allow_origin = self.allowed_origin(req.headers().get(ORIGIN));
        let preflight = req.method() == Method::OPTIONS;
        let cors = self.clone();

        Box::pin(async move {
            let mut response = if preflight {
                StatusCode::NO_CONTENT.into_response()
            } else {
                next.run(req).await
            };
            cors.decorate(response.headers_mut(), allow_origin);
            response
        })
    }
}
