use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Per-request context threaded as the first argument of every repository
/// and handler operation.
///
/// Carries the request id for log correlation, an optional absolute deadline,
/// and a cancellation token that fires when the client goes away or the
/// server abandons in-flight work during a forced shutdown.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id, echoed in the `x-request-id` response header.
    pub request_id: String,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Context with no deadline and a fresh, un-cancelled token.
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Context for background or test work that is never cancelled.
    #[must_use]
    pub fn background() -> Self {
        Self::new("background")
    }

    /// Sets the deadline to `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Replaces the cancellation token, typically with a child of a
    /// server-wide token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` once the deadline has passed; never for a context without one.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token observed by storage calls.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
