//! User persistence for the scaffold server.
//!
//! - [`UserRepository`](crate::traits::UserRepository) is the storage seam.
//! - [`PgUserRepository`] is the production implementation over a `sqlx` pool.
//! - [`InMemoryUserRepository`] honours the same contract without a database.
//! - [`RepositoryError`] carries operation context and is classified into
//!   [`AppError`](scaffold_core::AppError) by handlers.

pub mod config;
pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod pool;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::future::Future;

use scaffold_core::RequestContext;
use tokio::time::Instant;

pub use config::{DatabaseConfig, StorageBackend};
pub use error::{RepoOp, RepositoryError};
pub use memory::InMemoryUserRepository;
#[cfg(feature = "postgres")]
pub use pool::{connect, run_migrations, DatabaseError};
#[cfg(feature = "postgres")]
pub use postgres::PgUserRepository;

/// Runs one storage call under `ctx`: the call is dropped (and its pool slot
/// released) as soon as the context is cancelled or its deadline passes.
pub(crate) async fn bounded<T, F>(
    ctx: &RequestContext,
    op: RepoOp,
    call: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    if ctx.is_cancelled() {
        return Err(RepositoryError::Cancelled { op });
    }
    if ctx.is_expired() {
        return Err(RepositoryError::DeadlineExceeded { op });
    }

    let deadline = ctx.deadline().map(Instant::from_std);

    tokio::select! {
        biased;
        () = ctx.cancellation().cancelled() => Err(RepositoryError::Cancelled { op }),
        () = sleep_until(deadline) => Err(RepositoryError::DeadlineExceeded { op }),
        result = call => result,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn passes_result_through() {
        let ctx = RequestContext::background();
        let out = bounded(&ctx, RepoOp::List, async { Ok::<_, RepositoryError>(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let ctx = RequestContext::background();
        ctx.cancel();
        let err = bounded(&ctx, RepoOp::Create, async { Ok::<_, RepositoryError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Cancelled { op: RepoOp::Create }));
    }

    #[tokio::test]
    async fn expired_context_never_starts_the_call() {
        let ctx = RequestContext::background().with_timeout(Duration::ZERO);
        let started = std::sync::atomic::AtomicBool::new(false);
        let err = bounded(&ctx, RepoOp::Update, async {
            started.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok::<_, RepositoryError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RepositoryError::DeadlineExceeded { op: RepoOp::Update }));
        assert!(!started.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn slow_call_abandoned_at_deadline() {
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(20));
        let err = bounded(&ctx, RepoOp::GetById, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, RepositoryError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RepositoryError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn cancellation_mid_call_abandons_it() {
        let ctx = RequestContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let err = bounded(&ctx, RepoOp::List, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, RepositoryError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RepositoryError::Cancelled { op: RepoOp::List }));
    }
}
