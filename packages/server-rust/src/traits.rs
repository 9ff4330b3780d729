use async_trait::async_trait;
use scaffold_core::{NewUser, RequestContext, User, UserId, UserUpdate};

use crate::storage::RepositoryError;

/// Persistence for the `User` entity; the only component that touches storage.
/// Implementations: `PostgreSQL` (production), memory (tests, local runs).
///
/// Every call is a single atomic statement: no retries, no multi-call
/// transactions. Calls observe `ctx` and abandon the underlying work when it
/// is cancelled or its deadline passes. Implementations never log.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a user. The id and both timestamps are assigned by the store,
    /// so `created_at == updated_at` on the returned row.
    async fn create(&self, ctx: &RequestContext, user: &NewUser) -> Result<User, RepositoryError>;

    /// Fetches a user by id; `NotFound` when no row matches.
    async fn get_by_id(&self, ctx: &RequestContext, id: UserId) -> Result<User, RepositoryError>;

    /// Fetches a user by exact email; `NotFound` when no row matches.
    async fn get_by_email(&self, ctx: &RequestContext, email: &str)
        -> Result<User, RepositoryError>;

    /// Replaces the email and refreshes `updated_at`; `NotFound` for unknown ids.
    async fn update(&self, ctx: &RequestContext, update: &UserUpdate)
        -> Result<User, RepositoryError>;

    /// Physically removes the row. Succeeds when nothing matched.
    async fn delete(&self, ctx: &RequestContext, id: UserId) -> Result<(), RepositoryError>;

    /// A page of users, newest first. An out-of-range page is empty, not an error.
    /// `limit` is not capped here; callers guard against oversized pages.
    async fn list(
        &self,
        ctx: &RequestContext,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<User>, RepositoryError>;
}
