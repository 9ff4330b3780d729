//! In-memory [`UserRepository`] implementation.
//!
//! Mirrors the `PostgreSQL` contract (serial ids, unique emails, newest-first
//! listing, idempotent delete) so handler tests and local runs behave like
//! production without a database.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use scaffold_core::{NewUser, RequestContext, User, UserId, UserUpdate};

use super::{bounded, RepoOp, RepositoryError};
use crate::traits::UserRepository;

/// Name reported for email collisions, matching the `PostgreSQL` constraint.
const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, Default)]
struct Table {
    last_id: UserId,
    rows: BTreeMap<UserId, User>,
}

impl Table {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.rows
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// User table guarded by a single `RwLock`; each call holds the lock for one
/// statement's worth of work, like a single-row SQL statement.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    table: RwLock<Table>,
}

impl InMemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.read().rows.is_empty()
    }
}

/// Next `updated_at`: the wall clock, nudged forward so it strictly advances.
fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, ctx: &RequestContext, user: &NewUser) -> Result<User, RepositoryError> {
        bounded(ctx, RepoOp::Create, async {
            let mut table = self.table.write();
            if table.email_taken(&user.email, None) {
                return Err(RepositoryError::UniqueViolation {
                    op: RepoOp::Create,
                    constraint: EMAIL_CONSTRAINT.to_string(),
                });
            }
            table.last_id += 1;
            let now = Utc::now();
            let created = User {
                id: table.last_id,
                email: user.email.clone(),
                created_at: now,
                updated_at: now,
            };
            table.rows.insert(created.id, created.clone());
            Ok(created)
        })
        .await
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: UserId) -> Result<User, RepositoryError> {
        bounded(ctx, RepoOp::GetById, async {
            self.table
                .read()
                .rows
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::NotFound { op: RepoOp::GetById })
        })
        .await
    }

    async fn get_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<User, RepositoryError> {
        bounded(ctx, RepoOp::GetByEmail, async {
            self.table
                .read()
                .rows
                .values()
                .find(|u| u.email == email)
                .cloned()
                .ok_or(RepositoryError::NotFound {
                    op: RepoOp::GetByEmail,
                })
        })
        .await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        update: &UserUpdate,
    ) -> Result<User, RepositoryError> {
        bounded(ctx, RepoOp::Update, async {
            let mut table = self.table.write();
            if !table.rows.contains_key(&update.id) {
                return Err(RepositoryError::NotFound { op: RepoOp::Update });
            }
            if table.email_taken(&update.email, Some(update.id)) {
                return Err(RepositoryError::UniqueViolation {
                    op: RepoOp::Update,
                    constraint: EMAIL_CONSTRAINT.to_string(),
                });
            }
            let row = table
                .rows
                .get_mut(&update.id)
                .ok_or(RepositoryError::NotFound { op: RepoOp::Update })?;
            row.email.clone_from(&update.email);
            row.updated_at = advance(row.updated_at);
            Ok(row.clone())
        })
        .await
    }

    async fn delete(&self, ctx: &RequestContext, id: UserId) -> Result<(), RepositoryError> {
        bounded(ctx, RepoOp::Delete, async {
            self.table.write().rows.remove(&id);
            Ok(())
        })
        .await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<User>, RepositoryError> {
        bounded(ctx, RepoOp::List, async {
            let table = self.table.read();
            let mut users: Vec<&User> = table.rows.values().collect();
            // Newest first; ids break ties between rows created in the same tick.
            users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(users
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect())
        })
        .await
    }
}
