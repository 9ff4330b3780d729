//! `PostgreSQL` [`UserRepository`] over a shared `sqlx` pool.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use scaffold_core::{NewUser, RequestContext, User, UserId, UserUpdate};
use sqlx::{FromRow, PgPool};

use super::{bounded, RepoOp, RepositoryError};
use crate::traits::UserRepository;

const CREATE_SQL: &str = "\
    INSERT INTO users (email, created_at, updated_at) \
    VALUES ($1, now() AT TIME ZONE 'utc', now() AT TIME ZONE 'utc') \
    RETURNING id, email, created_at, updated_at";

const GET_BY_ID_SQL: &str = "SELECT id, email, created_at, updated_at FROM users WHERE id = $1";

const GET_BY_EMAIL_SQL: &str =
    "SELECT id, email, created_at, updated_at FROM users WHERE email = $1";

// GREATEST keeps updated_at strictly ahead even when the clock has not
// ticked since the previous write.
const UPDATE_SQL: &str = "\
    UPDATE users \
    SET email = $2, \
        updated_at = GREATEST(now() AT TIME ZONE 'utc', updated_at + interval '1 microsecond') \
    WHERE id = $1 \
    RETURNING id, email, created_at, updated_at";

const DELETE_SQL: &str = "DELETE FROM users WHERE id = $1";

const LIST_SQL: &str = "\
    SELECT id, email, created_at, updated_at \
    FROM users \
    ORDER BY created_at DESC, id DESC \
    LIMIT $1 OFFSET $2";

/// Row shape of the `users` table (`TIMESTAMP` columns hold UTC wall time).
#[derive(Debug, FromRow)]
struct UserRow {
    id: i32,
    email: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        }
    }
}

/// Wraps a driver error with operation context, recognising the two
/// conditions callers classify: no rows and unique violations.
fn map_err(op: RepoOp, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound { op },
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::UniqueViolation {
            op,
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        source => RepositoryError::Database { op, source },
    }
}

/// Production user store. Cloning shares the underlying pool.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, ctx: &RequestContext, user: &NewUser) -> Result<User, RepositoryError> {
        let op = RepoOp::Create;
        bounded(ctx, op, async {
            sqlx::query_as::<_, UserRow>(CREATE_SQL)
                .bind(&user.email)
                .fetch_one(&self.pool)
                .await
                .map(User::from)
                .map_err(|e| map_err(op, e))
        })
        .await
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: UserId) -> Result<User, RepositoryError> {
        let op = RepoOp::GetById;
        bounded(ctx, op, async {
            sqlx::query_as::<_, UserRow>(GET_BY_ID_SQL)
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map(User::from)
                .map_err(|e| map_err(op, e))
        })
        .await
    }

    async fn get_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<User, RepositoryError> {
        let op = RepoOp::GetByEmail;
        bounded(ctx, op, async {
            sqlx::query_as::<_, UserRow>(GET_BY_EMAIL_SQL)
                .bind(email)
                .fetch_one(&self.pool)
                .await
                .map(User::from)
                .map_err(|e| map_err(op, e))
        })
        .await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        update: &UserUpdate,
    ) -> Result<User, RepositoryError> {
        let op = RepoOp::Update;
        bounded(ctx, op, async {
            sqlx::query_as::<_, UserRow>(UPDATE_SQL)
                .bind(update.id)
                .bind(&update.email)
                .fetch_one(&self.pool)
                .await
                .map(User::from)
                .map_err(|e| map_err(op, e))
        })
        .await
    }

    async fn delete(&self, ctx: &RequestContext, id: UserId) -> Result<(), RepositoryError> {
        let op = RepoOp::Delete;
        bounded(ctx, op, async {
            sqlx::query(DELETE_SQL)
                .bind(id)
                .execute(&self.pool)
                .await
                .map(|_| ())
                .map_err(|e| map_err(op, e))
        })
        .await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<User>, RepositoryError> {
        let op = RepoOp::List;
        bounded(ctx, op, async {
            sqlx::query_as::<_, UserRow>(LIST_SQL)
                .bind(i64::from(limit))
                .bind(i64::from(offset))
                .fetch_all(&self.pool)
                .await
                .map(|rows| rows.into_iter().map(User::from).collect())
                .map_err(|e| map_err(op, e))
        })
        .await
    }
}
