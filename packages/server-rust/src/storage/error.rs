//! Repository failures and their classification into the application taxonomy.

use std::fmt;

use scaffold_core::AppError;

/// Repository operation, recorded on every failure for context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoOp {
    Create,
    GetById,
    GetByEmail,
    Update,
    Delete,
    List,
}

impl RepoOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create user",
            Self::GetById => "get user by id",
            Self::GetByEmail => "get user by email",
            Self::Update => "update user",
            Self::Delete => "delete user",
            Self::List => "list users",
        }
    }
}

impl fmt::Display for RepoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure from a [`UserRepository`](crate::traits::UserRepository) call.
///
/// Every variant names the operation that failed. The repository returns
/// these unlogged; handlers classify them via `From<RepositoryError> for AppError`.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("failed to {op}: no matching row")]
    NotFound { op: RepoOp },

    #[error("failed to {op}: unique constraint violated ({constraint})")]
    UniqueViolation { op: RepoOp, constraint: String },

    #[error("failed to {op}: request cancelled")]
    Cancelled { op: RepoOp },

    #[error("failed to {op}: deadline exceeded")]
    DeadlineExceeded { op: RepoOp },

    #[cfg(feature = "postgres")]
    #[error("failed to {op}: {source}")]
    Database {
        op: RepoOp,
        #[source]
        source: sqlx::Error,
    },
}

impl RepositoryError {
    /// Operation that produced the failure.
    #[must_use]
    pub fn op(&self) -> RepoOp {
        match self {
            Self::NotFound { op }
            | Self::UniqueViolation { op, .. }
            | Self::Cancelled { op }
            | Self::DeadlineExceeded { op } => *op,
            #[cfg(feature = "postgres")]
            Self::Database { op, .. } => *op,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// Classifies a storage failure. Raw driver text only ever travels in the
/// error's `detail`, which production responses drop.
impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match &err {
            RepositoryError::NotFound { .. } => AppError::not_found("user"),
            RepositoryError::UniqueViolation { .. } => {
                AppError::conflict("a user with this email already exists")
                    .with_detail(err.to_string())
            }
            RepositoryError::Cancelled { .. } | RepositoryError::DeadlineExceeded { .. } => {
                AppError::internal("request could not be completed").with_detail(err.to_string())
            }
            #[cfg(feature = "postgres")]
            RepositoryError::Database { .. } => {
                AppError::internal("Internal server error").with_detail(err.to_string())
            }
        }
    }
}
