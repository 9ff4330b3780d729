//! The `User` entity and the payloads that create and change it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::validation::{not_blank, Validate, Validator};

/// Longest email accepted (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

/// Server-assigned user identifier (`SERIAL` column).
pub type UserId = i32;

/// A persisted user.
///
/// `id` and `created_at` never change after creation; `updated_at` is
/// refreshed on every update and is never earlier than `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input to `create`: the store assigns the id and both timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
}

/// Input to `update`: the existing id and the replacement email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub id: UserId,
    pub email: String,
}

/// Body of `POST /api/v1/users`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[serde(default)]
    #[garde(custom(not_blank), length(max = 254), email)]
    pub email: String,
}

impl CreateUserRequest {
    /// Validates the payload and converts it into a [`NewUser`].
    ///
    /// # Errors
    ///
    /// Returns a `VALIDATION_ERROR` when the email is missing or malformed.
    pub fn into_new_user(mut self, validator: &Validator) -> Result<NewUser, AppError> {
        self.email = self.email.trim().to_string();
        validator
            .validate(&self)
            .map_err(|e| AppError::validation(e.to_string()))?;
        Ok(NewUser { email: self.email })
    }
}

/// Body of `PUT /api/v1/users/{id}`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[serde(default)]
    #[garde(custom(not_blank), length(max = 254), email)]
    pub email: String,
}

impl UpdateUserRequest {
    /// Validates the payload and binds it to `id`.
    ///
    /// # Errors
    ///
    /// Returns a `VALIDATION_ERROR` when the email is missing or malformed.
    pub fn into_update(mut self, id: UserId, validator: &Validator) -> Result<UserUpdate, AppError> {
        self.email = self.email.trim().to_string();
        validator
            .validate(&self)
            .map_err(|e| AppError::validation(e.to_string()))?;
        Ok(UserUpdate {
            id,
            email: self.email,
        })
    }
}

/// Wire representation of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
