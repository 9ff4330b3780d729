//! Scaffold core: error taxonomy, `User` model, validation, and request context.

pub mod context;
pub mod error;
pub mod user;
pub mod validation;

pub use context::RequestContext;
pub use error::{AppError, ErrorBody, ErrorCode};
pub use user::{
    CreateUserRequest, NewUser, UpdateUserRequest, User, UserId, UserResponse, UserUpdate,
};
pub use validation::{Validate, ValidationErrors, Validator};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
