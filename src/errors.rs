//! Error taxonomy shared by the backend adapter and the session state machine.
//! Display strings are user-facing: the console surfaces them verbatim next to
//! the form that triggered the failure, so keep them free of internal detail.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials. Please check your email and password.")]
    InvalidCredentials,
    #[error("No user found with this email address.")]
    UserNotFound,
    #[error("Too many unsuccessful login attempts. Please try again later.")]
    RateLimited,
    #[error("Invalid email format.")]
    InvalidEmailFormat,
    #[error("Authentication configuration issue. Please contact support.")]
    ServiceConfig,
    #[error("Organization code is required for regular users")]
    OrganizationCodeRequired,
    #[error("Invalid organization code. Please check and try again.")]
    InvalidOrganizationCode,
    #[error("No authenticated user found")]
    NotAuthenticated,
    #[error("Failed to send password reset email.")]
    ResetFailed,
    #[error("{0}")]
    AuthFailed(String),
    #[error("{0}")]
    Unknown(String),
}

impl AuthError {
    /// Maps a backend-reported error code onto the closed taxonomy. Codes the
    /// service does not document fall through to `AuthFailed` carrying the
    /// backend message.
    pub fn from_backend_code(code: &str, message: &str) -> Self {
        match code {
            "USER_NOT_FOUND" | "EMAIL_NOT_FOUND" => Self::UserNotFound,
            "INVALID_CREDENTIALS" | "INVALID_PASSWORD" => Self::InvalidCredentials,
            "TOO_MANY_ATTEMPTS" => Self::RateLimited,
            "INVALID_EMAIL" => Self::InvalidEmailFormat,
            "API_KEY_INVALID" => Self::ServiceConfig,
            _ => Self::AuthFailed(message.to_string()),
        }
    }
}
