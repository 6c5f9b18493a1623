//! Account and role types shared across the crate. Roles stored by the backend
//! are free-form strings; decoding is lenient and fail-safe, never an error.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Closed set of console roles. Admins issue organization codes and oversee
/// member accounts; Users must belong to an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Decodes a stored role string. Anything outside the closed set is
    /// treated as corrupt and coerced to `User`, with a logged warning.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "Admin" => Self::Admin,
            "User" => Self::User,
            other => {
                warn!("Invalid role {other:?} in stored record, defaulting to User");
                Self::User
            }
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::User => "User",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered identity as resolved from the backend: the hosted identity
/// record joined with the `users` document fields the console cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque identifier assigned by the backend.
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    /// Present for Users always; for Admins this is the code they issued.
    pub organization_code: Option<String>,
    /// ISO-8601 creation timestamp, as stored by the backend.
    pub created_at: String,
}

/// Profile fields accepted by `update_profile`. Unset fields are left
/// untouched; an update with no recognized field present is a no-op.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.photo_url.is_none() && self.phone_number.is_none()
    }
}
