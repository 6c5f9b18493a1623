//! Admin view of the "users" collection: the directory behind the admin
//! dashboard. Listing and edits assume the service enforces the real
//! authorization; the local role checks only spare a doomed round trip.

use crate::backend::http::ApiClient;
use crate::errors::AuthError;
use crate::session::AuthState;
use crate::types::Role;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// One account as listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    pub organization_code: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl UserRecord {
    /// Stored roles are free-form strings; anything outside the closed set
    /// reads as `User`.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role.as_deref().map_or(Role::User, Role::from_stored)
    }
}

/// Headline counts for the directory view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleStats {
    pub total: usize,
    pub admins: usize,
    pub users: usize,
}

/// Tallies role counts over a directory listing.
#[must_use]
pub fn tally(records: &[UserRecord]) -> RoleStats {
    let admins = records
        .iter()
        .filter(|record| record.role() == Role::Admin)
        .count();
    RoleStats {
        total: records.len(),
        admins,
        users: records.len() - admins,
    }
}

/// Directory operations over the "users" collection.
pub struct DirectoryClient {
    api: Arc<ApiClient>,
}

impl DirectoryClient {
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Lists every account. Refused locally for non-Admin sessions, without
    /// contacting the service.
    pub async fn list_users(&self, actor: &AuthState) -> Result<Vec<UserRecord>, AuthError> {
        require_admin(actor)?;
        self.api.json(Method::GET, "/v1/users", None, true).await
    }

    /// Admin-initiated role edit, the one path by which a role changes after
    /// creation.
    pub async fn set_role(
        &self,
        actor: &AuthState,
        user_id: &str,
        role: Role,
    ) -> Result<(), AuthError> {
        require_admin(actor)?;
        self.api
            .empty(
                Method::PATCH,
                &format!("/v1/users/{user_id}"),
                Some(&json!({ "role": role.as_str() })),
                true,
            )
            .await
    }

    /// Deletes the account's directory record. The hosted identity itself is
    /// untouched; only the document goes.
    pub async fn remove_user(&self, actor: &AuthState, user_id: &str) -> Result<(), AuthError> {
        require_admin(actor)?;
        self.api
            .empty(
                Method::DELETE,
                &format!("/v1/users/{user_id}"),
                None,
                true,
            )
            .await
    }
}

fn require_admin(actor: &AuthState) -> Result<(), AuthError> {
    if actor.account.is_none() {
        return Err(AuthError::NotAuthenticated);
    }
    if actor.role != Some(Role::Admin) {
        return Err(AuthError::AuthFailed(
            "Only admins can manage the user directory.".to_string(),
        ));
    }
    Ok(())
}
