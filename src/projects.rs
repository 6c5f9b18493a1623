//! Typed clients for the console's "projects" and "endpoints" collections.
//! These ride the same session token as the credential adapter; role checks
//! here are UX-only short-circuits, the service enforces the real rules.

use crate::backend::http::ApiClient;
use crate::errors::AuthError;
use crate::session::AuthState;
use crate::types::Role;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

/// One API project as stored in the "projects" collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: String,
    /// Account the owning Admin assigned the project to, if any.
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

/// One endpoint definition under a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEndpoint {
    pub name: String,
    pub method: HttpMethod,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CRUD wrapper for projects and their endpoints.
pub struct ProjectsClient {
    api: Arc<ApiClient>,
}

impl ProjectsClient {
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Creates a project owned by the acting Admin. Refused locally for
    /// non-Admin sessions, without contacting the service.
    pub async fn create_project(
        &self,
        actor: &AuthState,
        project: &NewProject,
    ) -> Result<Project, AuthError> {
        let account = actor.account.as_ref().ok_or(AuthError::NotAuthenticated)?;
        if actor.role != Some(Role::Admin) {
            return Err(AuthError::AuthFailed(
                "Only admins can create projects.".to_string(),
            ));
        }

        self.api
            .json(
                Method::POST,
                "/v1/projects",
                Some(&json!({
                    "name": project.name,
                    "description": project.description,
                    "ownerId": account.id,
                    "assignedTo": project.assigned_to,
                })),
                true,
            )
            .await
    }

    /// Projects visible to the acting account: owned or assigned.
    pub async fn list_projects(&self, actor: &AuthState) -> Result<Vec<Project>, AuthError> {
        let account = actor.account.as_ref().ok_or(AuthError::NotAuthenticated)?;
        self.api
            .json(
                Method::GET,
                &format!("/v1/projects?for={}", account.id),
                None,
                true,
            )
            .await
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        update: &ProjectUpdate,
    ) -> Result<(), AuthError> {
        let body = serde_json::to_value(update)
            .map_err(|err| AuthError::Unknown(format!("Failed to encode request: {err}")))?;
        self.api
            .empty(
                Method::PATCH,
                &format!("/v1/projects/{project_id}"),
                Some(&body),
                true,
            )
            .await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<(), AuthError> {
        self.api
            .empty(
                Method::DELETE,
                &format!("/v1/projects/{project_id}"),
                None,
                true,
            )
            .await
    }

    pub async fn list_endpoints(&self, project_id: &str) -> Result<Vec<Endpoint>, AuthError> {
        self.api
            .json(
                Method::GET,
                &format!("/v1/projects/{project_id}/endpoints"),
                None,
                true,
            )
            .await
    }

    pub async fn create_endpoint(
        &self,
        project_id: &str,
        endpoint: &NewEndpoint,
    ) -> Result<Endpoint, AuthError> {
        let body = serde_json::to_value(endpoint)
            .map_err(|err| AuthError::Unknown(format!("Failed to encode request: {err}")))?;
        self.api
            .json(
                Method::POST,
                &format!("/v1/projects/{project_id}/endpoints"),
                Some(&body),
                true,
            )
            .await
    }

    pub async fn update_endpoint(
        &self,
        project_id: &str,
        endpoint_id: &str,
        update: &EndpointUpdate,
    ) -> Result<(), AuthError> {
        let body = serde_json::to_value(update)
            .map_err(|err| AuthError::Unknown(format!("Failed to encode request: {err}")))?;
        self.api
            .empty(
                Method::PATCH,
                &format!("/v1/projects/{project_id}/endpoints/{endpoint_id}"),
                Some(&body),
                true,
            )
            .await
    }

    pub async fn delete_endpoint(
        &self,
        project_id: &str,
        endpoint_id: &str,
    ) -> Result<(), AuthError> {
        self.api
            .empty(
                Method::DELETE,
                &format!("/v1/projects/{project_id}/endpoints/{endpoint_id}"),
                None,
                true,
            )
            .await
    }
}
