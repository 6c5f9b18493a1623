//! HTTP implementation of [`CredentialBackend`] against the hosted
//! authentication + document-store service. Thin request/response wrappers:
//! the only state kept between calls is the service session mirror (bearer
//! token, current account id, and the identity notifier), which stands in for
//! the hosted SDK's own "current user".

use crate::backend::{
    AuthOutcome, CredentialBackend, IdentityCallback, IdentityEvent, IdentityNotifier,
    Subscription,
};
use crate::config::ConsoleConfig;
use crate::errors::AuthError;
use crate::orgcode;
use crate::types::{Account, ProfileUpdate, Role};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";
/// Maximum number of error body characters surfaced to the UI.
const MAX_ERROR_CHARS: usize = 200;

/// Shared JSON client for the hosted service: one reqwest client, one base
/// URL, the `X-Api-Key` header on every request, and the session bearer token
/// when one is held.
pub struct ApiClient {
    base_url: String,
    api_key: SecretString,
    client: Client,
    token: Mutex<Option<SecretString>>,
}

impl ApiClient {
    pub fn new(config: &ConsoleConfig) -> Result<Arc<Self>> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Arc::new(Self {
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
            client,
            token: Mutex::new(None),
        }))
    }

    fn endpoint_url(&self, path: &str) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        format!("{}/{}", base, path.trim().trim_start_matches('/'))
    }

    pub(crate) fn set_token(&self, token: Option<SecretString>) {
        *self.token.lock().expect("token lock poisoned") = token;
    }

    fn bearer(&self) -> Option<SecretString> {
        self.token.lock().expect("token lock poisoned").clone()
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        authed: bool,
    ) -> Result<reqwest::Response, AuthError> {
        let url = self.endpoint_url(path);
        let mut request = self
            .client
            .request(method, &url)
            .header("X-Api-Key", self.api_key.expose_secret())
            .header("X-Request-Id", Uuid::new_v4().to_string());

        if authed {
            let token = self.bearer().ok_or(AuthError::NotAuthenticated)?;
            request = request.bearer_auth(token.expose_secret());
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("endpoint URL: {path}");
        request.send().await.map_err(map_transport_error)
    }

    /// Sends and decodes a JSON response; non-success statuses become mapped
    /// errors.
    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        authed: bool,
    ) -> Result<T, AuthError> {
        let response = self.dispatch(method, path, body, authed).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|err| AuthError::Unknown(format!("Failed to decode response: {err}")))
    }

    /// Like [`ApiClient::json`], except `404` and `204` resolve to `None`.
    pub(crate) async fn json_optional<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        authed: bool,
    ) -> Result<Option<T>, AuthError> {
        let response = self.dispatch(method, path, body, authed).await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|err| AuthError::Unknown(format!("Failed to decode response: {err}"))),
            _ => Err(error_from_response(response).await),
        }
    }

    /// Sends and discards the response body.
    pub(crate) async fn empty(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        authed: bool,
    ) -> Result<(), AuthError> {
        let response = self.dispatch(method, path, body, authed).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

fn map_transport_error(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Unknown(TIMEOUT_MESSAGE.to_string())
    } else {
        AuthError::Unknown(format!("Unable to reach the server: {err}"))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

async fn error_from_response(response: reqwest::Response) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error_from_parts(status, &body)
}

fn error_from_parts(status: StatusCode, body: &str) -> AuthError {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(code) = parsed.code {
            let message = parsed.message.as_deref().unwrap_or(code.as_str());
            return AuthError::from_backend_code(&code, message);
        }
        if let Some(message) = parsed.message {
            return AuthError::AuthFailed(sanitize_body(&message));
        }
    }
    AuthError::Unknown(format!("Request failed ({status}): {}", sanitize_body(body)))
}

/// Trims and truncates error bodies before they reach the UI.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    account_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    organization_code: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    documents: Vec<Value>,
}

/// [`CredentialBackend`] over the hosted service's REST surface.
pub struct HttpCredentialBackend {
    api: Arc<ApiClient>,
    notifier: IdentityNotifier,
    current_account_id: Mutex<Option<String>>,
}

impl HttpCredentialBackend {
    pub fn new(config: &ConsoleConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(config)?,
            notifier: IdentityNotifier::new(),
            current_account_id: Mutex::new(None),
        })
    }

    /// The underlying JSON client, shared with the document clients so they
    /// ride the same session token.
    #[must_use]
    pub fn api(&self) -> Arc<ApiClient> {
        Arc::clone(&self.api)
    }

    fn remember_identity(&self, outcome: &AuthOutcome, token: SecretString) {
        self.api.set_token(Some(token));
        *self
            .current_account_id
            .lock()
            .expect("account id lock poisoned") = Some(outcome.account.id.clone());
        self.notifier.notify(IdentityEvent::signed_in(outcome));
    }

    fn forget_identity(&self) {
        self.api.set_token(None);
        *self
            .current_account_id
            .lock()
            .expect("account id lock poisoned") = None;
        self.notifier.notify(IdentityEvent::signed_out());
    }

    /// Compensating deletion for a just-provisioned identity whose
    /// registration could not be completed. A failed rollback is logged and
    /// otherwise swallowed; the caller still reports the original error.
    async fn rollback_identity(&self) {
        if let Err(err) = self
            .api
            .empty(Method::POST, "/v1/auth/account:delete", None, true)
            .await
        {
            error!("Failed to roll back provisioned identity: {err}");
        }
        self.api.set_token(None);
    }

    fn user_path(account_id: &str) -> String {
        format!("/v1/users/{account_id}")
    }
}

#[async_trait]
impl CredentialBackend for HttpCredentialBackend {
    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthOutcome, AuthError> {
        let response: SignInResponse = self
            .api
            .json(
                Method::POST,
                "/v1/auth/login",
                Some(&json!({ "email": email, "password": password })),
                false,
            )
            .await?;
        // Document reads below need the fresh bearer token.
        self.api.set_token(Some(response.id_token.clone().into()));

        let role = self.fetch_role(&response.account_id).await;
        let organization_code = self.fetch_organization_code(&response.account_id).await;
        debug!("Authenticated user with role: {role}");

        let outcome = AuthOutcome {
            account: Account {
                id: response.account_id,
                email: response.email,
                display_name: response.display_name,
                role,
                organization_code: organization_code.clone(),
                created_at: response.created_at.unwrap_or_default(),
            },
            role,
            organization_code,
        };
        self.remember_identity(&outcome, response.id_token.into());
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn sign_in_with_federated_provider(
        &self,
        selected_role: Role,
        organization_code: Option<&str>,
    ) -> Result<AuthOutcome, AuthError> {
        // Checked before any backend traffic.
        if selected_role == Role::User
            && organization_code.map_or(true, |code| code.trim().is_empty())
        {
            return Err(AuthError::OrganizationCodeRequired);
        }
        // Admins never present a code; they are issued one.
        let code_input = match selected_role {
            Role::Admin => None,
            Role::User => organization_code,
        };

        let response: SignInResponse = self
            .api
            .json(
                Method::POST,
                "/v1/auth/federated",
                Some(&json!({ "provider": "google.com" })),
                false,
            )
            .await?;
        self.api.set_token(Some(response.id_token.clone().into()));

        let existing: Option<UserDocument> = self
            .api
            .json_optional(
                Method::GET,
                &Self::user_path(&response.account_id),
                None,
                true,
            )
            .await?;

        let (role, organization_code, created_at) = match existing {
            // Subsequent sign-in: stored role and code are authoritative.
            Some(document) => (
                document
                    .role
                    .as_deref()
                    .map_or(Role::User, Role::from_stored),
                document.organization_code,
                document.created_at.unwrap_or_default(),
            ),
            None => {
                let assigned_code = match selected_role {
                    Role::User => {
                        let code = code_input.unwrap_or_default();
                        match self.any_account_has_org_code(code).await {
                            Ok(true) => Some(code.to_string()),
                            _ => {
                                self.api.set_token(None);
                                return Err(AuthError::InvalidOrganizationCode);
                            }
                        }
                    }
                    Role::Admin => Some(orgcode::generate()),
                };
                let created_at = Utc::now().to_rfc3339();
                self.api
                    .empty(
                        Method::PUT,
                        &Self::user_path(&response.account_id),
                        Some(&json!({
                            "email": response.email,
                            "displayName": response.display_name.clone().unwrap_or_default(),
                            "role": selected_role.as_str(),
                            "organizationCode": assigned_code,
                            "createdAt": created_at,
                        })),
                        true,
                    )
                    .await?;
                (selected_role, assigned_code, created_at)
            }
        };
        debug!("Google sign-in user with role: {role}");

        let outcome = AuthOutcome {
            account: Account {
                id: response.account_id,
                email: response.email,
                display_name: response.display_name,
                role,
                organization_code: organization_code.clone(),
                created_at,
            },
            role,
            organization_code,
        };
        self.remember_identity(&outcome, response.id_token.into());
        Ok(outcome)
    }

    #[instrument(skip(self, password))]
    async fn register_with_password(
        &self,
        email: &str,
        password: &str,
        role: Role,
        organization_code: Option<&str>,
    ) -> Result<AuthOutcome, AuthError> {
        if role == Role::User && organization_code.map_or(true, |code| code.trim().is_empty()) {
            return Err(AuthError::OrganizationCodeRequired);
        }

        let response: SignInResponse = self
            .api
            .json(
                Method::POST,
                "/v1/auth/signup",
                Some(&json!({ "email": email, "password": password })),
                false,
            )
            .await?;
        self.api.set_token(Some(response.id_token.clone().into()));

        let assigned_code = match role {
            Role::User => {
                let code = organization_code.unwrap_or_default();
                match self.any_account_has_org_code(code).await {
                    Ok(true) => Some(code.to_string()),
                    // The identity already exists; undo it so a retry with a
                    // valid code creates exactly one account.
                    _ => {
                        self.rollback_identity().await;
                        return Err(AuthError::InvalidOrganizationCode);
                    }
                }
            }
            Role::Admin => Some(orgcode::generate()),
        };

        let created_at = Utc::now().to_rfc3339();
        self.api
            .empty(
                Method::PUT,
                &Self::user_path(&response.account_id),
                Some(&json!({
                    "email": email,
                    "role": role.as_str(),
                    "organizationCode": assigned_code,
                    "createdAt": created_at,
                })),
                true,
            )
            .await?;
        debug!("Registered user with role: {role}");

        let outcome = AuthOutcome {
            account: Account {
                id: response.account_id,
                email: response.email,
                display_name: response.display_name,
                role,
                organization_code: assigned_code.clone(),
                created_at,
            },
            role,
            organization_code: assigned_code,
        };
        self.remember_identity(&outcome, response.id_token.into());
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.api
            .empty(
                Method::POST,
                "/v1/auth/reset",
                Some(&json!({ "email": email })),
                false,
            )
            .await
            .map_err(|err| match err {
                AuthError::UserNotFound | AuthError::InvalidEmailFormat => err,
                _ => AuthError::ResetFailed,
            })
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), AuthError> {
        self.api
            .empty(Method::POST, "/v1/auth/logout", None, true)
            .await
            .map_err(|err| {
                error!("Logout failed: {err}");
                AuthError::AuthFailed("Failed to log out. Please try again.".to_string())
            })?;
        self.forget_identity();
        Ok(())
    }

    async fn fetch_role(&self, account_id: &str) -> Role {
        match self
            .api
            .json_optional::<UserDocument>(Method::GET, &Self::user_path(account_id), None, true)
            .await
        {
            Ok(Some(document)) => match document.role.as_deref() {
                Some(stored) => Role::from_stored(stored),
                None => {
                    warn!("No role stored for account {account_id}, defaulting to User");
                    Role::User
                }
            },
            Ok(None) => {
                warn!("No user record for account {account_id}, defaulting to User");
                Role::User
            }
            Err(err) => {
                warn!("Failed to fetch role for account {account_id}: {err}");
                Role::User
            }
        }
    }

    async fn fetch_organization_code(&self, account_id: &str) -> Option<String> {
        match self
            .api
            .json_optional::<UserDocument>(Method::GET, &Self::user_path(account_id), None, true)
            .await
        {
            Ok(document) => document.and_then(|doc| doc.organization_code),
            Err(err) => {
                warn!("Failed to fetch organization code for account {account_id}: {err}");
                None
            }
        }
    }

    #[instrument(skip(self, fields))]
    async fn update_profile(&self, fields: &ProfileUpdate) -> Result<(), AuthError> {
        if fields.is_empty() {
            return Ok(());
        }
        let account_id = self
            .current_account_id
            .lock()
            .expect("account id lock poisoned")
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;

        // Display name and photo also live on the hosted identity record.
        // Only the fields the caller set go on the wire; an absent field
        // means "leave unchanged", not "clear".
        if fields.display_name.is_some() || fields.photo_url.is_some() {
            let mut identity = serde_json::Map::new();
            if let Some(name) = &fields.display_name {
                identity.insert("displayName".to_string(), json!(name));
            }
            if let Some(url) = &fields.photo_url {
                identity.insert("photoURL".to_string(), json!(url));
            }
            self.api
                .empty(
                    Method::POST,
                    "/v1/auth/account:update",
                    Some(&Value::Object(identity)),
                    true,
                )
                .await?;
        }

        let document = serde_json::to_value(fields)
            .map_err(|err| AuthError::Unknown(format!("Failed to encode request: {err}")))?;
        self.api
            .empty(
                Method::PATCH,
                &Self::user_path(&account_id),
                Some(&document),
                true,
            )
            .await
    }

    #[instrument(skip(self))]
    async fn generate_org_code(&self, account_id: &str) -> Result<String, AuthError> {
        let role = self.fetch_role(account_id).await;
        if role != Role::Admin {
            return Err(AuthError::AuthFailed(
                "Only admins can generate organization codes.".to_string(),
            ));
        }

        let code = orgcode::generate();
        self.api
            .empty(
                Method::PATCH,
                &Self::user_path(account_id),
                Some(&json!({ "organizationCode": code })),
                true,
            )
            .await?;
        debug!("Generated new organization code {code} for account {account_id}");
        Ok(code)
    }

    async fn any_account_has_org_code(&self, code: &str) -> Result<bool, AuthError> {
        let response: QueryResponse = self
            .api
            .json(
                Method::POST,
                "/v1/users:query",
                Some(&json!({ "field": "organizationCode", "equals": code })),
                false,
            )
            .await?;
        Ok(!response.documents.is_empty())
    }

    fn observe_identity_changes(&self, callback: IdentityCallback) -> Subscription {
        self.notifier.subscribe(callback)
    }
}
