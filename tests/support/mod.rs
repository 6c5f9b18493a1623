//! In-memory stand-in for the hosted authentication + document-store
//! service, with per-operation delays so tests can stage out-of-order
//! completions.

// Shared across test binaries; each binary uses a subset.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tds_console::backend::{
    AuthOutcome, CredentialBackend, IdentityCallback, IdentityEvent, IdentityNotifier,
    Subscription,
};
use tds_console::errors::AuthError;
use tds_console::orgcode;
use tds_console::remember::RememberStore;
use tds_console::session::Session;
use tds_console::types::{Account, ProfileUpdate, Role};

const CREATED_AT: &str = "2024-05-01T12:00:00Z";

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub email: String,
    pub display_name: Option<String>,
    /// Raw string on purpose: corrupt values must coerce on read, not fail.
    pub role: String,
    pub organization_code: Option<String>,
    pub created_at: String,
}

/// Identity the federated provider would hand back, configured per test.
#[derive(Debug, Clone)]
pub struct FederatedIdentity {
    pub account_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Default)]
struct MockState {
    users: HashMap<String, StoredUser>,
    credentials: HashMap<String, (String, String)>, // email -> (password, account id)
    current_account: Option<String>,
    federated: Option<FederatedIdentity>,
    sign_in_delay: Option<Duration>,
    sign_out_delay: Option<Duration>,
}

pub struct MockBackend {
    state: Mutex<MockState>,
    notifier: IdentityNotifier,
    next_id: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState::default()),
            notifier: IdentityNotifier::new(),
            next_id: AtomicUsize::new(1),
        })
    }

    pub fn seed_credentials(&self, email: &str, password: &str) -> String {
        let account_id = self.mint_id();
        let mut state = self.state.lock().unwrap();
        state
            .credentials
            .insert(email.to_string(), (password.to_string(), account_id.clone()));
        account_id
    }

    pub fn seed_user(&self, account_id: &str, user: StoredUser) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(account_id.to_string(), user);
    }

    pub fn seed_admin(&self, email: &str, password: &str, code: &str) -> String {
        let account_id = self.seed_credentials(email, password);
        self.seed_user(
            &account_id,
            StoredUser {
                email: email.to_string(),
                display_name: None,
                role: "Admin".to_string(),
                organization_code: Some(code.to_string()),
                created_at: CREATED_AT.to_string(),
            },
        );
        account_id
    }

    pub fn set_federated_identity(&self, identity: FederatedIdentity) {
        self.state.lock().unwrap().federated = Some(identity);
    }

    pub fn set_sign_in_delay(&self, delay: Duration) {
        self.state.lock().unwrap().sign_in_delay = Some(delay);
    }

    pub fn set_sign_out_delay(&self, delay: Duration) {
        self.state.lock().unwrap().sign_out_delay = Some(delay);
    }

    pub fn user(&self, account_id: &str) -> Option<StoredUser> {
        self.state.lock().unwrap().users.get(account_id).cloned()
    }

    pub fn identity_count(&self) -> usize {
        self.state.lock().unwrap().credentials.len()
    }

    /// Pushes an identity notification as if the hosted session changed
    /// behind the console's back (e.g. restored on page load).
    pub fn push_identity(&self, event: IdentityEvent) {
        self.notifier.notify(event);
    }

    fn mint_id(&self) -> String {
        format!("acct-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn resolve_outcome(&self, account_id: &str) -> AuthOutcome {
        let state = self.state.lock().unwrap();
        let user = state.users.get(account_id);
        let role = user.map_or(Role::User, |u| Role::from_stored(&u.role));
        let organization_code = user.and_then(|u| u.organization_code.clone());
        let account = Account {
            id: account_id.to_string(),
            email: user.map(|u| u.email.clone()).unwrap_or_default(),
            display_name: user.and_then(|u| u.display_name.clone()),
            role,
            organization_code: organization_code.clone(),
            created_at: user.map(|u| u.created_at.clone()).unwrap_or_default(),
        };
        AuthOutcome {
            account,
            role,
            organization_code,
        }
    }

    fn complete_sign_in(&self, account_id: &str) -> AuthOutcome {
        let outcome = self.resolve_outcome(account_id);
        self.state.lock().unwrap().current_account = Some(account_id.to_string());
        self.notifier.notify(IdentityEvent::signed_in(&outcome));
        outcome
    }
}

#[async_trait]
impl CredentialBackend for MockBackend {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthOutcome, AuthError> {
        let (delay, credentials) = {
            let state = self.state.lock().unwrap();
            (state.sign_in_delay, state.credentials.get(email).cloned())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (stored_password, account_id) = credentials.ok_or(AuthError::UserNotFound)?;
        if stored_password != password {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(self.complete_sign_in(&account_id))
    }

    async fn sign_in_with_federated_provider(
        &self,
        selected_role: Role,
        organization_code: Option<&str>,
    ) -> Result<AuthOutcome, AuthError> {
        if selected_role == Role::User
            && organization_code.map_or(true, |code| code.trim().is_empty())
        {
            return Err(AuthError::OrganizationCodeRequired);
        }

        let identity = self
            .state
            .lock()
            .unwrap()
            .federated
            .clone()
            .ok_or_else(|| AuthError::AuthFailed("Sign-in popup was closed.".to_string()))?;

        let known = self
            .state
            .lock()
            .unwrap()
            .users
            .contains_key(&identity.account_id);
        if !known {
            let assigned_code = match selected_role {
                Role::User => {
                    let code = organization_code.unwrap_or_default();
                    if !self.any_account_has_org_code(code).await? {
                        return Err(AuthError::InvalidOrganizationCode);
                    }
                    Some(code.to_string())
                }
                Role::Admin => Some(orgcode::generate()),
            };
            self.seed_user(
                &identity.account_id,
                StoredUser {
                    email: identity.email.clone(),
                    display_name: identity.display_name.clone(),
                    role: selected_role.as_str().to_string(),
                    organization_code: assigned_code,
                    created_at: CREATED_AT.to_string(),
                },
            );
        }
        Ok(self.complete_sign_in(&identity.account_id))
    }

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

        // The identity is provisioned before the code is validated, exactly
        // like the hosted flow; an invalid code must trigger the rollback.
        let account_id = self.mint_id();
        self.state.lock().unwrap().credentials.insert(
            email.to_string(),
            (password.to_string(), account_id.clone()),
        );

        let assigned_code = match role {
            Role::User => {
                let code = organization_code.unwrap_or_default();
                if !self.any_account_has_org_code(code).await? {
                    self.state.lock().unwrap().credentials.remove(email);
                    return Err(AuthError::InvalidOrganizationCode);
                }
                Some(code.to_string())
            }
            Role::Admin => Some(orgcode::generate()),
        };

        self.seed_user(
            &account_id,
            StoredUser {
                email: email.to_string(),
                display_name: None,
                role: role.as_str().to_string(),
                organization_code: assigned_code,
                created_at: CREATED_AT.to_string(),
            },
        );
        Ok(self.complete_sign_in(&account_id))
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let known = self.state.lock().unwrap().credentials.contains_key(email);
        if known {
            Ok(())
        } else {
            Err(AuthError::UserNotFound)
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let delay = self.state.lock().unwrap().sign_out_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.lock().unwrap().current_account = None;
        self.notifier.notify(IdentityEvent::signed_out());
        Ok(())
    }

    async fn fetch_role(&self, account_id: &str) -> Role {
        self.state
            .lock()
            .unwrap()
            .users
            .get(account_id)
            .map_or(Role::User, |user| Role::from_stored(&user.role))
    }

    async fn fetch_organization_code(&self, account_id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(account_id)
            .and_then(|user| user.organization_code.clone())
    }

    async fn update_profile(&self, fields: &ProfileUpdate) -> Result<(), AuthError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        let account_id = state
            .current_account
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;
        if let Some(user) = state.users.get_mut(&account_id) {
            if let Some(name) = &fields.display_name {
                user.display_name = Some(name.clone());
            }
        }
        Ok(())
    }

    async fn generate_org_code(&self, account_id: &str) -> Result<String, AuthError> {
        let role = self.fetch_role(account_id).await;
        if role != Role::Admin {
            return Err(AuthError::AuthFailed(
                "Only admins can generate organization codes.".to_string(),
            ));
        }
        let code = orgcode::generate();
        if let Some(user) = self.state.lock().unwrap().users.get_mut(account_id) {
            user.organization_code = Some(code.clone());
        }
        Ok(code)
    }

    async fn any_account_has_org_code(&self, code: &str) -> Result<bool, AuthError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .values()
            .any(|user| user.organization_code.as_deref() == Some(code)))
    }

    fn observe_identity_changes(&self, callback: IdentityCallback) -> Subscription {
        self.notifier.subscribe(callback)
    }
}

/// Builds a started session over `backend`, persisting hints under `dir`.
pub fn started_session(backend: Arc<MockBackend>, dir: &std::path::Path) -> Arc<Session> {
    let store = RememberStore::open(dir).unwrap();
    let session = Session::new(backend, store, Duration::from_secs(5));
    session.start();
    session
}
