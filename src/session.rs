//! Process-wide authentication state. One `Session` is constructed at app
//! start, subscribes to the backend's identity-change notifications for its
//! entire lifetime, and publishes every transition through a watch channel so
//! route guards and views re-evaluate on change. Only non-sensitive account
//! metadata is held in memory; passwords pass straight through to the
//! backend.

use crate::backend::{AuthOutcome, CredentialBackend, IdentityEvent, Subscription};
use crate::errors::AuthError;
use crate::orgcode::{self, Validation};
use crate::remember::RememberStore;
use crate::types::{Account, ProfileUpdate, Role};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error};

const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";

/// Snapshot of the session as observed by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub account: Option<Account>,
    pub role: Option<Role>,
    pub organization_code: Option<String>,
    pub is_authenticated: bool,
    pub loading: bool,
    /// Last operation's user-facing failure, dismissible independently of the
    /// main state.
    pub error: Option<String>,
    pub remember_me: bool,
}

/// The authentication/session state machine.
///
/// Constructed with its collaborators injected, started once, and shared as
/// `Arc<Session>`. All operations take `&self`; transitions are applied
/// atomically on the watch channel, and overlapping completions resolve
/// last-writer-wins (there is no cancellation of in-flight operations).
pub struct Session {
    backend: Arc<dyn CredentialBackend>,
    store: RememberStore,
    state: watch::Sender<AuthState>,
    /// Monotonic guard for observer handlers: a handler whose epoch is stale
    /// may no longer mutate state. Bumped on every (re)subscription.
    epoch: AtomicU64,
    subscription: Mutex<Option<Subscription>>,
    timeout: Duration,
    /// Handle to ourselves for observer closures; never upgraded while
    /// holding a lock.
    weak_self: Weak<Self>,
}

impl Session {
    /// Builds an unauthenticated session. Call [`Session::start`] to attach
    /// the identity observer; until then `loading` stays true.
    pub fn new(
        backend: Arc<dyn CredentialBackend>,
        store: RememberStore,
        timeout: Duration,
    ) -> Arc<Self> {
        let initial = AuthState {
            loading: true,
            remember_me: store.remember_me(),
            ..AuthState::default()
        };
        let (state, _) = watch::channel(initial);
        Arc::new_cyclic(|weak| Self {
            backend,
            store,
            state,
            epoch: AtomicU64::new(0),
            subscription: Mutex::new(None),
            timeout,
            weak_self: weak.clone(),
        })
    }

    /// Subscribes to backend identity changes. The observer fires once
    /// immediately, which settles `loading` and hydrates the session on
    /// process start or reload.
    pub fn start(&self) {
        self.install_observer();
    }

    /// Detaches the identity observer. Used when the owning UI context is
    /// torn down.
    pub fn shutdown(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.subscription
            .lock()
            .expect("subscription lock poisoned")
            .take();
    }

    /// Receiver for state snapshots; guards re-run [`crate::guards::decide`]
    /// whenever it reports a change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Email/password login. The remember-me preference is persisted
    /// immediately, independent of the outcome.
    pub async fn login(&self, email: &str, password: &str, remember_me: bool) -> bool {
        self.begin_operation();
        self.set_remember_me(remember_me);
        if remember_me {
            self.store.set_email(email);
        } else {
            self.store.clear_email();
        }

        match self
            .call(self.backend.sign_in_with_password(email, password))
            .await
        {
            Ok(outcome) => {
                debug!("Login successful, role: {}", outcome.role);
                self.apply_outcome(&outcome);
                true
            }
            Err(err) => {
                error!("Login failed: {err}");
                self.fail_operation(&err);
                false
            }
        }
    }

    /// Federated (Google) login. `selected_role` and `organization_code`
    /// only matter on the very first sign-in for the identity.
    pub async fn login_with_google(
        &self,
        selected_role: Role,
        organization_code: Option<&str>,
    ) -> bool {
        self.begin_operation();

        match self
            .call(
                self.backend
                    .sign_in_with_federated_provider(selected_role, organization_code),
            )
            .await
        {
            Ok(outcome) => {
                debug!("Google login successful, role: {}", outcome.role);
                self.apply_outcome(&outcome);
                if self.snapshot().remember_me {
                    self.store.set_email(&outcome.account.email);
                }
                true
            }
            Err(err) => {
                error!("Google login failed: {err}");
                self.fail_operation(&err);
                false
            }
        }
    }

    /// Registers a new account. Role input from forms goes through
    /// [`Role::from_stored`], so anything outside the closed set has already
    /// been coerced to `User` by the time it gets here.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: Role,
        organization_code: Option<&str>,
    ) -> bool {
        self.begin_operation();

        match self
            .call(
                self.backend
                    .register_with_password(email, password, role, organization_code),
            )
            .await
        {
            Ok(outcome) => {
                debug!("Registration successful, role: {}", outcome.role);
                self.apply_outcome(&outcome);
                true
            }
            Err(err) => {
                error!("Registration failed: {err}");
                self.fail_operation(&err);
                false
            }
        }
    }

    /// Signs out. The remembered-email hint survives only when remember-me
    /// is on.
    pub async fn logout(&self) -> bool {
        self.begin_operation();

        match self.call(self.backend.sign_out()).await {
            Ok(()) => {
                if !self.snapshot().remember_me {
                    self.store.clear_email();
                }
                self.state.send_modify(|state| {
                    state.account = None;
                    state.role = None;
                    state.organization_code = None;
                    state.is_authenticated = false;
                    state.loading = false;
                    state.error = None;
                });
                true
            }
            Err(err) => {
                error!("Logout failed: {err}");
                self.fail_operation(&err);
                false
            }
        }
    }

    /// Requests a password-reset email. Only `loading` and `error` move;
    /// authenticated state is untouched.
    pub async fn forgot_password(&self, email: &str) -> bool {
        self.begin_operation();

        match self.call(self.backend.send_password_reset(email)).await {
            Ok(()) => {
                self.state.send_modify(|state| state.loading = false);
                true
            }
            Err(err) => {
                self.fail_operation(&err);
                false
            }
        }
    }

    /// Updates profile fields on the backend. Cached account metadata in the
    /// session is deliberately not mutated; observers re-fetch what they
    /// display.
    pub async fn update_profile(&self, fields: &ProfileUpdate) -> bool {
        self.begin_operation();

        match self.call(self.backend.update_profile(fields)).await {
            Ok(()) => {
                self.state.send_modify(|state| state.loading = false);
                true
            }
            Err(err) => {
                self.fail_operation(&err);
                false
            }
        }
    }

    /// Rotates the Admin's issued organization code. Refused locally for
    /// non-Admin sessions, without contacting the backend.
    pub async fn generate_new_org_code(&self) -> Result<String, AuthError> {
        let snapshot = self.snapshot();
        let account = match snapshot.account {
            Some(account) if snapshot.role == Some(Role::Admin) => account,
            _ => {
                return Err(AuthError::AuthFailed(
                    "Only admins can generate organization codes.".to_string(),
                ))
            }
        };

        self.begin_operation();

        match self.call(self.backend.generate_org_code(&account.id)).await {
            Ok(code) => {
                self.state.send_modify(|state| {
                    state.organization_code = Some(code.clone());
                    state.loading = false;
                });
                Ok(code)
            }
            Err(err) => {
                self.fail_operation(&err);
                Err(err)
            }
        }
    }

    /// Re-fetches the organization code for the current account and
    /// overwrites the session copy. Returns `None` without touching state
    /// when unauthenticated or the fetch times out.
    pub async fn refresh_org_code(&self) -> Option<String> {
        let account = self.snapshot().account?;

        match tokio::time::timeout(
            self.timeout,
            self.backend.fetch_organization_code(&account.id),
        )
        .await
        {
            Ok(code) => {
                self.state
                    .send_modify(|state| state.organization_code = code.clone());
                debug!("Organization code refreshed: {code:?}");
                code
            }
            Err(_) => {
                error!("Timed out refreshing organization code");
                None
            }
        }
    }

    /// Checks a submitted organization code against stored records.
    pub async fn validate_organization_code(&self, code: &str) -> Validation {
        match tokio::time::timeout(self.timeout, orgcode::validate(self.backend.as_ref(), code))
            .await
        {
            Ok(validation) => validation,
            Err(_) => Validation::rejected(AuthError::Unknown(TIMEOUT_MESSAGE.to_string())),
        }
    }

    /// Dismisses the current error. A no-op when none is set.
    pub fn clear_error(&self) {
        if self.state.borrow().error.is_some() {
            self.state.send_modify(|state| state.error = None);
        }
    }

    /// Email hint for pre-filling the login form; empty unless remember-me
    /// was on when it was stored.
    #[must_use]
    pub fn get_remembered_email(&self) -> String {
        self.store.remembered_email().unwrap_or_default()
    }

    /// Persists the remember-me preference. A changed value re-subscribes
    /// the identity observer, since the handler captures the preference; the
    /// replacement subscription is live before the old handler loses its
    /// ability to mutate state, so no notification is dropped (one redundant
    /// initial delivery is accepted instead).
    pub fn set_remember_me(&self, remember: bool) {
        let changed = self.state.borrow().remember_me != remember;
        debug!("Setting remember me: {remember}");
        self.store.set_remember(remember);
        self.state.send_modify(|state| state.remember_me = remember);
        if changed {
            self.install_observer();
        }
    }

    fn install_observer(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let remember = self.state.borrow().remember_me;
        let weak = self.weak_self.clone();
        let replacement = self
            .backend
            .observe_identity_changes(Arc::new(move |event| {
                let Some(session) = weak.upgrade() else {
                    return;
                };
                // Stale handlers observe but may not mutate.
                if session.epoch.load(Ordering::SeqCst) != epoch {
                    return;
                }
                session.apply_identity_event(event, remember);
            }));

        let previous = self
            .subscription
            .lock()
            .expect("subscription lock poisoned")
            .replace(replacement);
        drop(previous);
    }

    /// Applies one backend identity notification. Idempotent for redundant
    /// notifications carrying the same identity.
    fn apply_identity_event(&self, event: &IdentityEvent, remember: bool) {
        match &event.account {
            Some(account) => {
                debug!(
                    "Auth observer detected user: {} with role: {:?}",
                    account.email, event.role
                );
                if remember {
                    self.store.set_email(&account.email);
                }
                let role = event.role;
                let organization_code = event.organization_code.clone();
                self.state.send_modify(|state| {
                    state.account = Some(account.clone());
                    state.role = role;
                    state.organization_code = organization_code;
                    state.is_authenticated = true;
                    state.loading = false;
                    state.error = None;
                });
            }
            None => {
                debug!("Auth observer detected no user");
                if !remember {
                    self.store.clear_email();
                }
                self.state.send_modify(|state| {
                    state.account = None;
                    state.role = None;
                    state.organization_code = None;
                    state.is_authenticated = false;
                    state.loading = false;
                    state.error = None;
                });
            }
        }
    }

    fn apply_outcome(&self, outcome: &AuthOutcome) {
        self.state.send_modify(|state| {
            state.account = Some(outcome.account.clone());
            state.role = Some(outcome.role);
            state.organization_code = outcome.organization_code.clone();
            state.is_authenticated = true;
            state.loading = false;
        });
    }

    fn begin_operation(&self) {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
    }

    fn fail_operation(&self, err: &AuthError) {
        let message = err.to_string();
        self.state.send_modify(|state| {
            state.loading = false;
            state.error = Some(message.clone());
        });
    }

    async fn call<T>(
        &self,
        operation: impl Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::Unknown(TIMEOUT_MESSAGE.to_string())),
        }
    }
}
