//! Backend adapter boundary. The console never talks to the hosted
//! authentication + document-store service directly; everything goes through
//! the [`CredentialBackend`] trait so the session core stays testable against
//! an in-memory double. The HTTP implementation lives in [`http`].

pub mod http;

use crate::errors::AuthError;
use crate::types::{Account, ProfileUpdate, Role};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// Successful sign-in/registration result: the resolved account with its role
/// and organization code already joined in from the `users` collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub account: Account,
    pub role: Role,
    pub organization_code: Option<String>,
}

/// One identity-change notification. `account` is `None` when the backend no
/// longer has a current identity (signed out, deleted, or never signed in).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityEvent {
    pub account: Option<Account>,
    pub role: Option<Role>,
    pub organization_code: Option<String>,
}

impl IdentityEvent {
    #[must_use]
    pub fn signed_in(outcome: &AuthOutcome) -> Self {
        Self {
            account: Some(outcome.account.clone()),
            role: Some(outcome.role),
            organization_code: outcome.organization_code.clone(),
        }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }
}

pub type IdentityCallback = Arc<dyn Fn(&IdentityEvent) + Send + Sync>;

/// Adapter over the hosted authentication + document-store service.
///
/// Implementations never panic and never let a transport error escape as
/// anything but an [`AuthError`]; `fetch_role` and `fetch_organization_code`
/// additionally never fail outward at all (fail-safe defaults).
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthOutcome, AuthError>;

    /// Federated (Google) sign-in. On the first sign-in for an identity the
    /// account is provisioned with `selected_role`; afterwards the stored
    /// role and organization code are authoritative and both arguments are
    /// ignored.
    async fn sign_in_with_federated_provider(
        &self,
        selected_role: Role,
        organization_code: Option<&str>,
    ) -> Result<AuthOutcome, AuthError>;

    async fn register_with_password(
        &self,
        email: &str,
        password: &str,
        role: Role,
        organization_code: Option<&str>,
    ) -> Result<AuthOutcome, AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Resolves the stored role for an account. Backend errors and missing or
    /// invalid stored roles all resolve to `Role::User` with a logged
    /// warning; callers can rely on always getting an answer.
    async fn fetch_role(&self, account_id: &str) -> Role;

    /// Resolves the stored organization code; `None` on any backend error.
    async fn fetch_organization_code(&self, account_id: &str) -> Option<String>;

    async fn update_profile(&self, fields: &ProfileUpdate) -> Result<(), AuthError>;

    /// Rotates the organization code issued by an Admin account and returns
    /// the new code. Non-Admin accounts are refused.
    async fn generate_org_code(&self, account_id: &str) -> Result<String, AuthError>;

    /// Whether any account currently carries this exact organization code.
    async fn any_account_has_org_code(&self, code: &str) -> Result<bool, AuthError>;

    /// Subscribes to identity changes. The callback fires once immediately
    /// with the current identity and again on every change, with role and
    /// organization code already joined in. Dropping the returned
    /// [`Subscription`] stops delivery.
    fn observe_identity_changes(&self, callback: IdentityCallback) -> Subscription;
}

#[derive(Default)]
struct NotifierInner {
    next_id: u64,
    subscribers: HashMap<u64, IdentityCallback>,
    current: IdentityEvent,
}

/// Fan-out of identity changes to live subscribers, mirroring the hosted
/// SDK's auth-state observer: new subscribers hear the current identity
/// immediately.
#[derive(Clone, Default)]
pub struct IdentityNotifier {
    inner: Arc<Mutex<NotifierInner>>,
}

impl IdentityNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and delivers the current identity to it before
    /// returning.
    pub fn subscribe(&self, callback: IdentityCallback) -> Subscription {
        let (id, current) = {
            let mut inner = self.inner.lock().expect("notifier lock poisoned");
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.insert(id, Arc::clone(&callback));
            (id, inner.current.clone())
        };
        // Initial delivery happens outside the lock so the callback may
        // subscribe or unsubscribe without deadlocking.
        callback(&current);
        Subscription {
            notifier: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Records `event` as the current identity and notifies all subscribers.
    pub fn notify(&self, event: IdentityEvent) {
        let callbacks: Vec<IdentityCallback> = {
            let mut inner = self.inner.lock().expect("notifier lock poisoned");
            inner.current = event.clone();
            inner.subscribers.values().map(Arc::clone).collect()
        };
        for callback in callbacks {
            callback(&event);
        }
    }
}

/// Handle for one identity-change subscription. Unsubscribes on drop.
pub struct Subscription {
    notifier: Weak<Mutex<NotifierInner>>,
    id: u64,
}

impl Subscription {
    /// Explicit form of dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.notifier.upgrade() {
            if let Ok(mut inner) = inner.lock() {
                inner.subscribers.remove(&self.id);
            }
        }
    }
}
