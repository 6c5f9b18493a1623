//! # TDS Console Core (Sessions, Roles & Organizations)
//!
//! `tds-console` is the authentication and access-control core of the TDS
//! API-management console. It owns the process-wide session state machine,
//! role-gated routing decisions, and organization-code issuance/validation;
//! everything else (credential checking, password hashing, token issuance,
//! document storage and querying) is delegated to the hosted authentication +
//! document-store service behind the [`backend::CredentialBackend`] trait.
//!
//! ## Roles & Organizations
//!
//! Accounts carry exactly one of two roles:
//!
//! - **Admin:** issues an organization code (`TDS-` + 6 base-36 uppercase
//!   characters) and oversees the accounts that registered with it. Admins
//!   may rotate their code at any time; accounts that already joined keep
//!   their stored copy.
//! - **User:** must present a currently-known organization code at
//!   registration. The code binds the account to an organization once; it is
//!   not re-validated afterwards.
//!
//! Role values read back from the store are decoded leniently: anything
//! outside the closed set is coerced to `User` with a logged warning, never
//! surfaced as an error.
//!
//! ## Session lifecycle
//!
//! One [`session::Session`] is built at app start with its collaborators
//! injected, subscribes to the backend's identity-change notifications for
//! its entire lifetime, and publishes every transition through a watch
//! channel. Route guards call [`guards::decide`] against the latest snapshot
//! on every navigation; the function is pure and does no I/O.
//!
//! The "remember me" preference and email hint outlive the process in a
//! single JSON file written atomically; no password ever touches disk.

pub mod backend;
pub mod config;
pub mod directory;
pub mod errors;
pub mod guards;
pub mod orgcode;
pub mod projects;
pub mod remember;
pub mod session;
pub mod telemetry;
pub mod types;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
