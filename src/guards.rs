//! Role-gated route access. `decide` is the single access-control decision
//! used in front of every restricted view: pure, no I/O, re-evaluated on
//! every session change and on every navigation. UX-only gating; real access
//! control must live on the API.

use crate::session::AuthState;
use crate::types::Role;

pub const LOGIN_PATH: &str = "/login";
pub const ADMIN_HOME_PATH: &str = "/admin-dashboard";
pub const USER_HOME_PATH: &str = "/dashboard";

/// What the router should do for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Auth state is still resolving; show a placeholder and wait for the
    /// next evaluation.
    Loading,
    /// Render the guarded content.
    Render,
    /// Navigate away instead of rendering.
    Redirect(&'static str),
}

/// Decides whether the guarded view may render for the given session state.
///
/// Unauthenticated sessions always land on the login page. A role mismatch
/// sends the account to its own home, so an Admin deep-linking into a User
/// view ends up on the admin dashboard and vice versa.
#[must_use]
pub fn decide(state: &AuthState, required_role: Option<Role>) -> RouteDecision {
    if state.loading {
        return RouteDecision::Loading;
    }

    if !state.is_authenticated {
        return RouteDecision::Redirect(LOGIN_PATH);
    }

    if let Some(required) = required_role {
        if state.role != Some(required) {
            return RouteDecision::Redirect(role_home(state.role));
        }
    }

    RouteDecision::Render
}

/// Home path for a role; unknown/missing roles get the User home.
#[must_use]
pub fn role_home(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Admin) => ADMIN_HOME_PATH,
        _ => USER_HOME_PATH,
    }
}
