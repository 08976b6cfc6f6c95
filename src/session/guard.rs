//! Route guarding decisions derived from a session snapshot.
//!
//! "Not yet initialized" and "not authenticated" are different answers: the
//! first means wait (show a loading affordance), the second means redirect.

use super::SessionSnapshot;

pub const HOME_PATH: &str = "/";
pub const DASHBOARD_PATH: &str = "/user";

const PUBLIC_ROUTES: [&str; 4] = ["/sign-in", "/sign-up", "/forgot-password", "/404"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Validation is still running.
    Pending,
    /// Navigate elsewhere instead of rendering.
    Redirect(&'static str),
    Allow,
}

/// Decide whether a protected screen may render.
#[must_use]
pub fn guard_protected(snapshot: &SessionSnapshot) -> GuardDecision {
    if !snapshot.is_initialized || snapshot.is_loading {
        return GuardDecision::Pending;
    }
    if snapshot.is_authenticated() {
        GuardDecision::Allow
    } else {
        GuardDecision::Redirect(HOME_PATH)
    }
}

/// Whether `path` requires a signed-in user.
#[must_use]
pub fn is_protected_route(path: &str) -> bool {
    !PUBLIC_ROUTES.contains(&path)
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
