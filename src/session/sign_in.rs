//! Sign-in screen flow on top of [`SessionStore::login`].

use super::guard::DASHBOARD_PATH;
use super::{LoginCredentials, SessionSnapshot, SessionStore};

pub const MISSING_FIELDS_MESSAGE: &str = "Please enter both username and password";
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please try again.";

/// What the sign-in screen should show for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInEntry {
    /// Still checking authentication.
    Loading,
    /// Already signed in; go to the dashboard instead.
    Redirect(&'static str),
    ShowForm,
}

#[must_use]
pub fn sign_in_entry(snapshot: &SessionSnapshot) -> SignInEntry {
    if !snapshot.is_initialized {
        SignInEntry::Loading
    } else if snapshot.is_authenticated() {
        SignInEntry::Redirect(DASHBOARD_PATH)
    } else {
        SignInEntry::ShowForm
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignInForm {
    pub username: String,
    pub password: String,
}

impl SignInForm {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    /// Submit the form.
    ///
    /// # Errors
    ///
    /// Returns the message to show above the form: a missing-field prompt
    /// (no request is made), the backend's `detail`, or a generic failure.
    pub async fn submit(&self, session: &SessionStore) -> Result<&'static str, String> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(MISSING_FIELDS_MESSAGE.to_owned());
        }

        let credentials = LoginCredentials::new(self.username.clone(), self.password.clone());
        match session.login(&credentials).await {
            Ok(_) => Ok(DASHBOARD_PATH),
            Err(e) => Err(e.user_message(LOGIN_FAILED_MESSAGE)),
        }
    }
}

#[cfg(test)]
#[path = "sign_in_test.rs"]
mod tests;
