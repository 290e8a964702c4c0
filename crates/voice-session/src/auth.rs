//! Authentication collaborator
//!
//! The session only checks that somebody is signed in and holds a token. Token refresh and
//! storage belong to the application.

/// Source of the current authentication state
pub trait AuthProvider: Send + Sync {
    /// Whether a user is signed in
    fn is_authenticated(&self) -> bool;

    /// The current access token, if any
    fn access_token(&self) -> Option<String>;

    /// Signed in and holding a non-empty token
    fn has_credentials(&self) -> bool {
        self.is_authenticated()
            && self
                .access_token()
                .map(|token| !token.is_empty())
                .unwrap_or(false)
    }
}

/// Fixed authentication state
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    token: Option<String>,
}

impl StaticAuth {
    /// Signed in with the given token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Nobody signed in
    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

impl AuthProvider for StaticAuth {
    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}
