//! Identity domain entities

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Role attached to a user's identity.
///
/// Roles are declared by the identity provider as a user attribute and
/// carried through the pipeline as verified claims. The set is open ended:
/// unknown role strings are preserved in [`Role::Other`] rather than
/// rejected, so new roles can be provisioned without a code change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Analyst,
    Manager,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Analyst => "analyst",
            Role::Manager => "manager",
            Role::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "analyst" => Role::Analyst,
            "manager" => Role::Manager,
            _ => Role::Other(s),
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Role::from(s.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The three tokens issued by the identity provider.
///
/// The access token authorizes API calls, the identity token carries
/// user claims, and the refresh token mints new token pairs. Only the
/// access token ever leaves the session boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTriple {
    pub access_token: String,
    pub identity_token: String,
    pub refresh_token: String,
}

impl TokenTriple {
    pub fn new(
        access_token: impl Into<String>,
        identity_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            identity_token: identity_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// An authenticated user session (Entity).
///
/// Created by a successful login, mutated in place by token refresh,
/// destroyed on logout. Exactly one session is live per credential store;
/// the session is never shared across users.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    pub tokens: TokenTriple,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
        tokens: TokenTriple,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            role,
            tokens,
            issued_at,
            expires_at,
        }
    }

    /// Whether the access token is still inside its freshness window.
    ///
    /// `margin` is the renewal safety buffer: a token is stale once
    /// `at >= expires_at - margin`, even though it is technically still
    /// valid until `expires_at`.
    pub fn is_fresh(&self, at: DateTime<Utc>, margin: Duration) -> bool {
        at < self.expires_at - margin
    }

    /// Apply a refreshed token grant in place.
    ///
    /// The provider may omit a new refresh token on the refresh flow
    /// (Cognito-style); in that case the original refresh token stays valid
    /// and is kept.
    pub fn apply_refresh(
        &mut self,
        mut tokens: TokenTriple,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) {
        if tokens.refresh_token.is_empty() {
            tokens.refresh_token = self.tokens.refresh_token.clone();
        }
        self.tokens = tokens;
        self.issued_at = issued_at;
        self.expires_at = expires_at;
    }
}
