//! Identity provider port
//!
//! Defines the interface to the upstream identity provider (the issuing
//! authority for the token triple). Implementations (adapters) live in the
//! infrastructure layer.

use async_trait::async_trait;
use sightline_domain::{Role, TokenTriple};
use std::time::Duration;
use thiserror::Error;

/// Errors from the authentication flow.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Bad credentials. User-facing, never retried.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("identity provider timed out")]
    Timeout,

    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Errors from the refresh flow.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// The refresh token itself was rejected (expired or revoked).
    /// Not transient: the session must be cleared and re-established.
    #[error("refresh token rejected")]
    Rejected,

    #[error("refresh timed out")]
    Timeout,

    #[error("identity provider error: {0}")]
    Provider(String),
}

impl RefreshError {
    /// Whether a bounded retry with backoff is worthwhile.
    pub fn is_transient(&self) -> bool {
        !matches!(self, RefreshError::Rejected)
    }
}

/// A freshly minted token grant with its provider-declared lifetime.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub tokens: TokenTriple,
    pub expires_in: Duration,
}

impl TokenGrant {
    pub fn new(tokens: TokenTriple, expires_in: Duration) -> Self {
        Self { tokens, expires_in }
    }
}

/// The authenticated user returned by a successful login.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    pub grant: TokenGrant,
}

/// Port to the identity provider.
#[async_trait]
pub trait IdentityProviderPort: Send + Sync {
    /// Authenticate with username/password, returning the token triple and
    /// the user attributes (display name, role) derived from the identity
    /// token.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AuthError>;

    /// Exchange a refresh token for a new grant. The returned triple may
    /// omit the refresh token when the provider keeps the original valid.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError>;

    /// Best-effort upstream revocation. Failures are reported but callers
    /// must not treat them as fatal.
    async fn revoke(&self, refresh_token: &str) -> Result<(), String>;
}
