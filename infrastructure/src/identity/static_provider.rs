//! Static identity provider.
//!
//! A self-contained identity provider backed by an in-process user
//! directory. It mints opaque bearer tokens and doubles as the issuing
//! authority for verification: [`StaticIdentityProvider`] implements both
//! [`IdentityProviderPort`] and [`TokenVerifierPort`], so the gateway hop
//! can validate tokens against the authority that issued them.
//!
//! A hosted provider (Cognito-style user pool) plugs in at the same two
//! ports without touching the rest of the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sightline_application::ports::identity_provider::{
    AuthError, AuthenticatedUser, IdentityProviderPort, RefreshError, TokenGrant,
};
use sightline_application::ports::token_verifier::{
    TokenVerifierPort, VerifiedIdentity, VerifyError,
};
use sightline_domain::{Role, TokenTriple};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// A provisioned user account.
#[derive(Debug, Clone)]
struct UserRecord {
    user_id: String,
    password: String,
    display_name: String,
    role: Role,
}

/// Identity provider backed by a static in-process directory.
pub struct StaticIdentityProvider {
    users: HashMap<String, UserRecord>,
    token_ttl: Duration,
    /// Access token -> verified identity, for the verification side.
    issued_access: Mutex<HashMap<String, VerifiedIdentity>>,
    /// Refresh token -> username. Removal revokes.
    issued_refresh: Mutex<HashMap<String, String>>,
}

impl StaticIdentityProvider {
    pub fn new(token_ttl: Duration) -> Self {
        Self {
            users: HashMap::new(),
            token_ttl,
            issued_access: Mutex::new(HashMap::new()),
            issued_refresh: Mutex::new(HashMap::new()),
        }
    }

    /// Provision a user account (builder pattern).
    pub fn with_user(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
    ) -> Self {
        let username = username.into();
        self.users.insert(
            username.clone(),
            UserRecord {
                user_id: format!("u-{}", username.replace('@', "-at-")),
                password: password.into(),
                display_name: display_name.into(),
                role,
            },
        );
        self
    }

    /// The demo directory: one analyst, one manager.
    pub fn demo() -> Self {
        Self::new(Duration::from_secs(3600))
            .with_user(
                "analyst@example.com",
                "TempPass123!",
                "Data Analyst",
                Role::Analyst,
            )
            .with_user(
                "manager@example.com",
                "TempPass123!",
                "Sales Manager",
                Role::Manager,
            )
    }

    fn mint_grant(&self, record: &UserRecord, refresh_token: String) -> (TokenGrant, DateTime<Utc>) {
        let access_token = format!("at-{}", Uuid::new_v4());
        let identity_token = format!("it-{}", Uuid::new_v4());
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.token_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(3600));

        self.issued_access.lock().expect("identity provider lock poisoned").insert(
            access_token.clone(),
            VerifiedIdentity {
                user_id: record.user_id.clone(),
                role: record.role.clone(),
                expires_at,
            },
        );

        (
            TokenGrant::new(
                TokenTriple::new(access_token, identity_token, refresh_token),
                self.token_ttl,
            ),
            expires_at,
        )
    }

    fn lock_access(&self) -> std::sync::MutexGuard<'_, HashMap<String, VerifiedIdentity>> {
        self.issued_access.lock().expect("identity provider lock poisoned")
    }

    fn lock_refresh(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.issued_refresh.lock().expect("identity provider lock poisoned")
    }

    /// Force-expire every issued access token (test hook).
    #[doc(hidden)]
    pub fn expire_all_access_tokens(&self) {
        let past = Utc::now() - chrono::Duration::seconds(1);
        for identity in self.lock_access().values_mut() {
            identity.expires_at = past;
        }
    }
}

#[async_trait]
impl IdentityProviderPort for StaticIdentityProvider {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AuthError> {
        let record = self
            .users
            .get(username)
            .filter(|r| r.password == password)
            .ok_or(AuthError::InvalidCredentials)?;

        let refresh_token = format!("rt-{}", Uuid::new_v4());
        self.lock_refresh()
            .insert(refresh_token.clone(), username.to_string());

        let (grant, expires_at) = self.mint_grant(record, refresh_token);
        debug!(username, role = %record.role, %expires_at, "issued token triple");

        Ok(AuthenticatedUser {
            user_id: record.user_id.clone(),
            display_name: record.display_name.clone(),
            role: record.role.clone(),
            grant,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let username = self
            .lock_refresh()
            .get(refresh_token)
            .cloned()
            .ok_or(RefreshError::Rejected)?;
        let record = self
            .users
            .get(&username)
            .ok_or(RefreshError::Rejected)?;

        // The original refresh token stays valid; only access/identity
        // tokens rotate (Cognito refresh flow semantics).
        let (grant, expires_at) = self.mint_grant(record, String::new());
        debug!(username, %expires_at, "refreshed token pair");
        Ok(grant)
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), String> {
        if self.lock_refresh().remove(refresh_token).is_none() {
            warn!("revoke called for an unknown refresh token");
        }
        Ok(())
    }
}

#[async_trait]
impl TokenVerifierPort for StaticIdentityProvider {
    async fn verify(&self, access_token: &str) -> Result<VerifiedIdentity, VerifyError> {
        let identity = self
            .lock_access()
            .get(access_token)
            .cloned()
            .ok_or(VerifyError::Rejected)?;
        if identity.is_expired(Utc::now()) {
            return Err(VerifyError::Expired);
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn authenticate_issues_a_verifiable_triple() {
        let provider = StaticIdentityProvider::demo();

        let user = provider
            .authenticate("analyst@example.com", "TempPass123!")
            .await
            .unwrap();

        assert_eq!(user.role, Role::Analyst);
        let identity = provider.verify(&user.grant.tokens.access_token).await.unwrap();
        assert_eq!(identity.user_id, user.user_id);
        assert_eq!(identity.role, Role::Analyst);
    }

    #[tokio::test]
    async fn bad_password_is_rejected() {
        let provider = StaticIdentityProvider::demo();
        let err = provider
            .authenticate("analyst@example.com", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn refresh_rotates_the_access_token() {
        let provider = StaticIdentityProvider::demo();
        let user = provider
            .authenticate("manager@example.com", "TempPass123!")
            .await
            .unwrap();

        let grant = provider
            .refresh(&user.grant.tokens.refresh_token)
            .await
            .unwrap();

        assert_ne!(grant.tokens.access_token, user.grant.tokens.access_token);
        // refresh token omitted: the original remains the credential
        assert!(grant.tokens.refresh_token.is_empty());
        assert!(provider.verify(&grant.tokens.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn revoked_refresh_token_is_rejected() {
        let provider = StaticIdentityProvider::demo();
        let user = provider
            .authenticate("manager@example.com", "TempPass123!")
            .await
            .unwrap();

        provider.revoke(&user.grant.tokens.refresh_token).await.unwrap();

        let err = provider
            .refresh(&user.grant.tokens.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Rejected));
    }

    #[tokio::test]
    async fn expired_access_tokens_fail_verification() {
        let provider = StaticIdentityProvider::demo();
        let user = provider
            .authenticate("analyst@example.com", "TempPass123!")
            .await
            .unwrap();

        provider.expire_all_access_tokens();

        let err = provider
            .verify(&user.grant.tokens.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Expired));
    }

    #[tokio::test]
    async fn unknown_tokens_are_rejected_outright() {
        let provider = StaticIdentityProvider::demo();
        let err = provider.verify("at-forged").await.unwrap_err();
        assert!(matches!(err, VerifyError::Rejected));
    }
}
