//! Session lifecycle use case.
//!
//! [`SessionManager`] owns the token lifecycle: it authenticates against
//! the identity provider, keeps the cached access token fresh with
//! proactive renewal, and serializes refresh attempts so concurrent
//! callers never trigger duplicate network refreshes.
//!
//! Renewal is proactive — checked before every invocation against a
//! safety margin — rather than reactive after a 401, so long interactive
//! conversations never fail mid-turn on an expired token.

use crate::config::SessionPolicy;
use crate::ports::identity_provider::{AuthError, IdentityProviderPort, TokenGrant};
use crate::store::CredentialStore;
use chrono::Utc;
use sightline_domain::Session;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Errors surfaced by the session lifecycle.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("no active session")]
    NotLoggedIn,

    /// The refresh token was rejected or refresh attempts were exhausted.
    /// The store has been cleared; the user must log in again.
    #[error("session expired, re-login required")]
    Expired,
}

/// Manages the one live session held in a [`CredentialStore`].
pub struct SessionManager {
    provider: Arc<dyn IdentityProviderPort>,
    store: Arc<CredentialStore>,
    policy: SessionPolicy,
    /// Single-flight guard: at most one network refresh per session.
    refresh_gate: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProviderPort>,
        store: Arc<CredentialStore>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            provider,
            store,
            policy,
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Authenticate and establish the live session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, SessionError> {
        let user = timeout(
            self.policy.login_timeout,
            self.provider.authenticate(username, password),
        )
        .await
        .map_err(|_| SessionError::Auth(AuthError::Timeout))??;

        let now = Utc::now();
        let expires_at = now + grant_lifetime(&user.grant);
        let session = Session::new(
            user.user_id,
            user.display_name,
            user.role,
            user.grant.tokens,
            now,
            expires_at,
        );
        self.store.set(session.clone()).await;
        info!(
            user_id = %session.user_id,
            role = %session.role,
            expires_at = %session.expires_at,
            store = self.store.store_id(),
            "login succeeded"
        );
        Ok(session)
    }

    /// The current live session, if any.
    pub async fn current(&self) -> Result<Session, SessionError> {
        self.store.get().await.ok_or(SessionError::NotLoggedIn)
    }

    /// Return a currently-valid access token, refreshing if needed.
    ///
    /// Inside the renewal margin this is a pure expiry comparison with no
    /// network call. Outside it, refresh is single-flight: concurrent
    /// callers queue on the gate and reuse the in-flight result.
    pub async fn ensure_valid(&self) -> Result<String, SessionError> {
        let margin = renewal_margin(&self.policy);
        let session = self.store.get().await.ok_or(SessionError::NotLoggedIn)?;
        if session.is_fresh(Utc::now(), margin) {
            return Ok(session.tokens.access_token);
        }

        let _gate = self.refresh_gate.lock().await;

        // Re-check after acquiring the gate: an in-flight refresh may have
        // already renewed (or cleared) the session while we waited.
        let session = match self.store.get().await {
            Some(s) => s,
            None => return Err(SessionError::Expired),
        };
        if session.is_fresh(Utc::now(), margin) {
            return Ok(session.tokens.access_token);
        }

        self.refresh_locked(&session).await
    }

    /// Refresh the token triple. Caller must hold `refresh_gate`.
    async fn refresh_locked(&self, session: &Session) -> Result<String, SessionError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = timeout(
                self.policy.refresh_timeout,
                self.provider.refresh(&session.tokens.refresh_token),
            )
            .await;

            match outcome {
                Ok(Ok(grant)) => {
                    let now = Utc::now();
                    let expires_at = now + grant_lifetime(&grant);
                    let access_token = grant.tokens.access_token.clone();
                    self.store
                        .update(|s| s.apply_refresh(grant.tokens, now, expires_at))
                        .await;
                    debug!(user_id = %session.user_id, expires_at = %expires_at, "token refreshed");
                    return Ok(access_token);
                }
                Ok(Err(e)) if e.is_transient() && attempt < self.policy.refresh_retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "transient refresh failure, backing off");
                    tokio::time::sleep(self.policy.refresh_backoff * attempt).await;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "refresh failed, clearing session");
                    self.store.clear().await;
                    return Err(SessionError::Expired);
                }
                Err(_) if attempt < self.policy.refresh_retries => {
                    attempt += 1;
                    warn!(attempt, "refresh attempt timed out, backing off");
                    tokio::time::sleep(self.policy.refresh_backoff * attempt).await;
                }
                Err(_) => {
                    warn!("refresh attempts exhausted, clearing session");
                    self.store.clear().await;
                    return Err(SessionError::Expired);
                }
            }
        }
    }

    /// Invalidate local state and best-effort revoke upstream.
    ///
    /// Never fails the caller: revocation problems are logged only.
    pub async fn logout(&self) {
        let Some(session) = self.store.take().await else {
            return;
        };
        match timeout(
            self.policy.refresh_timeout,
            self.provider.revoke(&session.tokens.refresh_token),
        )
        .await
        {
            Ok(Ok(())) => debug!(user_id = %session.user_id, "refresh token revoked"),
            Ok(Err(e)) => warn!(user_id = %session.user_id, error = %e, "revocation failed"),
            Err(_) => warn!(user_id = %session.user_id, "revocation timed out"),
        }
    }
}

fn grant_lifetime(grant: &TokenGrant) -> chrono::Duration {
    chrono::Duration::from_std(grant.expires_in).unwrap_or_else(|_| chrono::Duration::seconds(3600))
}

fn renewal_margin(policy: &SessionPolicy) -> chrono::Duration {
    chrono::Duration::from_std(policy.renewal_margin).unwrap_or_else(|_| chrono::Duration::seconds(300))
}
