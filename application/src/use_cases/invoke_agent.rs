//! Agent invocation use case.
//!
//! The UI-side client: guarantees a valid token, snapshots the session
//! into a [`PropagationContext`], and hands the message to the agent
//! runtime. Cancellation aborts only the in-flight call — the session is
//! never mutated on this path.

use crate::config::InvokePolicy;
use crate::ports::agent_runtime::{AgentRuntimePort, InvokeError, StreamHandle};
use crate::use_cases::session_lifecycle::{SessionError, SessionManager};
use sightline_domain::PropagationContext;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Error, Debug)]
pub enum InvokeAgentError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The runtime rejected the token this client believed was valid.
    /// Never retried with the same token: the caller should force a fresh
    /// login instead.
    #[error("access token rejected, re-login required")]
    TokenRejected,

    /// User-initiated. Not a failure to log as an error.
    #[error("invocation cancelled")]
    Cancelled,

    #[error("agent runtime timed out")]
    Timeout,

    #[error("agent runtime error: {0}")]
    Runtime(String),
}

/// Sends user messages to the agent runtime with identity attached.
pub struct InvokeAgentUseCase {
    sessions: Arc<SessionManager>,
    runtime: Arc<dyn AgentRuntimePort>,
    policy: InvokePolicy,
}

impl InvokeAgentUseCase {
    pub fn new(
        sessions: Arc<SessionManager>,
        runtime: Arc<dyn AgentRuntimePort>,
        policy: InvokePolicy,
    ) -> Self {
        Self {
            sessions,
            runtime,
            policy,
        }
    }

    /// Invoke the agent with a user message, returning the response stream.
    pub async fn invoke(
        &self,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<StreamHandle, InvokeAgentError> {
        // Proactive renewal before the context is built, so the snapshot
        // always carries a token inside its freshness window.
        self.sessions.ensure_valid().await?;
        let session = self.sessions.current().await?;
        let context = PropagationContext::for_session(&session);
        debug!(
            request_id = %context.request_id,
            user_id = %context.user_id,
            role = %context.role,
            "invoking agent runtime"
        );

        let invocation = self.runtime.invoke(message, context, cancel.clone());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InvokeAgentError::Cancelled),
            outcome = timeout(self.policy.invoke_timeout, invocation) => match outcome {
                Err(_) => Err(InvokeAgentError::Timeout),
                Ok(Ok(handle)) => Ok(handle),
                Ok(Err(InvokeError::TokenRejected)) => Err(InvokeAgentError::TokenRejected),
                Ok(Err(InvokeError::Cancelled)) => Err(InvokeAgentError::Cancelled),
                Ok(Err(InvokeError::Timeout)) => Err(InvokeAgentError::Timeout),
                Ok(Err(InvokeError::Runtime(e))) => Err(InvokeAgentError::Runtime(e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionPolicy;
    use crate::ports::identity_provider::{
        AuthError, AuthenticatedUser, IdentityProviderPort, RefreshError, TokenGrant,
    };
    use crate::store::CredentialStore;
    use async_trait::async_trait;
    use sightline_domain::{Role, StreamEvent, TokenTriple};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct StubProvider;

    #[async_trait]
    impl IdentityProviderPort for StubProvider {
        async fn authenticate(
            &self,
            _username: &str,
            _password: &str,
        ) -> Result<AuthenticatedUser, AuthError> {
            Ok(AuthenticatedUser {
                user_id: "u-mgr".to_string(),
                display_name: "Sales Manager".to_string(),
                role: Role::Manager,
                grant: TokenGrant::new(
                    TokenTriple::new("access-mgr", "identity-mgr", "refresh-mgr"),
                    Duration::from_secs(3600),
                ),
            })
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, RefreshError> {
            Err(RefreshError::Rejected)
        }

        async fn revoke(&self, _refresh_token: &str) -> Result<(), String> {
            Ok(())
        }
    }

    enum RuntimeBehavior {
        Echo,
        RejectToken,
        Hang,
    }

    struct StubRuntime {
        behavior: RuntimeBehavior,
    }

    #[async_trait]
    impl AgentRuntimePort for StubRuntime {
        async fn invoke(
            &self,
            message: &str,
            context: PropagationContext,
            cancel: CancellationToken,
        ) -> Result<StreamHandle, InvokeError> {
            match self.behavior {
                RuntimeBehavior::Echo => {
                    assert_eq!(context.access_token, "access-mgr");
                    let (tx, rx) = mpsc::channel(4);
                    tx.send(StreamEvent::Completed(format!("echo: {message}")))
                        .await
                        .map_err(|e| InvokeError::Runtime(e.to_string()))?;
                    Ok(StreamHandle::new(rx))
                }
                RuntimeBehavior::RejectToken => Err(InvokeError::TokenRejected),
                RuntimeBehavior::Hang => {
                    cancel.cancelled().await;
                    Err(InvokeError::Cancelled)
                }
            }
        }
    }

    async fn use_case_with(behavior: RuntimeBehavior) -> (InvokeAgentUseCase, Arc<CredentialStore>) {
        let store = Arc::new(CredentialStore::new());
        let sessions = Arc::new(SessionManager::new(
            Arc::new(StubProvider),
            store.clone(),
            SessionPolicy::default(),
        ));
        sessions.login("manager@example.com", "TempPass123!").await.unwrap();
        let use_case = InvokeAgentUseCase::new(
            sessions,
            Arc::new(StubRuntime { behavior }),
            InvokePolicy::default(),
        );
        (use_case, store)
    }

    #[tokio::test]
    async fn invoke_attaches_context_and_streams_response() {
        let (use_case, _) = use_case_with(RuntimeBehavior::Echo).await;

        let handle = use_case
            .invoke("show sales trends", CancellationToken::new())
            .await
            .unwrap();

        let text = handle.collect_text().await.unwrap();
        assert_eq!(text, "echo: show sales trends");
    }

    #[tokio::test]
    async fn token_rejection_is_distinguishable_and_not_retried() {
        let (use_case, store) = use_case_with(RuntimeBehavior::RejectToken).await;

        let err = use_case
            .invoke("hello", CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, InvokeAgentError::TokenRejected));
        // session state is untouched: the caller decides about re-login
        assert!(store.is_logged_in().await);
    }

    #[tokio::test]
    async fn cancellation_aborts_without_touching_the_session() {
        let (use_case, store) = use_case_with(RuntimeBehavior::Hang).await;
        let before = store.get().await.unwrap();

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = use_case.invoke("hello", cancel).await.unwrap_err();

        assert!(matches!(err, InvokeAgentError::Cancelled));
        let after = store.get().await.unwrap();
        assert_eq!(after.tokens, before.tokens);
        assert_eq!(after.expires_at, before.expires_at);
    }

    #[tokio::test]
    async fn invoking_without_a_session_fails() {
        let store = Arc::new(CredentialStore::new());
        let sessions = Arc::new(SessionManager::new(
            Arc::new(StubProvider),
            store,
            SessionPolicy::default(),
        ));
        let use_case = InvokeAgentUseCase::new(
            sessions,
            Arc::new(StubRuntime {
                behavior: RuntimeBehavior::Echo,
            }),
            InvokePolicy::default(),
        );

        let err = use_case
            .invoke("hello", CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            InvokeAgentError::Session(SessionError::NotLoggedIn)
        ));
    }
}
