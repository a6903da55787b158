//! Identity propagation context (Value Object).
//!
//! [`PropagationContext`] is the immutable snapshot of a session's identity
//! that travels with every outbound agent invocation. It carries only the
//! bearer access token, the declared role, and the user id — never the
//! refresh token, which must not leave the session boundary that owns it.
//! Downstream hops treat the role as a claim and re-verify it against the
//! token before authorizing anything.

use super::entities::{Role, Session};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable identity snapshot attached to an outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationContext {
    /// Bearer access token (a copy, not a reference into the session).
    pub access_token: String,
    /// Role declared by the session; re-verified at the gateway hop.
    pub role: Role,
    pub user_id: String,
    /// Unique id for this invocation, minted at construction.
    pub request_id: String,
}

impl PropagationContext {
    /// Build a fresh context from the current session.
    ///
    /// Pure: no side effects, no network. Copies exactly the fields the
    /// downstream hops need and nothing that could mint new tokens.
    pub fn for_session(session: &Session) -> Self {
        Self {
            access_token: session.tokens.access_token.clone(),
            role: session.role.clone(),
            user_id: session.user_id.clone(),
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::entities::TokenTriple;
    use chrono::{Duration, Utc};

    fn sample_session() -> Session {
        let now = Utc::now();
        Session::new(
            "u-42",
            "Sales Manager",
            Role::Manager,
            TokenTriple::new("access-xyz", "identity-xyz", "refresh-xyz"),
            now,
            now + Duration::seconds(3600),
        )
    }

    #[test]
    fn context_copies_only_required_fields() {
        let session = sample_session();
        let ctx = PropagationContext::for_session(&session);

        assert_eq!(ctx.access_token, "access-xyz");
        assert_eq!(ctx.role, Role::Manager);
        assert_eq!(ctx.user_id, "u-42");
        assert!(!ctx.request_id.is_empty());
    }

    #[test]
    fn context_never_contains_the_refresh_token() {
        let session = sample_session();
        let ctx = PropagationContext::for_session(&session);

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("refresh"));
        assert!(!json.contains("refresh-xyz"));
    }

    #[test]
    fn context_round_trips_through_serde() {
        let session = sample_session();
        let ctx = PropagationContext::for_session(&session);

        let json = serde_json::to_string(&ctx).unwrap();
        let restored: PropagationContext = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, ctx);
    }

    #[test]
    fn each_context_gets_a_fresh_request_id() {
        let session = sample_session();
        let a = PropagationContext::for_session(&session);
        let b = PropagationContext::for_session(&session);

        assert_ne!(a.request_id, b.request_id);
    }
}
