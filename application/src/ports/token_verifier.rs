//! Token verifier port
//!
//! The gateway-side counterpart of the identity provider: given a bearer
//! access token, establish who it belongs to and which role it carries.
//! Verification is independent of anything the caller claims — the
//! verified identity always wins over declared fields.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sightline_domain::Role;
use thiserror::Error;

/// Identity established by verifying an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl VerifiedIdentity {
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        at >= self.expires_at
    }
}

#[derive(Error, Debug)]
pub enum VerifyError {
    /// The token is unknown to the issuing authority.
    #[error("token rejected")]
    Rejected,

    /// The token was valid once but its lifetime has passed.
    #[error("token expired")]
    Expired,

    #[error("verifier error: {0}")]
    Provider(String),
}

/// Port for verifying bearer access tokens against the issuing authority
/// (or a cached, time-bounded verification result).
#[async_trait]
pub trait TokenVerifierPort: Send + Sync {
    async fn verify(&self, access_token: &str) -> Result<VerifiedIdentity, VerifyError>;
}
