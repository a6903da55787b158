//! Time-bounded verification cache.
//!
//! Wraps any [`TokenVerifierPort`] with a positive cache so the gateway
//! does not round-trip to the issuing authority on every tool call.
//! Entries are bounded both by the cache TTL and by the token's own
//! expiry; negative results are never cached, so a token that becomes
//! valid (or a transient verifier failure) is re-checked immediately.

use async_trait::async_trait;
use chrono::Utc;
use sightline_application::ports::token_verifier::{
    TokenVerifierPort, VerifiedIdentity, VerifyError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::trace;

/// Caching wrapper around a token verifier.
pub struct CachingVerifier {
    inner: Arc<dyn TokenVerifierPort>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    verified_at: Instant,
    identity: VerifiedIdentity,
}

impl CachingVerifier {
    pub fn new(inner: Arc<dyn TokenVerifierPort>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[async_trait]
impl TokenVerifierPort for CachingVerifier {
    async fn verify(&self, access_token: &str) -> Result<VerifiedIdentity, VerifyError> {
        let now = Utc::now();
        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(access_token) {
                if entry.verified_at.elapsed() < self.ttl && !entry.identity.is_expired(now) {
                    trace!("token verification served from cache");
                    return Ok(entry.identity.clone());
                }
            }
        }

        let identity = self.inner.verify(access_token).await?;
        let mut cache = self.cache.lock().await;
        // sweep dead entries so the map stays bounded by the live token set
        cache.retain(|_, entry| {
            entry.verified_at.elapsed() < self.ttl && !entry.identity.is_expired(now)
        });
        cache.insert(
            access_token.to_string(),
            CacheEntry {
                verified_at: Instant::now(),
                identity: identity.clone(),
            },
        );
        Ok(identity)
    }
}
