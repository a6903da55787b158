//! Application-level policies: timeouts, renewal margins, retry bounds.

use std::time::Duration;

/// Policy for the session lifecycle.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Safety buffer before true expiry at which refresh kicks in.
    pub renewal_margin: Duration,
    /// Upper bound on the authenticate call.
    pub login_timeout: Duration,
    /// Upper bound on a single refresh attempt.
    pub refresh_timeout: Duration,
    /// Transient refresh failures retried this many times before the
    /// session is treated as expired.
    pub refresh_retries: u32,
    /// Base delay between refresh retries.
    pub refresh_backoff: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            renewal_margin: Duration::from_secs(300),
            login_timeout: Duration::from_secs(10),
            refresh_timeout: Duration::from_secs(10),
            refresh_retries: 2,
            refresh_backoff: Duration::from_millis(500),
        }
    }
}

/// Policy for agent invocation.
#[derive(Debug, Clone)]
pub struct InvokePolicy {
    /// Upper bound on establishing the invocation (the stream itself is
    /// consumed by the caller and bounded by cancellation).
    pub invoke_timeout: Duration,
}

impl Default for InvokePolicy {
    fn default() -> Self {
        Self {
            invoke_timeout: Duration::from_secs(600),
        }
    }
}
