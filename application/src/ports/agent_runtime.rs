//! Agent runtime port
//!
//! Defines how the UI-side invocation client talks to the agent runtime.
//! The runtime receives the user message plus the propagation context,
//! verifies the bearer token, runs its reasoning loop, and streams the
//! response back.

use async_trait::async_trait;
use sightline_domain::{PropagationContext, StreamEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors from an agent invocation.
#[derive(Error, Debug)]
pub enum InvokeError {
    /// The runtime rejected the bearer token. Distinguishable so the
    /// caller can force a re-login instead of retrying blindly.
    #[error("access token rejected by agent runtime")]
    TokenRejected,

    #[error("invocation cancelled")]
    Cancelled,

    #[error("agent runtime timed out")]
    Timeout,

    #[error("agent runtime error: {0}")]
    Runtime(String),
}

/// Handle for consuming a streamed agent response.
///
/// Wraps an `mpsc::Receiver<StreamEvent>`; the stream is lazy, finite, and
/// non-restartable. Dropping the handle releases the producer.
#[derive(Debug)]
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event, or `None` once the stream is exhausted.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Drain the stream and collect all assistant text.
    ///
    /// Useful when the caller wants streamed transport but only needs the
    /// final text.
    pub async fn collect_text(mut self) -> Result<String, InvokeError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => full_text.push_str(&chunk),
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => return Err(InvokeError::Runtime(e)),
                StreamEvent::ToolStarted { .. } | StreamEvent::ToolFinished { .. } => {}
            }
        }
        // Channel closed without Completed — return what we have
        Ok(full_text)
    }
}

/// Port to the agent runtime.
#[async_trait]
pub trait AgentRuntimePort: Send + Sync {
    /// Invoke the agent with a user message and an identity snapshot.
    ///
    /// Must reject requests whose access token fails verification. The
    /// cancellation token aborts the in-flight invocation promptly and
    /// must never corrupt caller-side session state.
    async fn invoke(
        &self,
        message: &str,
        context: PropagationContext,
        cancel: CancellationToken,
    ) -> Result<StreamHandle, InvokeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_text_prefers_accumulated_deltas() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(StreamEvent::Delta("Sales ".to_string())).await.unwrap();
        tx.send(StreamEvent::Delta("are up.".to_string())).await.unwrap();
        tx.send(StreamEvent::Completed("Sales are up.".to_string()))
            .await
            .unwrap();
        drop(tx);

        let text = StreamHandle::new(rx).collect_text().await.unwrap();
        assert_eq!(text, "Sales are up.");
    }

    #[tokio::test]
    async fn collect_text_surfaces_stream_errors() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(StreamEvent::Error("runtime exploded".to_string()))
            .await
            .unwrap();
        drop(tx);

        let err = StreamHandle::new(rx).collect_text().await.unwrap_err();
        assert!(matches!(err, InvokeError::Runtime(_)));
    }
}
