//! Streaming events for agent invocation.
//!
//! An invocation produces a lazy, finite, non-restartable sequence of
//! [`StreamEvent`]s so the UI can render partial output while tools run.
//! Cancellation stops the producer; a dropped receiver releases it.

use crate::tool::ToolResult;

/// An event in a streamed agent response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A chunk of assistant text.
    Delta(String),
    /// A tool call has been routed to the gateway.
    ToolStarted { tool_name: String },
    /// A tool call finished (successfully or not).
    ToolFinished { result: ToolResult },
    /// The complete response text (signals stream end).
    Completed(String),
    /// A terminal error (signals stream end).
    Error(String),
}

impl StreamEvent {
    /// Returns the text content of a `Delta` or `Completed` event.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::Delta(s) | StreamEvent::Completed(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed(_) | StreamEvent::Error(_))
    }
}
