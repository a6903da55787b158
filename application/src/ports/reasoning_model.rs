//! Reasoning model port
//!
//! The model behind the agent runtime's loop: given the transcript so far
//! and the registry of callable queries, produce the next turn — text,
//! tool requests, or both. A hosted LLM adapter and the deterministic
//! heuristic model both plug in here.

use async_trait::async_trait;
use sightline_domain::{QueryRegistry, ToolRequest, ToolResult};
use thiserror::Error;

/// One item of the conversation transcript fed to the model.
#[derive(Debug, Clone)]
pub enum TranscriptItem {
    User(String),
    Assistant(String),
    Tool(ToolResult),
}

/// A single reasoning step.
///
/// An empty `requests` list means the model is done and `text` is the
/// final answer for this turn.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub text: String,
    pub requests: Vec<ToolRequest>,
}

impl ModelTurn {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            requests: Vec::new(),
        }
    }

    pub fn with_request(mut self, request: ToolRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn is_final(&self) -> bool {
        self.requests.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model failure: {0}")]
    Failed(String),
}

/// Port for the reasoning model.
#[async_trait]
pub trait ReasoningModelPort: Send + Sync {
    async fn next_turn(
        &self,
        transcript: &[TranscriptItem],
        registry: &QueryRegistry,
    ) -> Result<ModelTurn, ModelError>;
}
