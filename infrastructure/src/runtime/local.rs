//! Local agent runtime.
//!
//! In-process stand-in for a hosted agent runtime: verifies the bearer
//! token on entry, then drives the reasoning loop — model turn, routed
//! tool calls, repeat — and streams events back over a bounded channel.
//! Tool failures are folded back into the transcript as error results so
//! the model can explain them instead of the invocation aborting.

use crate::gateway::router::ToolGatewayRouter;
use sightline_application::ports::agent_runtime::{AgentRuntimePort, InvokeError, StreamHandle};
use sightline_application::ports::reasoning_model::{ReasoningModelPort, TranscriptItem};
use sightline_application::ports::token_verifier::TokenVerifierPort;
use sightline_domain::{PropagationContext, QueryRegistry, StreamEvent};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STREAM_BUFFER: usize = 32;

/// Bounds on a single agent invocation.
#[derive(Debug, Clone)]
pub struct RuntimePolicy {
    /// Maximum reasoning turns before the loop is cut short.
    pub max_turns: usize,
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Self { max_turns: 10 }
    }
}

/// Drives the reasoning loop against the local gateway and engine.
pub struct LocalAgentRuntime {
    verifier: Arc<dyn TokenVerifierPort>,
    model: Arc<dyn ReasoningModelPort>,
    router: Arc<ToolGatewayRouter>,
    registry: Arc<QueryRegistry>,
    policy: RuntimePolicy,
}

impl LocalAgentRuntime {
    pub fn new(
        verifier: Arc<dyn TokenVerifierPort>,
        model: Arc<dyn ReasoningModelPort>,
        router: Arc<ToolGatewayRouter>,
        registry: Arc<QueryRegistry>,
        policy: RuntimePolicy,
    ) -> Self {
        Self {
            verifier,
            model,
            router,
            registry,
            policy,
        }
    }
}

#[async_trait]
impl AgentRuntimePort for LocalAgentRuntime {
    async fn invoke(
        &self,
        message: &str,
        context: PropagationContext,
        cancel: CancellationToken,
    ) -> Result<StreamHandle, InvokeError> {
        // Entry check: the runtime never starts a loop on an unverified
        // token, even though the gateway will verify again per call.
        self.verifier
            .verify(&context.access_token)
            .await
            .map_err(|_| InvokeError::TokenRejected)?;

        info!(
            request_id = %context.request_id,
            role = %context.role,
            "agent invocation accepted"
        );

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let model = self.model.clone();
        let router = self.router.clone();
        let registry = self.registry.clone();
        let max_turns = self.policy.max_turns;
        let message = message.to_string();

        tokio::spawn(async move {
            let mut transcript = vec![TranscriptItem::User(message)];
            let mut full_text = String::new();

            for turn_index in 0..max_turns {
                let turn = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("invocation cancelled mid-loop");
                        return;
                    }
                    outcome = model.next_turn(&transcript, &registry) => match outcome {
                        Ok(turn) => turn,
                        Err(e) => {
                            let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                            return;
                        }
                    },
                };

                if !turn.text.is_empty() {
                    full_text.push_str(&turn.text);
                    full_text.push('\n');
                    if tx.send(StreamEvent::Delta(turn.text.clone())).await.is_err() {
                        return;
                    }
                    transcript.push(TranscriptItem::Assistant(turn.text.clone()));
                }

                if turn.is_final() {
                    let _ = tx
                        .send(StreamEvent::Completed(full_text.trim_end().to_string()))
                        .await;
                    return;
                }

                for request in turn.requests {
                    let tool_name = request.tool_name.clone();
                    if tx
                        .send(StreamEvent::ToolStarted {
                            tool_name: tool_name.clone(),
                        })
                        .await
                        .is_err()
                    {
                        return;
                    }

                    let call = request.into_call(context.role.clone());
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!("invocation cancelled during tool call");
                            return;
                        }
                        routed = router.route(call, &context) => match routed {
                            Ok(result) => result,
                            Err(route_err) => route_err.into_tool_result(&tool_name),
                        },
                    };

                    if tx
                        .send(StreamEvent::ToolFinished {
                            result: result.clone(),
                        })
                        .await
                        .is_err()
                    {
                        return;
                    }
                    transcript.push(TranscriptItem::Tool(result));
                }

                debug!(turn = turn_index + 1, "reasoning turn complete");
            }

            warn!(max_turns, "reasoning loop hit its turn bound");
            let _ = tx
                .send(StreamEvent::Completed(full_text.trim_end().to_string()))
                .await;
        });

        Ok(StreamHandle::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_registry;
    use crate::engine::memory::MemoryDataEngine;
    use crate::executor::dispatcher::{DispatchPolicy, QueryDispatcher};
    use crate::gateway::verifier::CachingVerifier;
    use crate::identity::static_provider::StaticIdentityProvider;
    use crate::runtime::heuristic::HeuristicModel;
    use sightline_application::ports::identity_provider::IdentityProviderPort;
    use sightline_application::ports::reasoning_model::{ModelError, ModelTurn};
    use sightline_domain::{Session, ToolRequest, ToolStatus};
    use std::time::Duration;

    fn wire(model: Arc<dyn ReasoningModelPort>) -> (Arc<StaticIdentityProvider>, LocalAgentRuntime) {
        let provider = Arc::new(StaticIdentityProvider::demo());
        let verifier = Arc::new(CachingVerifier::new(
            provider.clone(),
            Duration::from_secs(60),
        ));
        let registry = Arc::new(builtin_registry());
        let dispatcher = Arc::new(QueryDispatcher::new(
            Arc::new(MemoryDataEngine::with_sample_data()),
            registry.clone(),
            DispatchPolicy::default(),
        ));
        let router = Arc::new(ToolGatewayRouter::new(
            verifier.clone(),
            registry.clone(),
            dispatcher,
        ));
        let runtime = LocalAgentRuntime::new(
            verifier,
            model,
            router,
            registry,
            RuntimePolicy::default(),
        );
        (provider, runtime)
    }

    async fn context_for(provider: &StaticIdentityProvider, username: &str) -> PropagationContext {
        let user = provider.authenticate(username, "TempPass123!").await.unwrap();
        let now = chrono::Utc::now();
        let session = Session::new(
            user.user_id,
            user.display_name,
            user.role,
            user.grant.tokens,
            now,
            now + chrono::Duration::seconds(3600),
        );
        PropagationContext::for_session(&session)
    }

    async fn drain(mut handle: StreamHandle) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn analyst_question_streams_a_tool_backed_answer() {
        let (provider, runtime) = wire(Arc::new(HeuristicModel::new()));
        let ctx = context_for(&provider, "analyst@example.com").await;

        let handle = runtime
            .invoke(
                "How have sales trended recently?",
                ctx,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let events = drain(handle).await;

        assert!(events.iter().any(
            |e| matches!(e, StreamEvent::ToolStarted { tool_name } if tool_name == "get_sales_summary")
        ));
        let finished = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::ToolFinished { result } => Some(result),
                _ => None,
            })
            .unwrap();
        assert!(finished.is_ok());
        assert!(matches!(
            events.last(),
            Some(StreamEvent::Completed(text)) if text.contains("total_sales")
        ));
    }

    #[tokio::test]
    async fn restricted_tool_becomes_an_explained_error_not_an_abort() {
        let (provider, runtime) = wire(Arc::new(HeuristicModel::new()));
        let ctx = context_for(&provider, "analyst@example.com").await;

        let handle = runtime
            .invoke("Who are our top customers?", ctx, CancellationToken::new())
            .await
            .unwrap();
        let events = drain(handle).await;

        let finished = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::ToolFinished { result } => Some(result),
                _ => None,
            })
            .unwrap();
        assert_eq!(finished.status, ToolStatus::Error);
        assert_eq!(finished.error().unwrap().code, "UNAUTHORIZED");
        // the loop still finishes the conversation
        assert!(matches!(events.last(), Some(StreamEvent::Completed(_))));
    }

    #[tokio::test]
    async fn manager_reaches_the_restricted_tool() {
        let (provider, runtime) = wire(Arc::new(HeuristicModel::new()));
        let ctx = context_for(&provider, "manager@example.com").await;

        let handle = runtime
            .invoke(
                "Who are our top 5 customers?",
                ctx,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let events = drain(handle).await;

        let finished = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::ToolFinished { result } => Some(result),
                _ => None,
            })
            .unwrap();
        assert!(finished.is_ok());
        assert!(finished.payload().unwrap().row_count() <= 5);
    }

    #[tokio::test]
    async fn missing_warehouse_is_explained_in_the_final_answer() {
        let (provider, runtime) = wire(Arc::new(HeuristicModel::new()));
        let ctx = context_for(&provider, "analyst@example.com").await;

        let handle = runtime
            .invoke(
                "What's the inventory status in warehouse WH999?",
                ctx,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let events = drain(handle).await;

        let finished = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::ToolFinished { result } => Some(result),
                _ => None,
            })
            .unwrap();
        assert_eq!(finished.error().unwrap().code, "ENGINE_EXECUTION");
        assert!(matches!(
            events.last(),
            Some(StreamEvent::Completed(text)) if text.contains("WH999")
        ));
    }

    #[tokio::test]
    async fn forged_tokens_are_rejected_before_any_stream() {
        let (provider, runtime) = wire(Arc::new(HeuristicModel::new()));
        let mut ctx = context_for(&provider, "analyst@example.com").await;
        ctx.access_token = "at-forged".to_string();

        let err = runtime
            .invoke("sales please", ctx, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, InvokeError::TokenRejected));
    }

    #[tokio::test]
    async fn cancellation_ends_the_stream_promptly() {
        let (provider, runtime) = wire(Arc::new(HeuristicModel::new()));
        let ctx = context_for(&provider, "analyst@example.com").await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let handle = runtime
            .invoke("How have sales trended?", ctx, cancel)
            .await
            .unwrap();
        let events = drain(handle).await;

        assert!(!matches!(events.last(), Some(StreamEvent::Completed(_))));
    }

    /// Model that always wants one more tool call.
    struct InsatiableModel;

    #[async_trait]
    impl ReasoningModelPort for InsatiableModel {
        async fn next_turn(
            &self,
            _transcript: &[TranscriptItem],
            _registry: &QueryRegistry,
        ) -> Result<ModelTurn, ModelError> {
            Ok(ModelTurn {
                text: "Digging further.".to_string(),
                requests: vec![ToolRequest::new("get_sales_summary")],
            })
        }
    }

    #[tokio::test]
    async fn the_turn_bound_cuts_runaway_loops_short() {
        let (provider, runtime) = wire(Arc::new(InsatiableModel));
        let ctx = context_for(&provider, "analyst@example.com").await;

        let handle = runtime
            .invoke("loop forever", ctx, CancellationToken::new())
            .await
            .unwrap();
        let events = drain(handle).await;

        let tool_calls = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ToolStarted { .. }))
            .count();
        assert_eq!(tool_calls, 10);
        assert!(matches!(events.last(), Some(StreamEvent::Completed(_))));
    }
}
