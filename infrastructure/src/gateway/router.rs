//! Tool gateway router — the trust boundary.
//!
//! Every inbound [`ToolCall`] arrives bundled with the forwarded
//! [`PropagationContext`]. The router independently verifies the bearer
//! token, resolves the tool against the static registry, authorizes the
//! *verified* role (never the caller-declared one), and forwards the
//! token-stripped call to the dispatcher.
//!
//! Requests walk the phase machine `received → validated → authorized →
//! dispatched → completed|rejected`; validation and authorization can
//! never be skipped.

use crate::executor::dispatcher::QueryDispatcher;
use sightline_application::ports::token_verifier::TokenVerifierPort;
use sightline_domain::{
    PropagationContext, QueryRegistry, RequestPhase, RequestTrace, Role, ToolCall, ToolError,
    ToolResult,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors raised at the gateway hop, before dispatch.
#[derive(Error, Debug)]
pub enum RouteError {
    /// The bearer token failed independent verification, or its claims
    /// contradict the propagated context.
    #[error("access token rejected: {0}")]
    TokenRejected(String),

    /// The tool name is not in the closed registry.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// Valid identity, insufficient role. Never retried; reported
    /// verbatim to the user as a permission message.
    #[error("role '{role}' is not permitted to call '{tool}'")]
    Forbidden { tool: String, role: Role },
}

impl RouteError {
    /// Convert into an error [`ToolResult`] so the failure can flow back
    /// through the agent and be explained conversationally.
    pub fn into_tool_result(self, tool_name: &str) -> ToolResult {
        let error = match &self {
            RouteError::TokenRejected(msg) => ToolError::token_rejected(msg.clone()),
            RouteError::UnknownTool(name) => ToolError::unknown_tool(name.clone()),
            RouteError::Forbidden { .. } => ToolError::unauthorized(self.to_string()),
        };
        ToolResult::failure(tool_name, error, 0)
    }
}

/// Routes validated, authorized tool calls to the dispatcher.
pub struct ToolGatewayRouter {
    verifier: Arc<dyn TokenVerifierPort>,
    registry: Arc<QueryRegistry>,
    dispatcher: Arc<QueryDispatcher>,
}

impl ToolGatewayRouter {
    pub fn new(
        verifier: Arc<dyn TokenVerifierPort>,
        registry: Arc<QueryRegistry>,
        dispatcher: Arc<QueryDispatcher>,
    ) -> Self {
        Self {
            verifier,
            registry,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &Arc<QueryRegistry> {
        &self.registry
    }

    /// Validate, authorize, and dispatch one tool call.
    pub async fn route(
        &self,
        call: ToolCall,
        context: &PropagationContext,
    ) -> Result<ToolResult, RouteError> {
        let mut trace = RequestTrace::new(context.request_id.clone());

        // 1. Independent token verification. The caller-declared role is
        //    a claim; the verified identity is the authority.
        let identity = match self.verifier.verify(&context.access_token).await {
            Ok(identity) => identity,
            Err(e) => {
                self.step(&mut trace, RequestPhase::Rejected);
                return Err(RouteError::TokenRejected(e.to_string()));
            }
        };
        if identity.role != context.role || identity.user_id != context.user_id {
            self.step(&mut trace, RequestPhase::Rejected);
            return Err(RouteError::TokenRejected(
                "context claims do not match the verified token".to_string(),
            ));
        }
        if call.requesting_role != identity.role {
            warn!(
                request_id = trace.request_id(),
                claimed = %call.requesting_role,
                verified = %identity.role,
                "tool call role claim ignored in favor of verified role"
            );
        }
        self.step(&mut trace, RequestPhase::Validated);

        // 2. Registry lookup: the tool set is closed.
        let Some(definition) = self.registry.get(&call.tool_name) else {
            self.step(&mut trace, RequestPhase::Rejected);
            return Err(RouteError::UnknownTool(call.tool_name));
        };

        // 3. Role authorization, evaluated per call. Parameter-level
        //    restrictions fail explicitly instead of silently narrowing.
        if !definition.permits(&identity.role) {
            self.step(&mut trace, RequestPhase::Rejected);
            return Err(RouteError::Forbidden {
                tool: call.tool_name,
                role: identity.role,
            });
        }
        for param in &definition.parameters {
            if let Some(required_role) = &param.restricted_to {
                if call.arguments.contains_key(&param.name) && identity.role != *required_role {
                    self.step(&mut trace, RequestPhase::Rejected);
                    return Err(RouteError::Forbidden {
                        tool: format!("{} (argument '{}')", call.tool_name, param.name),
                        role: identity.role,
                    });
                }
            }
        }
        self.step(&mut trace, RequestPhase::Authorized);

        // 4. Forward the token-stripped call: the dispatcher sees only the
        //    tool name and its arguments.
        self.step(&mut trace, RequestPhase::Dispatched);
        let result = self.dispatcher.execute(&call.tool_name, &call.arguments).await;
        self.step(
            &mut trace,
            if result.is_ok() {
                RequestPhase::Completed
            } else {
                RequestPhase::Rejected
            },
        );
        Ok(result)
    }

    fn step(&self, trace: &mut RequestTrace, next: RequestPhase) {
        match trace.advance(next) {
            Ok(()) => debug!(
                request_id = trace.request_id(),
                phase = next.as_str(),
                "gateway request phase"
            ),
            // A violation here is a gateway bug, not a caller error.
            Err(e) => error!(error = %e, "request phase violation"),
        }
    }
}
