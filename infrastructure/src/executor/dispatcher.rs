//! Query dispatcher — the backend executor.
//!
//! Receives token-stripped calls from the gateway router, validates the
//! arguments against the registered schema, binds them into the final
//! statement, and runs it against the data engine under a timeout. Any
//! failure becomes an error [`ToolResult`]; nothing at this hop panics or
//! escapes as an exception, so a failed query reads back to the user as a
//! conversational explanation.

use sightline_application::ports::data_engine::{DataEnginePort, EngineError};
use sightline_domain::{QueryPayload, QueryRegistry, ToolError, ToolResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Execution limits applied to every dispatched query.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Wall-clock bound per engine attempt.
    pub query_timeout: Duration,
    /// Row cap passed to the engine.
    pub max_rows: usize,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(60),
            max_rows: 100,
        }
    }
}

/// Executes registered queries against the data engine.
pub struct QueryDispatcher {
    engine: Arc<dyn DataEnginePort>,
    registry: Arc<QueryRegistry>,
    policy: DispatchPolicy,
}

impl QueryDispatcher {
    pub fn new(
        engine: Arc<dyn DataEnginePort>,
        registry: Arc<QueryRegistry>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            engine,
            registry,
            policy,
        }
    }

    /// Execute one registered query. Always returns a [`ToolResult`].
    pub async fn execute(
        &self,
        tool_name: &str,
        arguments: &HashMap<String, serde_json::Value>,
    ) -> ToolResult {
        let started = Instant::now();

        // The router already resolved the name; a miss here means the
        // two components were wired with different registries.
        let Some(definition) = self.registry.get(tool_name) else {
            return ToolResult::failure(
                tool_name,
                ToolError::unknown_tool(tool_name),
                elapsed_ms(started),
            );
        };

        if let Err(reason) = definition.check_arguments(arguments) {
            return ToolResult::failure(
                tool_name,
                ToolError::invalid_argument(reason),
                elapsed_ms(started),
            );
        }

        let statement = match definition.bind(arguments) {
            Ok(statement) => statement,
            Err(reason) => {
                return ToolResult::failure(
                    tool_name,
                    ToolError::invalid_argument(reason),
                    elapsed_ms(started),
                );
            }
        };
        debug!(tool = tool_name, %statement, "dispatching bound query");

        // One bounded retry on transient engine failures.
        let mut attempt = 0u8;
        loop {
            attempt += 1;
            let error = match timeout(
                self.policy.query_timeout,
                self.engine.execute(&statement, self.policy.max_rows),
            )
            .await
            {
                Ok(Ok(output)) => {
                    let payload = QueryPayload::new(output.columns, output.rows);
                    return ToolResult::ok(tool_name, payload, elapsed_ms(started));
                }
                Ok(Err(e)) => e,
                Err(_) => EngineError::Timeout,
            };

            if error.is_transient() && attempt == 1 {
                warn!(tool = tool_name, error = %error, "engine attempt failed, retrying once");
                continue;
            }

            let tool_error = match &error {
                EngineError::Timeout => ToolError::engine_timeout(error.to_string()),
                _ => ToolError::engine_execution(error.to_string()),
            };
            return ToolResult::failure(tool_name, tool_error, elapsed_ms(started));
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
