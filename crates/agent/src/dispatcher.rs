//! Tool dispatcher: runs model-requested tool calls.
//!
//! Resolves each call against the registry, normalizes its arguments for
//! the tool's calling convention, runs it under a timeout, and turns every
//! failure into a textual [`ToolResult`]. Nothing a tool does can abort the
//! orchestration loop.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Value, json};
use toolchat_core::error::ToolError;
use toolchat_core::message::ToolCall;
use toolchat_core::tool::{ArgumentStyle, ToolRegistry, ToolResult};
use tracing::{info, warn};

pub struct Dispatcher {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: Duration::from_secs(30),
        }
    }

    /// Per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run one call. Always produces a result answering `call.id`.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        info!(tool = %call.name, call_id = %call.id, arguments = %call.arguments, "Tool call");

        let result = self.execute(call).await.unwrap_or_else(|e| {
            warn!(tool = %call.name, error = %e, "Tool call failed");
            ToolResult::failure(failure_text(&call.name, &e))
        });
        result.for_call(&call.id, &call.name)
    }

    /// Run a round of calls concurrently. Results come back in request order.
    pub async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.dispatch(call))).await
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let Some(tool) = self.tools.resolve(&call.name) else {
            return Ok(ToolResult::failure(format!(
                "Unknown tool: {}. Available tools: [{}]",
                call.name,
                self.tools.names().join(", ")
            )));
        };

        let arguments = normalize_arguments(tool.argument_style(), &call.arguments)?;

        match tokio::time::timeout(self.timeout, tool.execute(arguments)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }
}

/// The text the model sees when a tool faults.
pub fn failure_text(tool_name: &str, error: &ToolError) -> String {
    format!("Tool '{tool_name}' failed: {}: {error}", error.category())
}

/// Shape raw model arguments for a tool's calling convention.
///
/// Free-text tools get `{"query": text}`, taken from `query`, then `input`,
/// then the only value supplied. Structured tools get the mapping unchanged.
pub fn normalize_arguments(style: ArgumentStyle, raw: &Value) -> Result<Value, ToolError> {
    match style {
        ArgumentStyle::Structured => Ok(raw.clone()),
        ArgumentStyle::FreeText => free_text(raw)
            .map(|text| json!({ "query": text }))
            .ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "no usable query in {raw}; expected 'query', 'input', or a single value"
                ))
            }),
    }
}

fn free_text(raw: &Value) -> Option<String> {
    match raw {
        Value::Object(map) => {
            let keyed = ["query", "input"]
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(as_text);
            keyed.or_else(|| match map.len() {
                1 => map.values().next().and_then(as_text),
                _ => None,
            })
        }
        other => as_text(other),
    }
}

fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
