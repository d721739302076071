//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the model reach outside the conversation:
//! search the web, look things up in an encyclopedia, do arithmetic,
//! fetch a stock quote.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The tool that produced it
    pub tool_name: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content, always text (structured results are serialized)
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result with structured data, serialized as the output text.
    pub fn structured(data: serde_json::Value) -> Self {
        Self {
            call_id: String::new(),
            tool_name: String::new(),
            success: true,
            output: data.to_string(),
            data: Some(data),
        }
    }

    /// A failed result carrying an error object (e.g. `{"error": "..."}`).
    pub fn structured_failure(data: serde_json::Value) -> Self {
        Self {
            success: false,
            ..Self::structured(data)
        }
    }

    /// A successful plain-text result.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            tool_name: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    /// A failed result the model should see, not a fault.
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            tool_name: String::new(),
            success: false,
            output: output.into(),
            data: None,
        }
    }

    /// Stamp the call this result answers.
    pub fn for_call(mut self, call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self.tool_name = tool_name.into();
        self
    }
}

/// How a tool expects its arguments to arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentStyle {
    /// A single free-text input. The dispatcher normalizes whatever key the
    /// model used (`query`, `input`, or a sole value) into `{"query": text}`.
    FreeText,
    /// A named argument set, passed through unchanged.
    Structured,
}

/// The core Tool trait.
///
/// Each built-in tool implements this trait and is registered in the
/// [`ToolRegistry`], which advertises its schema to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Calling convention for this tool's arguments.
    fn argument_style(&self) -> ArgumentStyle {
        ArgumentStyle::Structured
    }

    /// Execute the tool with the given arguments.
    ///
    /// Expected failures (bad input, remote errors) should come back as
    /// `Ok(ToolResult::failure(..))`; `Err` is for faults the dispatcher
    /// has to absorb.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, keyed by unique name.
///
/// Read-mostly after startup; share it behind an `Arc`.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All tool definitions, ordered by name (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
