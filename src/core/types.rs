//! Shared types used across webpilot modules
//!
//! Contains conversation turns, tool calls, tool results and tool definitions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    /// Text from the user (or a synthetic nudge)
    User { text: String },
    /// Model output: optional text plus the tool calls it requested, in order
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Outcome of exactly one tool call
    Tool {
        call_id: String,
        name: String,
        result: ToolResult,
    },
}

impl Turn {
    /// Create a user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    /// Create an assistant turn
    pub fn assistant(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant { text, tool_calls }
    }

    /// Create a tool result turn answering `call`
    pub fn tool(call: &ToolCall, result: ToolResult) -> Self {
        Self::Tool {
            call_id: call.id.clone(),
            name: call.name.clone(),
            result,
        }
    }

    /// Role label as used by most chat APIs
    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    /// Tool calls carried by this turn (empty unless assistant)
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}

/// A tool call made by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Session-unique identifier
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument by key.
    ///
    /// Numbers and booleans are rendered to strings, since some models send
    /// every argument as a string and others never do.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.arguments.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Get a boolean argument by key, accepting `"true"`/`"false"` strings
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.arguments.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Get a numeric argument by key, accepting numeric strings
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.arguments.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Definition of a tool that can be called by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Result of executing a tool.
///
/// Mirrors the `{success, ...}` objects browser capabilities return: any extra
/// fields (`url`, `content`, `error`, ...) live in `data` and are passed
/// through to the model unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the execution was successful
    pub success: bool,
    /// Payload fields
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ToolResult {
    /// A bare successful result
    pub fn ok() -> Self {
        Self {
            success: true,
            data: Map::new(),
        }
    }

    /// A failed result carrying an error message
    pub fn failure(error: impl Into<String>) -> Self {
        Self::ok().with_success(false).with("error", error.into())
    }

    /// Builder-style field setter
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Parse a `{success, ...}` JSON object; a missing `success` counts as failure
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) => {
                let success = map
                    .remove("success")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                Self { success, data: map }
            }
            other => Self::ok().with("result", other),
        }
    }

    /// Error message, if any
    pub fn error(&self) -> Option<&str> {
        self.data.get("error").and_then(Value::as_str)
    }

    /// Get a string field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// One-line human summary (used for the user-visible log)
    pub fn summary(&self) -> String {
        for key in ["result", "message", "error", "url"] {
            if let Some(v) = self.data.get(key) {
                return match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
        if let Some(content) = self.get_str("content") {
            return format!("{} chars of page content", content.chars().count());
        }
        "Done".to_string()
    }

    /// Full JSON object including `success`
    pub fn to_value(&self) -> Value {
        let mut map = self.data.clone();
        map.insert("success".to_string(), Value::Bool(self.success));
        Value::Object(map)
    }
}
