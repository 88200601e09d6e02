//! Tool schema - the closed set of actions the model may call
//!
//! Each [`ToolKind`] owns one schema entry, and [`ToolInvocation`] is the
//! validated parameter record for it. Adding a tool means adding one variant
//! to each plus its definition below.

use std::fmt;
use std::str::FromStr;

use serde_json::json;
use url::Url;

use crate::core::{ToolCall, ToolDefinition};

/// Every tool the model can call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Navigate,
    Click,
    TypeText,
    Fill,
    PressKey,
    Scroll,
    GetPageContent,
    GoBack,
    Wait,
    Hover,
    AskUser,
    RequestConfirmation,
    SaveFinding,
    ReportResult,
}

impl ToolKind {
    pub const ALL: [ToolKind; 14] = [
        ToolKind::Navigate,
        ToolKind::Click,
        ToolKind::TypeText,
        ToolKind::Fill,
        ToolKind::PressKey,
        ToolKind::Scroll,
        ToolKind::GetPageContent,
        ToolKind::GoBack,
        ToolKind::Wait,
        ToolKind::Hover,
        ToolKind::AskUser,
        ToolKind::RequestConfirmation,
        ToolKind::SaveFinding,
        ToolKind::ReportResult,
    ];

    /// Wire name of the tool
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Navigate => "navigate",
            ToolKind::Click => "click",
            ToolKind::TypeText => "type_text",
            ToolKind::Fill => "fill",
            ToolKind::PressKey => "press_key",
            ToolKind::Scroll => "scroll",
            ToolKind::GetPageContent => "get_page_content",
            ToolKind::GoBack => "go_back",
            ToolKind::Wait => "wait",
            ToolKind::Hover => "hover",
            ToolKind::AskUser => "ask_user",
            ToolKind::RequestConfirmation => "request_confirmation",
            ToolKind::SaveFinding => "save_finding",
            ToolKind::ReportResult => "report_result",
        }
    }

    /// Whether calling this tool ends the task
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolKind::ReportResult)
    }

    /// Model-facing definition
    pub fn definition(&self) -> ToolDefinition {
        let (description, parameters) = match self {
            ToolKind::Navigate => (
                "Navigate to a URL in the browser",
                object(json!({"url": string("URL to navigate to")}), &["url"]),
            ),
            ToolKind::Click => (
                "Click an element. Prefer the [id] shown by get_page_content, e.g. \"[12]\"; CSS selectors and text=... also work",
                object(json!({"selector": string("Element [id], CSS selector or text=...")}), &["selector"]),
            ),
            ToolKind::TypeText => (
                "Type text into a field",
                object(
                    json!({"selector": string("Element [id] or CSS selector"), "text": string("Text to type")}),
                    &["selector", "text"],
                ),
            ),
            ToolKind::Fill => (
                "Fill a field, replacing its value (faster than type_text)",
                object(
                    json!({"selector": string("Element [id] or CSS selector"), "text": string("Value to fill")}),
                    &["selector", "text"],
                ),
            ),
            ToolKind::PressKey => (
                "Press a keyboard key",
                object(json!({"key": string("Key name, e.g. Enter, Tab, Escape")}), &["key"]),
            ),
            ToolKind::Scroll => (
                "Scroll the page",
                object(
                    json!({"direction": {
                        "type": "string",
                        "enum": ["up", "down", "top", "bottom"]
                    }}),
                    &["direction"],
                ),
            ),
            ToolKind::GetPageContent => (
                "Get the current page URL, scroll offset and elements with [id] handles. Use this first, and again after the page changes: ids are only valid for the latest snapshot",
                object(json!({}), &[]),
            ),
            ToolKind::GoBack => ("Go back in browser history", object(json!({}), &[])),
            ToolKind::Wait => (
                "Wait for the page to settle",
                object(json!({"seconds": {"type": "number", "description": "Seconds to wait"}}), &["seconds"]),
            ),
            ToolKind::Hover => (
                "Hover over an element",
                object(json!({"selector": string("Element [id] or CSS selector")}), &["selector"]),
            ),
            ToolKind::AskUser => (
                "Ask the user for information only they can provide",
                object(json!({"question": string("Question for the user")}), &["question"]),
            ),
            ToolKind::RequestConfirmation => (
                "Ask the user to confirm a destructive or irreversible action before doing it",
                object(
                    json!({"action_description": string("What is about to happen")}),
                    &["action_description"],
                ),
            ),
            ToolKind::SaveFinding => (
                "Save an important piece of information for the final report",
                object(json!({"finding": string("The information to keep")}), &["finding"]),
            ),
            ToolKind::ReportResult => (
                "Report the final result and finish the task",
                object(
                    json!({
                        "result": string("Summary of what was achieved or why it failed"),
                        "success": {"type": "boolean", "description": "Whether the task succeeded"}
                    }),
                    &["result", "success"],
                ),
            ),
        };
        ToolDefinition::function(self.as_str(), description, parameters)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown tool: {}", s))
    }
}

fn string(description: &str) -> serde_json::Value {
    json!({"type": "string", "description": description})
}

fn object(properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Definitions for the whole schema, in declaration order
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolKind::ALL.iter().map(ToolKind::definition).collect()
}

/// Scroll directions accepted by `scroll`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Top => "top",
            ScrollDirection::Bottom => "bottom",
        }
    }
}

impl FromStr for ScrollDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            other => Err(format!(
                "Invalid scroll direction '{}': expected up, down, top or bottom",
                other
            )),
        }
    }
}

/// A tool call with validated, defaulted arguments
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    Navigate { url: String },
    Click { selector: String },
    TypeText { selector: String, text: String },
    Fill { selector: String, text: String },
    PressKey { key: String },
    Scroll { direction: ScrollDirection },
    GetPageContent,
    GoBack,
    Wait { seconds: f64 },
    Hover { selector: String },
    AskUser { question: String },
    RequestConfirmation { action_description: String },
    SaveFinding { finding: String },
    ReportResult { result: String, success: bool },
}

/// Limits applied while validating arguments
#[derive(Debug, Clone, Copy)]
pub struct ArgLimits {
    pub max_wait_secs: f64,
}

impl Default for ArgLimits {
    fn default() -> Self {
        Self { max_wait_secs: 5.0 }
    }
}

impl ToolInvocation {
    /// Validate `call` against the schema entry for `kind`.
    ///
    /// Arguments with a sensible default (`key`, `seconds`, `direction`,
    /// report `success`) are filled in; other missing arguments are errors.
    pub fn parse(kind: ToolKind, call: &ToolCall, limits: ArgLimits) -> Result<Self, String> {
        let required = |key: &str| -> Result<String, String> {
            call.get_string(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| format!("Missing required argument '{}' for {}", key, kind))
        };

        let invocation = match kind {
            ToolKind::Navigate => ToolInvocation::Navigate {
                url: normalize_url(&required("url")?)?,
            },
            ToolKind::Click => ToolInvocation::Click {
                selector: required("selector")?,
            },
            ToolKind::TypeText => ToolInvocation::TypeText {
                selector: required("selector")?,
                text: call.get_string("text").unwrap_or_default(),
            },
            ToolKind::Fill => ToolInvocation::Fill {
                selector: required("selector")?,
                text: call.get_string("text").unwrap_or_default(),
            },
            ToolKind::PressKey => ToolInvocation::PressKey {
                key: call
                    .get_string("key")
                    .filter(|k| !k.trim().is_empty())
                    .unwrap_or_else(|| "Enter".to_string()),
            },
            ToolKind::Scroll => ToolInvocation::Scroll {
                direction: match call.get_string("direction") {
                    Some(d) => d.parse()?,
                    None => ScrollDirection::Down,
                },
            },
            ToolKind::GetPageContent => ToolInvocation::GetPageContent,
            ToolKind::GoBack => ToolInvocation::GoBack,
            ToolKind::Wait => {
                let seconds = call
                    .get_f64("seconds")
                    .filter(|s| s.is_finite())
                    .unwrap_or(1.0);
                ToolInvocation::Wait {
                    seconds: seconds.clamp(0.0, limits.max_wait_secs),
                }
            }
            ToolKind::Hover => ToolInvocation::Hover {
                selector: required("selector")?,
            },
            ToolKind::AskUser => ToolInvocation::AskUser {
                question: required("question")?,
            },
            ToolKind::RequestConfirmation => ToolInvocation::RequestConfirmation {
                action_description: required("action_description")?,
            },
            ToolKind::SaveFinding => ToolInvocation::SaveFinding {
                finding: required("finding")?,
            },
            ToolKind::ReportResult => ToolInvocation::ReportResult {
                result: call.get_string("result").unwrap_or_default(),
                success: call.get_bool("success").unwrap_or(true),
            },
        };
        Ok(invocation)
    }
}

/// Prepend `https://` when the model omits the scheme
pub fn normalize_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!("https://{}", trimmed)
    };
    Url::parse(&candidate)
        .map(|u| u.to_string())
        .map_err(|e| format!("Invalid URL '{}': {}", raw, e))
}
