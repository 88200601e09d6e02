//! Tool dispatcher - routes tool calls to browser capabilities
//!
//! Name lookup goes through a table built once from the schema. Every call
//! produces a `{success, ...}` result; nothing a tool does can abort the
//! loop from here.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::{ToolCall, ToolDefinition, ToolResult};
use crate::tools::browser::{BrowserDriver, SnapshotBuilder};
use crate::tools::interaction::Operator;
use crate::tools::schema::{tool_definitions, ArgLimits, ToolInvocation, ToolKind};

/// Routes validated tool calls to the driver and operator
pub struct ToolDispatcher {
    /// Schema entries indexed by wire name
    kinds: HashMap<String, ToolKind>,
    definitions: Vec<ToolDefinition>,
    driver: Arc<dyn BrowserDriver>,
    operator: Arc<dyn Operator>,
    snapshots: SnapshotBuilder,
    limits: ArgLimits,
}

impl ToolDispatcher {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        operator: Arc<dyn Operator>,
        snapshots: SnapshotBuilder,
        limits: ArgLimits,
    ) -> Self {
        let kinds = ToolKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), *kind))
            .collect();
        Self {
            kinds,
            definitions: tool_definitions(),
            driver,
            operator,
            snapshots,
            limits,
        }
    }

    /// Dispatcher with snapshot budgets and argument limits from `config`
    pub fn from_config(
        driver: Arc<dyn BrowserDriver>,
        operator: Arc<dyn Operator>,
        config: &Config,
    ) -> Self {
        Self::new(
            driver,
            operator,
            SnapshotBuilder::new(config.snapshot.clone()),
            ArgLimits {
                max_wait_secs: config.browser.max_wait_secs,
            },
        )
    }

    /// Tool definitions advertised to the model
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Schema entry for a wire name
    pub fn kind_of(&self, name: &str) -> Option<ToolKind> {
        self.kinds.get(name).copied()
    }

    /// Whether the browser page is still usable
    pub async fn page_alive(&self) -> bool {
        self.driver.is_alive().await
    }

    /// Execute one tool call
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(kind) = self.kind_of(&call.name) else {
            warn!(tool = %call.name, "unknown tool requested");
            return ToolResult::failure(format!("Unknown tool: {}", call.name));
        };

        let invocation = match ToolInvocation::parse(kind, call, self.limits) {
            Ok(invocation) => invocation,
            Err(message) => {
                debug!(tool = %kind, %message, "invalid arguments");
                return ToolResult::failure(message);
            }
        };

        debug!(tool = %kind, call_id = %call.id, "dispatching");
        self.run(invocation).await
    }

    async fn run(&self, invocation: ToolInvocation) -> ToolResult {
        let driver = &self.driver;
        let outcome = match invocation {
            ToolInvocation::Navigate { url } => driver.navigate(&url).await,
            ToolInvocation::Click { selector } => driver.click(&selector).await,
            ToolInvocation::TypeText { selector, text } => {
                driver.type_text(&selector, &text).await
            }
            ToolInvocation::Fill { selector, text } => driver.fill(&selector, &text).await,
            ToolInvocation::PressKey { key } => driver.press_key(&key).await,
            ToolInvocation::Scroll { direction } => driver.scroll(direction).await,
            ToolInvocation::GoBack => driver.go_back().await,
            ToolInvocation::Wait { seconds } => driver.wait(seconds).await,
            ToolInvocation::Hover { selector } => driver.hover(&selector).await,
            ToolInvocation::GetPageContent => return self.page_content().await,
            ToolInvocation::AskUser { question } => {
                return match self.operator.ask(&question).await {
                    Some(answer) => ToolResult::ok().with("answer", answer),
                    None => ToolResult::failure(
                        "No user is available to answer. Continue with your best judgement.",
                    ),
                };
            }
            ToolInvocation::RequestConfirmation { action_description } => {
                let approved = self.operator.confirm(&action_description).await;
                let message = if approved {
                    "User approved the action"
                } else {
                    "User declined. Do not perform this action."
                };
                return ToolResult::ok()
                    .with("confirmed", approved)
                    .with("message", message);
            }
            ToolInvocation::SaveFinding { finding } => {
                return ToolResult::ok().with("saved", finding);
            }
            ToolInvocation::ReportResult { result, success } => {
                let mut reported = ToolResult::ok().with("result", result);
                reported.success = success;
                return reported;
            }
        };

        outcome.unwrap_or_else(|e| ToolResult::failure(e.to_string()))
    }

    /// Capture, build and tag in one go so `[N]` ids match the text returned
    async fn page_content(&self) -> ToolResult {
        let page = match self.driver.capture_page().await {
            Ok(page) => page,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        let snapshot = self.snapshots.build(&page);
        if let Err(e) = self.driver.tag_elements(&snapshot.assignments()).await {
            warn!(error = %e, "could not tag snapshot elements");
            return ToolResult::failure(format!("Could not label page elements: {}", e));
        }
        debug!(
            elements = snapshot.elements.len(),
            truncated = snapshot.truncated,
            "page snapshot"
        );
        ToolResult::ok()
            .with("url", snapshot.url.clone())
            .with("content", snapshot.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PilotError, Result};
    use crate::tools::browser::snapshot::{DomNode, ElementTag, PageTree};
    use crate::tools::interaction::{ScriptedOperator, Unattended};
    use crate::tools::schema::ScrollDirection;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<String>>,
        tags: Mutex<Vec<ElementTag>>,
    }

    impl RecordingDriver {
        fn record(&self, entry: String) -> Result<ToolResult> {
            self.calls.lock().unwrap().push(entry);
            Ok(ToolResult::ok())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrowserDriver for RecordingDriver {
        async fn navigate(&self, url: &str) -> Result<ToolResult> {
            self.record(format!("navigate {}", url))
                .map(|r| r.with("url", url))
        }
        async fn click(&self, selector: &str) -> Result<ToolResult> {
            if selector == "[99]" {
                return Err(PilotError::browser("no element matches [99]"));
            }
            self.record(format!("click {}", selector))
        }
        async fn type_text(&self, selector: &str, text: &str) -> Result<ToolResult> {
            self.record(format!("type {} {}", selector, text))
        }
        async fn fill(&self, selector: &str, text: &str) -> Result<ToolResult> {
            self.record(format!("fill {} {}", selector, text))
        }
        async fn press_key(&self, key: &str) -> Result<ToolResult> {
            self.record(format!("press {}", key))
        }
        async fn scroll(&self, direction: ScrollDirection) -> Result<ToolResult> {
            self.record(format!("scroll {}", direction.as_str()))
        }
        async fn wait(&self, seconds: f64) -> Result<ToolResult> {
            self.record(format!("wait {}", seconds))
        }
        async fn go_back(&self) -> Result<ToolResult> {
            self.record("back".to_string())
        }
        async fn hover(&self, selector: &str) -> Result<ToolResult> {
            self.record(format!("hover {}", selector))
        }
        async fn capture_page(&self) -> Result<PageTree> {
            Ok(PageTree::new(
                "https://example.com/",
                DomNode::new("body")
                    .child(DomNode::new("h1").text("Example Domain"))
                    .child(DomNode::new("a").text("Login")),
            ))
        }
        async fn tag_elements(&self, tags: &[ElementTag]) -> Result<()> {
            *self.tags.lock().unwrap() = tags.to_vec();
            Ok(())
        }
        async fn is_alive(&self) -> bool {
            true
        }
    }

    fn dispatcher(driver: Arc<RecordingDriver>) -> ToolDispatcher {
        ToolDispatcher::new(
            driver,
            Arc::new(Unattended),
            SnapshotBuilder::default(),
            ArgLimits::default(),
        )
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall::new("tc-1", name, args)
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let driver = Arc::new(RecordingDriver::default());
        let result = dispatcher(driver.clone())
            .dispatch(&call("teleport", json!({})))
            .await;
        assert!(!result.success);
        assert_eq!(result.error(), Some("Unknown tool: teleport"));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_defaults_reach_driver() {
        let driver = Arc::new(RecordingDriver::default());
        let d = dispatcher(driver.clone());
        assert!(d.dispatch(&call("press_key", json!({}))).await.success);
        assert!(d.dispatch(&call("scroll", json!({}))).await.success);
        assert!(d.dispatch(&call("wait", json!({"seconds": 60}))).await.success);
        assert!(d.dispatch(&call("navigate", json!({"url": "example.com"}))).await.success);
        assert_eq!(
            driver.calls(),
            vec![
                "press Enter",
                "scroll down",
                "wait 5",
                "navigate https://example.com/"
            ]
        );
    }

    #[tokio::test]
    async fn test_driver_error_becomes_failure() {
        let driver = Arc::new(RecordingDriver::default());
        let result = dispatcher(driver)
            .dispatch(&call("click", json!({"selector": "[99]"})))
            .await;
        assert!(!result.success);
        assert!(result.error().unwrap().contains("[99]"));
    }

    #[tokio::test]
    async fn test_missing_argument() {
        let driver = Arc::new(RecordingDriver::default());
        let result = dispatcher(driver.clone())
            .dispatch(&call("type_text", json!({"text": "hi"})))
            .await;
        assert!(!result.success);
        assert!(result.error().unwrap().contains("selector"));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_page_content_tags_ids() {
        let driver = Arc::new(RecordingDriver::default());
        let result = dispatcher(driver.clone())
            .dispatch(&call("get_page_content", json!({})))
            .await;
        assert!(result.success);
        let content = result.get_str("content").unwrap();
        assert!(content.contains("URL: https://example.com/"));
        assert!(content.contains("[1] <a> link \"Login\""));
        let tags = driver.tags.lock().unwrap().clone();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].stable_id, 1);
    }

    #[tokio::test]
    async fn test_report_and_findings() {
        let d = dispatcher(Arc::new(RecordingDriver::default()));
        let reported = d
            .dispatch(&call(
                "report_result",
                json!({"result": "Could not log in", "success": false}),
            ))
            .await;
        assert!(!reported.success);
        assert_eq!(reported.get_str("result"), Some("Could not log in"));

        let saved = d
            .dispatch(&call("save_finding", json!({"finding": "Price is $5"})))
            .await;
        assert_eq!(saved.get_str("saved"), Some("Price is $5"));
    }

    #[tokio::test]
    async fn test_operator_tools() {
        let d = dispatcher(Arc::new(RecordingDriver::default()));
        let asked = d
            .dispatch(&call("ask_user", json!({"question": "Which size?"})))
            .await;
        assert!(!asked.success);

        let confirmed = d
            .dispatch(&call(
                "request_confirmation",
                json!({"action_description": "Place order"}),
            ))
            .await;
        assert!(confirmed.success);
        assert_eq!(confirmed.data["confirmed"], json!(true));

        let scripted = ToolDispatcher::new(
            Arc::new(RecordingDriver::default()),
            Arc::new(ScriptedOperator {
                answer: Some("Large".to_string()),
                approve: false,
            }),
            SnapshotBuilder::default(),
            ArgLimits::default(),
        );
        let asked = scripted
            .dispatch(&call("ask_user", json!({"question": "Which size?"})))
            .await;
        assert_eq!(asked.get_str("answer"), Some("Large"));
    }

    #[test]
    fn test_definitions_match_kinds() {
        let d = dispatcher(Arc::new(RecordingDriver::default()));
        assert_eq!(d.definitions().len(), ToolKind::ALL.len());
        for def in d.definitions() {
            assert!(d.kind_of(&def.function.name).is_some());
        }
    }
}
