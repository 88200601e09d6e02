//! Agent orchestrator
//!
//! Drives one task at a time: ask the model for the next turn, dispatch its
//! tool calls one by one, fold the results back into the history, repeat.
//! The loop ends through exactly one of: `report_result`, the iteration cap,
//! an external stop, or an unrecoverable browser or provider failure.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::control::{Checkpoint, ControlHandle, ExecutionState};
use crate::agent::conversation::History;
use crate::agent::log::{LogKind, LogSink, TracingSink};
use crate::agent::loop_state::LoopState;
use crate::core::config::{AgentConfig, Config};
use crate::core::{ProviderError, ToolCall, ToolResult};
use crate::llm::{GenerateOptions, ProviderAdapter};
use crate::tools::{ToolDispatcher, ToolKind};

/// Built-in instructions for the model
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a browser automation agent. You act only through the provided tools.
RULES:
1. Call get_page_content to see the page. Element ids such as [12] belong to the latest snapshot only; observe again after the page changes.
2. Target elements by their [id]. Use text=... or CSS selectors only when no id fits.
3. If an element is missing, scroll and observe again.
4. Call request_confirmation before any purchase, deletion or message send.
5. Keep important facts with save_finding.
6. Call report_result when the task is done or cannot be done.";

/// User turn sent when the model answers without calling a tool
const NUDGE: &str = "Proceed.";

/// How a task ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    /// Text passed to `report_result`
    pub result: Option<String>,
    /// Why the task did not complete
    pub error: Option<String>,
    pub state: ExecutionState,
    pub iterations: usize,
    pub findings: Vec<String>,
}

/// Why the loop stopped
enum Verdict {
    Reported { success: bool, result: String },
    Stopped,
    BudgetExhausted,
    BrowserUnavailable,
    ProviderFailed(ProviderError),
}

/// Main agent that orchestrates the model and the browser tools
pub struct Agent {
    config: AgentConfig,
    adapter: ProviderAdapter,
    tools: ToolDispatcher,
    sink: Arc<dyn LogSink>,
    control: ControlHandle,
    system_prompt: String,
    options: GenerateOptions,
}

impl Agent {
    pub fn new(config: &Config, adapter: ProviderAdapter, tools: ToolDispatcher) -> Self {
        let system_prompt = config
            .agent
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Self {
            options: GenerateOptions {
                temperature: config.agent.temperature,
                max_output_tokens: config.agent.max_output_tokens,
            },
            config: config.agent.clone(),
            adapter,
            tools,
            sink: Arc::new(TracingSink),
            control: ControlHandle::new(),
            system_prompt,
        }
    }

    /// Send activity to `sink` instead of `tracing`
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Handle for pause/resume/stop from another task
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn adapter(&self) -> &ProviderAdapter {
        &self.adapter
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run `task` to completion. Never fails: every ending is a `TaskOutcome`.
    pub async fn execute_task(&mut self, task: &str) -> TaskOutcome {
        let task = task.trim();
        if task.is_empty() {
            return TaskOutcome {
                success: false,
                result: None,
                error: Some("Task is empty".to_string()),
                state: ExecutionState::Failed,
                iterations: 0,
                findings: Vec::new(),
            };
        }

        self.control.start();
        info!(task, provider = self.adapter.active_name(), "starting task");
        self.emit(LogKind::System, format!("Starting task: {}", task))
            .await;

        let mut history = History::new(format!(
            "Task: {}\nStart by calling get_page_content to observe the current page.",
            task
        ));
        let mut state = LoopState::new(self.config.max_iterations);

        let verdict = self.run_loop(&mut history, &mut state).await;
        self.conclude(verdict, state).await
    }

    async fn run_loop(&mut self, history: &mut History, state: &mut LoopState) -> Verdict {
        loop {
            if self.control.checkpoint().await == Checkpoint::Stop {
                return Verdict::Stopped;
            }
            if !state.has_budget() {
                return Verdict::BudgetExhausted;
            }
            state.next_iteration();
            debug!(iteration = state.iteration, "requesting model turn");

            let turn = match self
                .adapter
                .generate(
                    history,
                    self.tools.definitions(),
                    &self.system_prompt,
                    &self.options,
                )
                .await
            {
                Ok(turn) => turn,
                Err(e) if is_unrecoverable(&e) => return Verdict::ProviderFailed(e),
                Err(e) => {
                    self.emit(
                        LogKind::Error,
                        format!("Model request failed: {}. Retrying.", e),
                    )
                    .await;
                    tokio::time::sleep(Duration::from_millis(self.config.provider_error_delay_ms))
                        .await;
                    continue;
                }
            };

            let text = turn.text.filter(|t| !t.trim().is_empty());
            if let Some(thought) = &text {
                self.emit(LogKind::Thought, thought.clone()).await;
            }

            if turn.tool_calls.is_empty() {
                if text.is_some() {
                    history.add_assistant(text, Vec::new());
                }
                history.add_user(NUDGE);
                continue;
            }

            let calls = turn.tool_calls;
            history.add_assistant(text, calls.clone());

            let verdict = self.dispatch_all(&calls, history, state).await;
            debug_assert!(history.open_calls().is_empty(), "unanswered tool calls");
            if let Some(verdict) = verdict {
                return verdict;
            }
        }
    }

    /// Dispatch `calls` in order. Every call gets exactly one result turn,
    /// synthesized when the loop has to end before it runs.
    async fn dispatch_all(
        &mut self,
        calls: &[ToolCall],
        history: &mut History,
        state: &mut LoopState,
    ) -> Option<Verdict> {
        for (index, call) in calls.iter().enumerate() {
            let remaining = &calls[index..];

            if self.control.checkpoint().await == Checkpoint::Stop {
                close_calls(history, remaining, "Task stopped before this action ran");
                return Some(Verdict::Stopped);
            }
            if !self.tools.page_alive().await {
                warn!(tool = %call.name, "browser page is gone");
                close_calls(history, remaining, "Browser is no longer available");
                return Some(Verdict::BrowserUnavailable);
            }

            self.emit(
                LogKind::Tool,
                format!("{}: {}", call.name, call.arguments),
            )
            .await;

            let result = self.tools.dispatch(call).await;
            let mark = if result.success { "✓" } else { "✗" };
            self.emit(LogKind::Result, format!("{} {}", mark, result.summary()))
                .await;
            state.record_action(&call.name, result.success, result.summary());

            let kind = self.tools.kind_of(&call.name);
            if kind == Some(ToolKind::SaveFinding) && result.success {
                if let Some(finding) = result.get_str("saved") {
                    state.add_finding(finding);
                }
            }
            if kind.is_some_and(|k| k.is_terminal()) {
                if let Some(reported) = result.get_str("result").map(str::to_string) {
                    let verdict = Verdict::Reported {
                        success: result.success,
                        result: reported,
                    };
                    history.add_result(call, result);
                    close_calls(
                        history,
                        &remaining[1..],
                        "Skipped: the task was already reported",
                    );
                    return Some(verdict);
                }
            }

            history.add_result(call, result);
        }
        None
    }

    async fn conclude(&mut self, verdict: Verdict, state: LoopState) -> TaskOutcome {
        let (success, result, error, end_state) = match verdict {
            Verdict::Reported { success, result } => {
                if success {
                    self.emit(LogKind::Success, format!("Done: {}", result)).await;
                } else {
                    self.emit(LogKind::Error, format!("Failed: {}", result)).await;
                }
                (success, Some(result), None, ExecutionState::Done)
            }
            Verdict::Stopped => (
                false,
                None,
                Some("Stopped by user".to_string()),
                ExecutionState::Stopped,
            ),
            Verdict::BudgetExhausted => (
                false,
                None,
                Some(format!(
                    "Iteration budget exhausted after {} model turns",
                    state.iteration
                )),
                ExecutionState::Failed,
            ),
            Verdict::BrowserUnavailable => (
                false,
                None,
                Some("Browser is no longer available".to_string()),
                ExecutionState::Failed,
            ),
            Verdict::ProviderFailed(e) => (
                false,
                None,
                Some(format!("Model provider failed: {}", e)),
                ExecutionState::Failed,
            ),
        };

        if let Some(reason) = &error {
            self.emit(LogKind::Error, reason.clone()).await;
        }
        let final_state = self.control.finish(end_state);
        info!(
            state = %final_state,
            iterations = state.iteration,
            errors = state.error_count,
            "task finished"
        );
        debug!(summary = %state.summary(), "task context");
        self.emit(LogKind::System, format!("Agent {}", final_state))
            .await;

        TaskOutcome {
            success: success && final_state == ExecutionState::Done,
            result,
            error,
            state: final_state,
            iterations: state.iteration,
            findings: state.findings,
        }
    }

    /// Best-effort activity log
    async fn emit(&self, kind: LogKind, message: impl Into<String>) {
        let message = message.into();
        if let Err(e) = self.sink.log(kind, &message).await {
            debug!(error = %e, kind = %kind, "activity log dropped");
        }
    }
}

/// Errors no amount of waiting will fix
fn is_unrecoverable(error: &ProviderError) -> bool {
    matches!(
        error,
        ProviderError::Auth(_) | ProviderError::InvalidRequest(_) | ProviderError::NotConfigured(_)
    )
}

fn close_calls(history: &mut History, calls: &[ToolCall], reason: &str) {
    for call in calls {
        history.add_result(call, ToolResult::failure(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_classification() {
        assert!(is_unrecoverable(&ProviderError::Auth("bad key".into())));
        assert!(is_unrecoverable(&ProviderError::InvalidRequest("schema".into())));
        assert!(!is_unrecoverable(&ProviderError::from_status(503, "", None)));
        assert!(!is_unrecoverable(&ProviderError::Decode("garbled".into())));
    }

    #[test]
    fn test_close_calls_pairs_every_call() {
        let calls = vec![
            ToolCall::new("tc-1", "click", serde_json::json!({"selector": "[1]"})),
            ToolCall::new("tc-2", "go_back", serde_json::json!({})),
        ];
        let mut history = History::new("Task");
        history.add_assistant(None, calls.clone());
        close_calls(&mut history, &calls, "stopped");
        assert!(history.open_calls().is_empty());
        assert_eq!(history.len(), 4);
    }
}
