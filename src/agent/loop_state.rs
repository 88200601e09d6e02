//! Agent loop state management
//!
//! Per-task counters and the working notes the model builds up: the
//! iteration count, an action log, saved findings and the tool error count.

use serde::{Deserialize, Serialize};

/// Findings kept for the final report
const MAX_FINDINGS: usize = 10;
/// Action log entries shown in the summary
const SUMMARY_ACTIONS: usize = 5;

/// State of the tool-calling loop for one task
#[derive(Debug, Clone)]
pub struct LoopState {
    /// Model round-trips so far
    pub iteration: usize,
    /// Hard cap on round-trips
    pub max_iterations: usize,
    /// Every dispatched action, in order
    pub actions: Vec<ActionRecord>,
    /// Saved findings, newest last
    pub findings: Vec<String>,
    /// Failed tool results (diagnostic only)
    pub error_count: usize,
}

/// One dispatched action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub tool: String,
    pub success: bool,
    pub summary: String,
}

impl LoopState {
    /// Create a new loop state with the given iteration cap
    pub fn new(max_iterations: usize) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            actions: Vec::new(),
            findings: Vec::new(),
            error_count: 0,
        }
    }

    /// Whether the iteration budget has room for another round-trip
    pub fn has_budget(&self) -> bool {
        self.iteration < self.max_iterations
    }

    /// Increment the iteration counter
    pub fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn record_action(&mut self, tool: &str, success: bool, summary: impl Into<String>) {
        if !success {
            self.error_count += 1;
        }
        self.actions.push(ActionRecord {
            tool: tool.to_string(),
            success,
            summary: summary.into(),
        });
    }

    /// Save a finding, keeping only the most recent ones
    pub fn add_finding(&mut self, finding: impl Into<String>) {
        self.findings.push(finding.into());
        if self.findings.len() > MAX_FINDINGS {
            let excess = self.findings.len() - MAX_FINDINGS;
            self.findings.drain(..excess);
        }
    }

    /// Short text summary of progress so far
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Iteration {}/{}, {} actions, {} errors",
            self.iteration,
            self.max_iterations,
            self.actions.len(),
            self.error_count
        );
        if !self.findings.is_empty() {
            out.push_str("\nFindings:");
            for finding in &self.findings {
                out.push_str("\n- ");
                out.push_str(finding);
            }
        }
        let recent = self.actions.len().saturating_sub(SUMMARY_ACTIONS);
        if recent < self.actions.len() {
            out.push_str("\nRecent actions:");
            for action in &self.actions[recent..] {
                let mark = if action.success { "ok" } else { "failed" };
                out.push_str(&format!("\n- {} ({}): {}", action.tool, mark, action.summary));
            }
        }
        out
    }
}
