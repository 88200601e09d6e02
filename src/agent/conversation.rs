//! Conversation history
//!
//! Append-only log of one task's turns. The first turn is always the task
//! itself. Trimming for a provider happens on a copy (see `sanitizer`); the
//! history here is never pruned in place.

use crate::core::{ToolCall, ToolResult, Turn};

/// Provider-neutral conversation for one task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// Start a history with the task-establishing user turn
    pub fn new(task_turn: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(task_turn)],
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Add a user message
    pub fn add_user(&mut self, text: impl Into<String>) {
        self.push(Turn::user(text));
    }

    /// Add a model turn
    pub fn add_assistant(&mut self, text: Option<String>, tool_calls: Vec<ToolCall>) {
        self.push(Turn::assistant(text, tool_calls));
    }

    /// Add the result for `call`
    pub fn add_result(&mut self, call: &ToolCall, result: ToolResult) {
        self.push(Turn::tool(call, result));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Ids of calls in the latest assistant turn that have no result yet
    pub fn open_calls(&self) -> Vec<&ToolCall> {
        let Some(pos) = self
            .turns
            .iter()
            .rposition(|t| matches!(t, Turn::Assistant { .. }))
        else {
            return Vec::new();
        };
        let answered: Vec<&str> = self.turns[pos + 1..]
            .iter()
            .filter_map(|t| match t {
                Turn::Tool { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();
        self.turns[pos]
            .tool_calls()
            .iter()
            .filter(|c| !answered.contains(&c.id.as_str()))
            .collect()
    }

    /// Get turn count
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
