//! Human-in-the-loop tools
//!
//! `ask_user` and `request_confirmation` are answered by an [`Operator`].
//! Headless runs use [`Unattended`].

use async_trait::async_trait;

/// Whoever is watching the agent work
#[async_trait]
pub trait Operator: Send + Sync {
    /// Answer a question from the model; `None` when nobody can answer
    async fn ask(&self, question: &str) -> Option<String>;

    /// Approve or decline an irreversible action
    async fn confirm(&self, action_description: &str) -> bool;
}

/// No human attached: questions go unanswered and confirmations are granted
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

#[async_trait]
impl Operator for Unattended {
    async fn ask(&self, _question: &str) -> Option<String> {
        None
    }

    async fn confirm(&self, _action_description: &str) -> bool {
        true
    }
}

/// Fixed answers, for scripted runs
#[derive(Debug, Clone)]
pub struct ScriptedOperator {
    pub answer: Option<String>,
    pub approve: bool,
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn ask(&self, _question: &str) -> Option<String> {
        self.answer.clone()
    }

    async fn confirm(&self, _action_description: &str) -> bool {
        self.approve
    }
}
