//! Execution state and the external control channel
//!
//! The state lives in a `tokio::sync::watch` channel. Front ends hold a
//! [`ControlHandle`] and request transitions; the orchestrator reads the
//! state cooperatively at its checkpoints and waits while paused.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Idle,
    Running,
    Paused,
    Stopped,
    Done,
    Failed,
}

impl ExecutionState {
    /// Whether a task has finished in this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Done | Self::Failed)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What the loop should do after a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Checkpoint {
    Continue,
    Stop,
}

/// Cloneable handle for pause/resume/stop
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Arc<watch::Sender<ExecutionState>>,
}

impl Default for ControlHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ExecutionState::Idle);
        Self { tx: Arc::new(tx) }
    }

    /// Current state
    pub fn state(&self) -> ExecutionState {
        *self.tx.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
        self.tx.subscribe()
    }

    /// Running → Paused. Returns whether the transition happened.
    pub fn pause(&self) -> bool {
        self.transition(|s| (s == ExecutionState::Running).then_some(ExecutionState::Paused))
    }

    /// Paused → Running
    pub fn resume(&self) -> bool {
        self.transition(|s| (s == ExecutionState::Paused).then_some(ExecutionState::Running))
    }

    /// Ask the running task to stop at its next checkpoint
    pub fn stop(&self) -> bool {
        self.transition(|s| (!s.is_terminal()).then_some(ExecutionState::Stopped))
    }

    /// Task started
    pub(crate) fn start(&self) {
        self.tx.send_replace(ExecutionState::Running);
    }

    /// Task ended; an external stop wins over the loop's own verdict
    pub(crate) fn finish(&self, outcome: ExecutionState) -> ExecutionState {
        self.transition(|s| (!s.is_terminal()).then_some(outcome));
        self.state()
    }

    fn transition(&self, next: impl FnOnce(ExecutionState) -> Option<ExecutionState>) -> bool {
        self.tx.send_if_modified(|state| match next(*state) {
            Some(new_state) if new_state != *state => {
                debug!(from = %state, to = %new_state, "execution state");
                *state = new_state;
                true
            }
            _ => false,
        })
    }

    /// Cooperative checkpoint: waits while paused, reports a stop request
    pub(crate) async fn checkpoint(&self) -> Checkpoint {
        let mut rx = self.tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ExecutionState::Paused => {
                    if rx.changed().await.is_err() {
                        return Checkpoint::Stop;
                    }
                }
                ExecutionState::Stopped => return Checkpoint::Stop,
                _ => return Checkpoint::Continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transitions() {
        let control = ControlHandle::new();
        assert_eq!(control.state(), ExecutionState::Idle);
        assert!(!control.pause());

        control.start();
        assert!(control.pause());
        assert_eq!(control.state(), ExecutionState::Paused);
        assert!(!control.pause());
        assert!(control.resume());
        assert!(!control.resume());

        assert!(control.stop());
        assert!(!control.resume());
        assert_eq!(control.finish(ExecutionState::Done), ExecutionState::Stopped);
    }

    #[test]
    fn test_finish_after_run() {
        let control = ControlHandle::new();
        control.start();
        assert_eq!(control.finish(ExecutionState::Failed), ExecutionState::Failed);
        assert!(!control.stop());
    }

    #[tokio::test]
    async fn test_checkpoint_waits_while_paused() {
        let control = ControlHandle::new();
        control.start();
        assert_eq!(control.checkpoint().await, Checkpoint::Continue);

        control.pause();
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.checkpoint().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        control.resume();
        assert_eq!(waiter.await.unwrap(), Checkpoint::Continue);
    }

    #[tokio::test]
    async fn test_stop_releases_paused_checkpoint() {
        let control = ControlHandle::new();
        control.start();
        control.pause();
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.checkpoint().await })
        };
        control.stop();
        assert_eq!(waiter.await.unwrap(), Checkpoint::Stop);
    }
}
