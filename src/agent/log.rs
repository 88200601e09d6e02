//! User-facing activity log
//!
//! The orchestrator reports what it is doing through a [`LogSink`]. This is
//! separate from `tracing` diagnostics: it is the feed a front end shows to
//! the person who asked for the task. Delivery is best effort.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::core::{PilotError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    System,
    Thought,
    Tool,
    Result,
    Success,
    Error,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::System => "system",
            LogKind::Thought => "thought",
            LogKind::Tool => "tool",
            LogKind::Result => "result",
            LogKind::Success => "success",
            LogKind::Error => "error",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub kind: LogKind,
    pub message: String,
}

#[async_trait]
pub trait LogSink: Send + Sync {
    async fn log(&self, kind: LogKind, message: &str) -> Result<()>;
}

/// Forwards activity to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl LogSink for TracingSink {
    async fn log(&self, kind: LogKind, message: &str) -> Result<()> {
        match kind {
            LogKind::Error => error!(target: "webpilot::activity", kind = %kind, "{}", message),
            _ => info!(target: "webpilot::activity", kind = %kind, "{}", message),
        }
        Ok(())
    }
}

/// Sends activity over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LogEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl LogSink for ChannelSink {
    async fn log(&self, kind: LogKind, message: &str) -> Result<()> {
        self.tx
            .send(LogEvent {
                kind,
                message: message.to_string(),
            })
            .map_err(|_| PilotError::Other("activity log receiver closed".to_string()))
    }
}
