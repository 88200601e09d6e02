//! Agent module - orchestration and conversation management
//!
//! Contains the loop that coordinates model turns and tool execution, the
//! history it keeps, and the control and log channels around it.

pub mod control;
pub mod conversation;
pub mod log;
pub mod loop_state;
pub mod orchestrator;
pub mod sanitizer;

pub use control::{ControlHandle, ExecutionState};
pub use conversation::History;
pub use log::{ChannelSink, LogEvent, LogKind, LogSink, TracingSink};
pub use loop_state::LoopState;
pub use orchestrator::{Agent, TaskOutcome, DEFAULT_SYSTEM_PROMPT};
pub use sanitizer::{sanitize, truncate, SanitizedHistory};
