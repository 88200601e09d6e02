//! Tools module - what the model can do in the browser
//!
//! Contains the tool schema, browser automation, the human-in-the-loop
//! operator and the dispatcher that ties them together.

pub mod browser;
pub mod interaction;
pub mod registry;
pub mod schema;

pub use interaction::{Operator, Unattended};
pub use registry::ToolDispatcher;
pub use schema::{tool_definitions, ToolInvocation, ToolKind};
