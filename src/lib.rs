//! Webpilot - LLM-driven browser agent
//!
//! Give it a task in plain language; a model drives a real browser through a
//! small set of tools until it reports a result.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Provider abstraction, vendor backends, retry and failover
//! - **Tools**: Tool schema, page snapshots, browser driver and dispatcher
//! - **Agent**: Orchestration loop, history sanitizing, control and activity log
//! - **CLI**: Command-line REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webpilot::agent::Agent;
//! use webpilot::llm::ProviderAdapter;
//! use webpilot::tools::browser::AgentBrowserDriver;
//! use webpilot::tools::{ToolDispatcher, Unattended};
//! use webpilot::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load();
//!     let driver = Arc::new(AgentBrowserDriver::new(&config.browser));
//!     let tools = ToolDispatcher::from_config(driver, Arc::new(Unattended), &config);
//!     let adapter = ProviderAdapter::from_config(&config)?;
//!
//!     let mut agent = Agent::new(&config, adapter, tools);
//!     let outcome = agent.execute_task("Open example.com and read the heading").await;
//!     println!("{:?}", outcome.result);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::{Agent, ControlHandle, ExecutionState, TaskOutcome};
pub use cli::Repl;
pub use core::{Config, PilotError, ProviderError, Result};
