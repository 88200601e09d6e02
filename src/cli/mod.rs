//! CLI module - command-line interface
//!
//! Contains the REPL, command parsing and the console operator.

pub mod commands;
pub mod console;
pub mod repl;

pub use console::{ConsoleOperator, ConsoleSink};
pub use repl::Repl;
