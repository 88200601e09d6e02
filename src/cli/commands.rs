//! CLI commands
//!
//! Special commands that can be executed in the REPL. Anything else is a task.

use crate::agent::{Agent, TaskOutcome};
use crate::core::Config;

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Run the input as a browser task
    Task(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
}

/// Parse and handle special commands
pub fn handle_command(input: &str, agent: &Agent, last: Option<&TaskOutcome>) -> CommandResult {
    let input = input.trim();
    let cmd = input.split_whitespace().next().unwrap_or("").to_lowercase();

    match cmd.as_str() {
        "exit" | "quit" | "q" => CommandResult::Exit,

        "help" | "?" => CommandResult::Handled(help_text()),

        "status" => {
            let adapter = agent.adapter();
            let config = agent.config();
            CommandResult::Handled(format!(
                "Webpilot Status:\n\
                 ─────────────────────────────\n\
                 Provider:       {}{}\n\
                 Max iterations: {}\n\
                 History window: {} turns\n\
                 Last task:      {}",
                adapter.active_name(),
                if adapter.has_failed_over() {
                    " (failed over)"
                } else {
                    ""
                },
                config.max_iterations,
                config.history_window,
                last.map(describe).unwrap_or_else(|| "none".to_string()),
            ))
        }

        "findings" => match last {
            Some(outcome) if !outcome.findings.is_empty() => CommandResult::Handled(
                outcome
                    .findings
                    .iter()
                    .enumerate()
                    .map(|(i, f)| format!("{}. {}", i + 1, f))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => CommandResult::Handled("No findings saved.".to_string()),
        },

        "config" => CommandResult::Handled(format!(
            "Config file: {}\n\n{}",
            Config::config_file().display(),
            Config::default_config_toml()
        )),

        _ if input.starts_with('/') => CommandResult::Handled(format!(
            "Unknown command: {}. Type 'help' for available commands.",
            cmd
        )),

        _ => CommandResult::Task(input.to_string()),
    }
}

/// One-line description of a finished task
pub fn describe(outcome: &TaskOutcome) -> String {
    match (&outcome.result, &outcome.error) {
        (Some(result), _) => format!(
            "{} after {} turns: {}",
            outcome.state, outcome.iterations, result
        ),
        (None, Some(error)) => format!(
            "{} after {} turns: {}",
            outcome.state, outcome.iterations, error
        ),
        (None, None) => outcome.state.to_string(),
    }
}

/// Generate help text
fn help_text() -> String {
    r#"Webpilot Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit Webpilot
  status           Show provider and last task
  findings         Show findings from the last task
  config           Show the config file location and defaults

Anything else is run as a browser task, e.g.
  go to example.com and click Login

Keyboard Shortcuts:
  Ctrl+C           Stop the running task
  Ctrl+D           Exit Webpilot
─────────────────────────────────────────────"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ExecutionState;

    fn outcome() -> TaskOutcome {
        TaskOutcome {
            success: true,
            result: Some("Logged in".to_string()),
            error: None,
            state: ExecutionState::Done,
            iterations: 4,
            findings: vec!["Username field is [2]".to_string()],
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&outcome()), "done after 4 turns: Logged in");

        let stopped = TaskOutcome {
            success: false,
            result: None,
            error: Some("Stopped by user".to_string()),
            state: ExecutionState::Stopped,
            iterations: 2,
            findings: Vec::new(),
        };
        assert_eq!(describe(&stopped), "stopped after 2 turns: Stopped by user");
    }
}
