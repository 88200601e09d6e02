//! Interactive REPL for Webpilot
//!
//! Reads one task per line and runs it; Ctrl+C stops the running task.

use std::io::{self, BufRead, Write};

use tracing::warn;

use crate::agent::{Agent, TaskOutcome};
use crate::cli::commands::{describe, handle_command, CommandResult};
use crate::core::Result;

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    agent: Agent,
    last: Option<TaskOutcome>,
}

impl Repl {
    pub fn new(agent: Agent) -> Self {
        Self { agent, last: None }
    }

    /// Run the REPL until exit or end of input
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        loop {
            print!("Task: ");
            io::stdout().flush()?;

            let line = tokio::task::spawn_blocking(|| {
                let mut input = String::new();
                io::stdin().lock().read_line(&mut input).map(|n| (n, input))
            })
            .await
            .map_err(|e| crate::core::PilotError::Other(e.to_string()))?;

            let input = match line {
                Ok((0, _)) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok((_, input)) => input,
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            };

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, &self.agent, self.last.as_ref()) {
                CommandResult::Exit => {
                    println!("\nGoodbye!");
                    break;
                }
                CommandResult::Handled(output) => println!("{}\n", output),
                CommandResult::Task(task) => {
                    let outcome = self.run_task(&task).await;
                    println!("\n{}\n", describe(&outcome));
                    self.last = Some(outcome);
                }
            }
        }

        Ok(())
    }

    /// Run one task; Ctrl+C requests a stop and the task winds down on its own
    pub async fn run_task(&mut self, task: &str) -> TaskOutcome {
        let control = self.agent.control();
        let run = self.agent.execute_task(task);
        tokio::pin!(run);

        loop {
            tokio::select! {
                outcome = &mut run => return outcome,
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!(error = %e, "cannot listen for Ctrl+C");
                        return run.await;
                    }
                    if control.stop() {
                        println!("\nStopping after the current step...");
                    }
                }
            }
        }
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!(
            r#"
╔═══════════════════════════════════════════╗
║   WEBPILOT - LLM-driven browser agent     ║
╚═══════════════════════════════════════════╝
"#
        );
        println!("Provider:   {}", self.agent.adapter().active_name());
        println!("Iterations: {}", self.agent.config().max_iterations);
        println!();
        println!("Commands: help, status, findings, config, exit");
        println!("───────────────────────────────────────────");
    }
}
