//! Terminal implementations of the operator and activity log

use std::io::{self, BufRead, Write};

use async_trait::async_trait;

use crate::agent::log::{LogKind, LogSink};
use crate::core::Result;
use crate::tools::Operator;

/// Asks the person at the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOperator;

impl ConsoleOperator {
    async fn prompt(text: String) -> Option<String> {
        tokio::task::spawn_blocking(move || {
            print!("{}", text);
            io::stdout().flush().ok()?;
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(line.trim().to_string()),
            }
        })
        .await
        .ok()
        .flatten()
    }
}

#[async_trait]
impl Operator for ConsoleOperator {
    async fn ask(&self, question: &str) -> Option<String> {
        Self::prompt(format!("\n❓ {}\n> ", question))
            .await
            .filter(|answer| !answer.is_empty())
    }

    async fn confirm(&self, action_description: &str) -> bool {
        let answer = Self::prompt(format!("\n⚠️  {} [y/N]: ", action_description)).await;
        matches!(
            answer.as_deref().map(str::to_lowercase).as_deref(),
            Some("y") | Some("yes")
        )
    }
}

/// Prints the activity log to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    fn icon(kind: LogKind) -> &'static str {
        match kind {
            LogKind::System => "🔧",
            LogKind::Thought => "💭",
            LogKind::Tool => "🛠️ ",
            LogKind::Result => "  ",
            LogKind::Success => "✅",
            LogKind::Error => "❌",
        }
    }
}

#[async_trait]
impl LogSink for ConsoleSink {
    async fn log(&self, kind: LogKind, message: &str) -> Result<()> {
        println!("{} {}", Self::icon(kind), message);
        Ok(())
    }
}
