//! Webpilot - LLM-driven browser agent
//!
//! Main entry point for the CLI application.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use webpilot::cli::{ConsoleOperator, ConsoleSink};
use webpilot::core::config::{ProviderKind, ProviderSettings};
use webpilot::llm::ProviderAdapter;
use webpilot::tools::browser::AgentBrowserDriver;
use webpilot::tools::ToolDispatcher;
use webpilot::{Agent, Config, Repl};

/// Webpilot - LLM-driven browser agent
#[derive(Parser, Debug)]
#[command(name = "webpilot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Task to run once (interactive REPL when omitted)
    task: Option<String>,

    /// Primary provider: gemini, openai or ollama
    #[arg(long, short = 'p')]
    provider: Option<ProviderKind>,

    /// Model for the primary provider
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Disable failover to the secondary provider
    #[arg(long)]
    no_failover: bool,

    /// Maximum model turns per task
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Run in headed browser mode (visible window)
    #[arg(long)]
    headed: bool,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(kind) = args.provider {
        if kind != config.providers.primary.kind {
            config.providers.primary = ProviderSettings::for_kind(kind);
        }
    }
    if let Some(model) = args.model {
        config.providers.primary.model = model;
    }
    if args.no_failover {
        config.providers.secondary = None;
    }
    if let Some(max) = args.max_iterations {
        config.agent.max_iterations = max;
    }
    if args.headed {
        config.browser.headed = true;
    }
    if args.debug {
        config.agent.debug = true;
    }

    let default_level = if config.agent.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if !AgentBrowserDriver::is_available().await {
        anyhow::bail!(
            "agent-browser not found. Install with: npm install -g agent-browser && agent-browser install"
        );
    }

    let driver = Arc::new(AgentBrowserDriver::new(&config.browser));
    let tools = ToolDispatcher::from_config(driver.clone(), Arc::new(ConsoleOperator), &config);
    let adapter = ProviderAdapter::from_config(&config)?;
    let agent = Agent::new(&config, adapter, tools).with_sink(Arc::new(ConsoleSink));
    let mut repl = Repl::new(agent);

    // Single task mode
    if let Some(task) = args.task {
        let outcome = repl.run_task(&task).await;
        let _ = driver.close().await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        if !outcome.success {
            std::process::exit(1);
        }
        return Ok(());
    }

    // Interactive REPL mode
    repl.run().await?;
    let _ = driver.close().await;

    Ok(())
}
