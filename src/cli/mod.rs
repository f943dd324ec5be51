//! Command-line interface for rivalbrief.
//!
//! Provides commands for running a research pipeline with frames streamed
//! to stdout, serving the HTTP surface, and inspecting configuration.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use crate::config;
use crate::core::{Orchestrator, RunOptions, RunOutcome, StdoutConsumer};
use crate::domain::Topology;
use crate::server;

/// rivalbrief - Multi-agent competitor research orchestrator
#[derive(Parser, Debug)]
#[command(name = "rivalbrief")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a competitor and stream events to stdout
    Run {
        /// Competitor name
        subject: String,

        /// Pipeline topology
        #[arg(short, long, value_enum, default_value = "sequential")]
        topology: TopologyArg,

        /// Ignore any cached run and execute again
        #[arg(long)]
        fresh: bool,
    },

    /// Start the HTTP server
    Serve {
        /// Address to bind to (defaults to configured address)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TopologyArg {
    Sequential,
    Hierarchical,
}

impl From<TopologyArg> for Topology {
    fn from(arg: TopologyArg) -> Self {
        match arg {
            TopologyArg::Sequential => Topology::Sequential,
            TopologyArg::Hierarchical => Topology::Hierarchical,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                subject,
                topology,
                fresh,
            } => run_research(&subject, topology.into(), fresh).await,
            Commands::Serve { address } => serve(address).await,
            Commands::Config => show_config(),
        }
    }
}

async fn run_research(subject: &str, topology: Topology, fresh: bool) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config::config()?);

    let outcome = orchestrator
        .start_run(
            subject,
            topology,
            &StdoutConsumer,
            RunOptions {
                bypass_cache: fresh,
            },
        )
        .await;

    match outcome {
        RunOutcome::Completed { run_id } | RunOutcome::Replayed { run_id } => {
            eprintln!("✅ Run {} finished", run_id);
            Ok(())
        }
        RunOutcome::Failed { run_id, error } => {
            eprintln!("❌ Run {} failed: {}", run_id, error);
            std::process::exit(1);
        }
        RunOutcome::Aborted { error } => anyhow::bail!("Output stream aborted: {}", error),
    }
}

async fn serve(address: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let address = address.unwrap_or_else(|| cfg.address.clone());

    let orchestrator = Arc::new(Orchestrator::from_config(cfg));
    server::run_server(&address, orchestrator).await
}

/// Show only the first and last few characters of a secret
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("rivalbrief configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Agent runtime:");
    println!(
        "  API key:   {}",
        cfg.agent
            .api_key
            .as_deref()
            .map(mask_secret)
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("  Base URL:  {}", cfg.agent.base_url);
    println!("  Model:     {}", cfg.agent.model.as_deref().unwrap_or("(runtime default)"));
    println!("  API mode:  {:?}", cfg.agent.api_mode);
    println!("  Ready:     {}", cfg.agent.has_credentials());
    println!();
    println!("Cache:");
    println!("  TTL:          {}s", cfg.cache.ttl_seconds);
    println!("  Recent runs:  {}", cfg.cache.max_recent_runs);
    println!();
    println!("Safety:");
    println!("  Stage timeout:  {}s", cfg.safety.stage_timeout_seconds);
    println!("  Subject chars:  {}", cfg.safety.max_subject_chars);
    println!("  Output bytes:   {}", cfg.safety.max_output_bytes);
    println!();
    println!("Server address: {}", cfg.address);

    Ok(())
}
