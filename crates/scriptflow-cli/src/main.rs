//! CLI entry point for scriptflow.
//!
//! Provides the `scriptflow` command: an interactive demo host that drives
//! a flow runner from the terminal, plus catalog and extractor inspection.

mod cli;
mod helpers;
mod repl;

use anyhow::Result;
use clap::Parser;
use scriptflow_intent::EntityExtractor;

use crate::cli::{Cli, Commands};
use crate::helpers::{init_tracing, load_catalog};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Run => repl::cmd_run(&cli).await,
        Commands::Flows => cmd_flows(&cli),
        Commands::Extract { ref text } => cmd_extract(&text.join(" ")),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: flows
// ---------------------------------------------------------------------------

fn cmd_flows(cli: &Cli) -> Result<()> {
    let catalog = load_catalog(cli.catalog.as_deref())?;

    println!();
    for flow in catalog.iter() {
        println!(
            "  {:<12} {:<20} {:<13} {}",
            flow.id,
            flow.name,
            flow.agent_response.kind_name(),
            flow.triggers.join(", ")
        );
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: extract
// ---------------------------------------------------------------------------

fn cmd_extract(text: &str) -> Result<()> {
    let extractor = EntityExtractor::new()?;
    let entities = extractor.extract(text);

    let mut json = serde_json::to_value(&entities)?;
    if let Some(object) = json.as_object_mut() {
        object.insert(
            "fast_path_eligible".into(),
            entities.is_fast_path_eligible().into(),
        );
    }
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
