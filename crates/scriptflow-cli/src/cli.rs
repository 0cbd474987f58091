//! CLI argument definitions.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// scriptflow -- scripted conversation flows with realistic pacing.
#[derive(Parser)]
#[command(
    name = "scriptflow",
    version,
    about = "scriptflow -- scripted, timer-driven conversation flows",
    long_about = "Type a request such as \"clock in\" or \"time off\" and watch the matching \
                  flow play out: system messages, the assistant's answer, an optional form, \
                  and approval / notification cascades."
)]
pub struct Cli {
    /// Runner configuration file.
    #[arg(long, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Flow catalog (TOML); the built-in catalog is used when omitted.
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Playback speed multiplier; overrides the config file and
    /// SCRIPTFLOW_SPEED.
    #[arg(long, global = true)]
    pub speed: Option<f64>,

    /// Default log filter when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive conversation.
    Run,

    /// List the flows of the catalog.
    Flows,

    /// Print the entities the fast path would extract from TEXT.
    Extract {
        /// Free text to scan.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}
