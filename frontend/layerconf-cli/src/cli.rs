use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "layerconf", about = "Layerconf admin CLI")]
pub struct Cli {
    /// JSON file standing in for the host-provided global tree.
    #[arg(long, default_value = "globals.json")]
    pub globals: String,

    /// JSON file persisting per-user overrides.
    #[arg(long, default_value = "overrides.json")]
    pub overrides: String,

    /// Resolve without the override layer.
    #[arg(long)]
    pub no_local_override: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show every config field with value, provenance, and edit state.
    List,
    /// Resolve one key.
    Get { key: String },
    /// Stage and persist an override for one key.
    Set { key: String, value: String },
    /// Remove the override for one key.
    Unset { key: String },
    /// Remove every override.
    Reset,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
