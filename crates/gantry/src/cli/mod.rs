//! CLI definition and command handling

pub mod commands;
pub mod output;
pub mod prompts;

use clap::{Parser, Subcommand};

use commands::{
    BuildCommand, BundleCommand, CleanCommand, CompileCommand, RebuildCommand, SourcesCommand,
};

/// Gantry - Build orchestration CLI
#[derive(Debug, Parser)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Assemble distributable artifacts
    Build(BuildCommand),

    /// Compile sources without packaging
    Compile(CompileCommand),

    /// Build app bundles
    Bundle(BundleCommand),

    /// Run source-generation tasks
    Sources(SourcesCommand),

    /// Delete build outputs in every build root
    Clean(CleanCommand),

    /// Clean, then assemble the whole workspace
    Rebuild(RebuildCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        // Change to specified directory if provided
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Build(ref cmd) => cmd.execute(&self),
            Commands::Compile(ref cmd) => cmd.execute(&self),
            Commands::Bundle(ref cmd) => cmd.execute(&self),
            Commands::Sources(ref cmd) => cmd.execute(&self),
            Commands::Clean(ref cmd) => cmd.execute(&self),
            Commands::Rebuild(ref cmd) => cmd.execute(&self),
        }
    }
}
