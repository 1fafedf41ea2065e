//! Rebuild command — clean, then assemble

use clap::Args;

use super::{report_result, CommandContext};
use crate::cli::Cli;

/// Clean and assemble the whole workspace
#[derive(Debug, Args)]
pub struct RebuildCommand {
    /// One-shot extra backend arguments (e.g. --temp-arg=--stacktrace)
    #[arg(long = "temp-arg")]
    pub temp_args: Vec<String>,

    /// Replay the most recent task list for this root instead of a full
    /// rebuild
    #[arg(long)]
    pub replay_root: Option<std::path::PathBuf>,
}

impl RebuildCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let context = CommandContext::load(cli)?;
        context.install_interrupt_handler();

        let result = match &self.replay_root {
            Some(root) => {
                context
                    .invoker
                    .rebuild_with_temp_args(root, self.temp_args.clone())
                    .await?
            }
            None => context.invoker.rebuild().await?,
        };
        report_result(cli, &result)
    }
}
