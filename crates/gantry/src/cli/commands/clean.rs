//! Clean command — delete build outputs

use clap::Args;

use super::{report_result, CommandContext};
use crate::cli::Cli;

/// Delete build outputs in every build root
#[derive(Debug, Args)]
pub struct CleanCommand {}

impl CleanCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let context = CommandContext::load(cli)?;
        context.install_interrupt_handler();

        let result = context.invoker.clean_project().await?;
        report_result(cli, &result)
    }
}
