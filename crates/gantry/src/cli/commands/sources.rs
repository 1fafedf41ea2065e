//! Sources command — run source-generation tasks

use clap::Args;

use super::{report_result, CommandContext};
use crate::cli::Cli;

/// Run source-generation tasks for modules
#[derive(Debug, Args)]
pub struct SourcesCommand {
    /// Modules to generate sources for (defaults to every module)
    pub modules: Vec<String>,
}

impl SourcesCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let context = CommandContext::load(cli)?;
        context.install_interrupt_handler();

        let modules = context.select_modules(&self.modules)?;
        let result = context.invoker.generate_sources(&modules).await?;
        report_result(cli, &result)
    }
}
