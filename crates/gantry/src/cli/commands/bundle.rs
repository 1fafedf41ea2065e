//! Bundle command — build app bundles

use clap::Args;

use super::{report_assemble, CommandContext};
use crate::cli::Cli;

/// Build app bundles for modules
#[derive(Debug, Args)]
pub struct BundleCommand {
    /// Modules to bundle (defaults to every module)
    pub modules: Vec<String>,

    /// Extract installable archives from the built bundles instead
    #[arg(long)]
    pub extract_archives: bool,
}

impl BundleCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let context = CommandContext::load(cli)?;
        context.install_interrupt_handler();

        let modules = context.select_modules(&self.modules)?;
        let result = if self.extract_archives {
            context.invoker.archive_from_bundle(&modules).await?
        } else {
            context.invoker.bundle(&modules).await?
        };
        report_assemble(cli, &result)
    }
}
