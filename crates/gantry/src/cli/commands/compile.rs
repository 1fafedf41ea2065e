//! Compile command — compile sources without packaging

use clap::Args;

use gantry_core::TestScope;

use super::{report_result, CommandContext};
use crate::cli::Cli;

/// Compile module sources
#[derive(Debug, Args)]
pub struct CompileCommand {
    /// Modules to compile (defaults to every module)
    pub modules: Vec<String>,

    /// Test compilation units to include (none, unit, device, all)
    #[arg(long, default_value = "none")]
    pub tests: TestScope,
}

impl CompileCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let context = CommandContext::load(cli)?;
        context.install_interrupt_handler();

        let modules = context.select_modules(&self.modules)?;
        let result = context.invoker.compile(&modules, self.tests).await?;
        report_result(cli, &result)
    }
}
