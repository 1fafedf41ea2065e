//! CLI commands

mod build;
mod bundle;
mod clean;
mod compile;
mod rebuild;
mod sources;

pub use build::BuildCommand;
pub use bundle::BundleCommand;
pub use clean::CleanCommand;
pub use compile::CompileCommand;
pub use rebuild::RebuildCommand;
pub use sources::SourcesCommand;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::debug;

use gantry_core::config::load_config_or_default;
use gantry_core::{ModuleId, Workspace};
use gantry_invoker::{
    AssembleResult, BuildEventSink, BuildInvoker, BuildStopper, CloseDecision, CompilerLock,
    MultiInvocationResult, NoDebugSessions, NoopSaver, ProcessBackend, TaskExecutor, TracingSink,
};

use super::output::{self, ConsoleSink};
use super::prompts::{TerminalClosePrompt, TerminalRuntimeFixer};
use super::{Cli, OutputFormat};
use crate::exit_codes;

/// Everything a build command needs: the orchestrator wired against the
/// configured backend and the loaded workspace snapshot
pub(crate) struct CommandContext {
    pub invoker: Arc<BuildInvoker>,
    pub workspace: Arc<Workspace>,
}

impl CommandContext {
    /// Load config + workspace and wire up the orchestrator
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let (config, config_path) = load_config_or_default(&cwd);
        debug!(config = ?config_path, "command context loading");

        let workspace = Arc::new(
            Workspace::load(&cwd)
                .context("no workspace snapshot found; run a backend sync first")?,
        );

        let mut backend_config = config.backend.clone();
        if config.build.parallel {
            backend_config
                .default_arguments
                .push("--parallel".to_string());
        }

        let executor = Arc::new(TaskExecutor::new(
            Arc::new(ProcessBackend::new(backend_config)),
            Arc::new(CompilerLock::new("compiler-output")),
            Arc::new(NoopSaver),
            Arc::new(TerminalRuntimeFixer),
            Duration::from_millis(config.build.lock_poll_interval_ms),
        ));

        let sink: Arc<dyn BuildEventSink> = match cli.format {
            OutputFormat::Text => Arc::new(ConsoleSink::new(cli.quiet, cli.verbose)),
            // JSON mode prints the final result; events only go to the log.
            OutputFormat::Json => Arc::new(TracingSink),
        };

        let invoker = Arc::new(BuildInvoker::new(
            workspace.clone(),
            executor,
            Arc::new(BuildStopper::new()),
            sink,
            Arc::new(NoDebugSessions),
            Arc::new(TerminalClosePrompt),
        ));

        Ok(Self { invoker, workspace })
    }

    /// Resolve module names from the command line, defaulting to every
    /// module in the workspace
    pub fn select_modules(&self, names: &[String]) -> anyhow::Result<Vec<ModuleId>> {
        if names.is_empty() {
            return Ok(self.workspace.module_ids());
        }
        let mut modules = Vec::with_capacity(names.len());
        for name in names {
            let id = ModuleId::new(name.as_str());
            if self.workspace.module(&id).is_none() {
                anyhow::bail!("module '{}' not found in workspace", name);
            }
            modules.push(id);
        }
        Ok(modules)
    }

    /// Route Ctrl-C through the close-time veto: terminating stops the
    /// running builds and exits once the stop requests are issued.
    pub fn install_interrupt_handler(&self) {
        let invoker = Arc::clone(&self.invoker);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                match invoker.request_close() {
                    CloseDecision::Proceed => std::process::exit(exit_codes::CANCELLED),
                    CloseDecision::Veto => output::info("build keeps running"),
                }
            }
        });
    }
}

/// Report an aggregate result; build failure becomes the command's error,
/// cancellation stays neutral
pub(crate) fn report_result(cli: &Cli, result: &MultiInvocationResult) -> anyhow::Result<()> {
    if cli.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(result)?);
    }

    if result.is_empty() {
        if cli.format == OutputFormat::Text {
            output::warning("nothing to build for the requested modules");
        }
        return Ok(());
    }

    if cli.format == OutputFormat::Text && !cli.quiet {
        for invocation in &result.invocations {
            let root = invocation.root.display().to_string();
            let status = if invocation.is_cancelled() {
                "cancelled"
            } else if invocation.is_successful() {
                "ok"
            } else {
                "failed"
            };
            println!("{}", output::key_value(&root, status));
        }
    }

    if result.is_cancelled() {
        return Ok(());
    }
    if !result.is_successful() {
        anyhow::bail!("build failed");
    }
    Ok(())
}

/// Report a packaging aggregate, including queried artifact locations
pub(crate) fn report_assemble(cli: &Cli, result: &AssembleResult) -> anyhow::Result<()> {
    if cli.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(result)?);
        if result.result.is_successful() || result.result.is_cancelled() {
            return Ok(());
        }
        anyhow::bail!("build failed");
    }

    if cli.format == OutputFormat::Text && !cli.quiet {
        for invocation in &result.result.invocations {
            if let Some(model) = &invocation.model {
                println!(
                    "{}",
                    output::key_value(&invocation.root.display().to_string(), &model.to_string())
                );
            }
        }
    }
    report_result(cli, &result.result)
}
