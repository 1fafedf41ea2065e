//! Interactive prompts for build-time decisions

use dialoguer::{Confirm, Input, Select};

use gantry_invoker::{CloseAnswer, ClosePrompt, RuntimeFixer};

use super::output;

/// Environment variable the backend launcher reads for its runtime home
const RUNTIME_HOME_ENV: &str = "JAVA_HOME";

/// Asks on the terminal whether closing may interrupt a running build
#[derive(Debug, Default)]
pub struct TerminalClosePrompt;

impl ClosePrompt for TerminalClosePrompt {
    fn ask(&self, debugging: bool) -> CloseAnswer {
        let message = if debugging {
            "A build is running and a native debug session is attached. Terminate the build?"
        } else {
            "A build is running. Terminate it?"
        };
        let items = ["Terminate the build", "Keep it running", "Cancel"];

        match Select::new()
            .with_prompt(message)
            .items(&items)
            .default(0)
            .interact()
        {
            Ok(0) => CloseAnswer::Terminate,
            Ok(1) => CloseAnswer::KeepRunning,
            _ => CloseAnswer::CancelClose,
        }
    }
}

/// Offers to point the backend at a different runtime when the configured
/// one is unusable
#[derive(Debug, Default)]
pub struct TerminalRuntimeFixer;

impl RuntimeFixer for TerminalRuntimeFixer {
    fn offer_fix(&self, message: &str) -> bool {
        output::error(message);

        let wants_fix = Confirm::new()
            .with_prompt("Select a different runtime for the backend?")
            .default(false)
            .interact()
            .unwrap_or(false);
        if !wants_fix {
            return false;
        }

        match Input::<String>::new()
            .with_prompt("Runtime home path")
            .interact_text()
        {
            Ok(path) if !path.trim().is_empty() => {
                std::env::set_var(RUNTIME_HOME_ENV, path.trim());
                output::info("runtime updated for subsequent invocations");
                true
            }
            _ => false,
        }
    }
}
