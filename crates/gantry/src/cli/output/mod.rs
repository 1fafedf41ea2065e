//! Output formatting utilities

use std::collections::HashSet;
use std::sync::Mutex;

use console::style;

use gantry_invoker::{BuildEvent, BuildEventSink, BuildOutcome, InvocationId};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("→").blue(), message);
}

/// Create a styled key-value line
pub fn key_value(key: &str, value: &str) -> String {
    format!("  {}: {}", style(key).dim(), value)
}

/// Event sink rendering relay events on the terminal
#[derive(Debug, Default)]
pub struct ConsoleSink {
    quiet: bool,
    verbose: bool,
    /// Invocations whose failure banner stays suppressed
    suppressed: Mutex<HashSet<InvocationId>>,
}

impl ConsoleSink {
    /// Create a sink honoring the global output flags
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            quiet,
            verbose,
            suppressed: Mutex::new(HashSet::new()),
        }
    }
}

impl BuildEventSink for ConsoleSink {
    fn handle(&self, event: &BuildEvent) {
        match event {
            BuildEvent::Started {
                id,
                execution_name,
                root,
                activate_on_failure,
                ..
            } => {
                if !activate_on_failure {
                    self.suppressed.lock().unwrap().insert(*id);
                }
                if !self.quiet {
                    info(&format!("{} ({})", execution_name, style(root.display()).cyan()));
                }
            }
            BuildEvent::Status { message, .. } => {
                if self.verbose {
                    println!("{}", style(message).dim());
                }
            }
            BuildEvent::Output { line, stderr, .. } => {
                if self.quiet {
                    return;
                }
                if *stderr {
                    eprintln!("{}", style(line).dim());
                } else {
                    println!("{}", line);
                }
            }
            BuildEvent::Finished { id, outcome } => match outcome {
                BuildOutcome::Succeeded => {
                    if !self.quiet {
                        success("build finished");
                    }
                }
                BuildOutcome::Failed { message } => {
                    if !self.suppressed.lock().unwrap().contains(id) {
                        error(&format!("build failed: {}", message));
                    }
                }
                BuildOutcome::Cancelled => {
                    // Neutral outcome: the work was skipped, nothing went
                    // wrong.
                    warning("build cancelled");
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_invoker::ExecutionActions;
    use std::path::PathBuf;

    #[test]
    fn test_suppressed_failures_are_remembered() {
        let sink = ConsoleSink::new(true, false);
        let id = InvocationId::mint();

        sink.handle(&BuildEvent::Started {
            id,
            execution_name: "Build app".to_string(),
            root: PathBuf::from("/ws"),
            actions: ExecutionActions::noop(),
            activate_on_failure: false,
        });

        assert!(sink.suppressed.lock().unwrap().contains(&id));
    }
}
