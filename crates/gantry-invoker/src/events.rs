//! Build event relay
//!
//! The executor reports invocation lifecycle through an
//! [`InvocationListener`]; the per-request [`EventRelay`] turns those
//! callbacks into [`BuildEvent`]s for an external sink. The start event
//! publishes a restart/stop action pair for UI controls; exactly one
//! terminal event fires per invocation.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::request::InvocationId;
use crate::result::BuildError;

/// Restart/stop pair published with a start event
#[derive(Clone)]
pub struct ExecutionActions {
    restart: Arc<dyn Fn() + Send + Sync>,
    stop: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl ExecutionActions {
    /// Create an action pair
    pub fn new(
        restart: impl Fn() + Send + Sync + 'static,
        stop: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            restart: Arc::new(restart),
            stop: Arc::new(stop),
        }
    }

    /// Actions that do nothing; for invocations with no UI surface
    pub fn noop() -> Self {
        Self::new(|| {}, || false)
    }

    /// Re-submit an equivalent request
    pub fn restart(&self) {
        (self.restart)();
    }

    /// Ask the cancellation registry to stop the invocation
    pub fn stop(&self) -> bool {
        (self.stop)()
    }
}

impl fmt::Debug for ExecutionActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionActions").finish_non_exhaustive()
    }
}

/// Terminal outcome of an invocation as shown to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The build finished successfully
    Succeeded,
    /// The build failed
    Failed {
        /// Diagnostic text for display
        message: String,
    },
    /// The build was cancelled; a neutral outcome, not an error
    Cancelled,
}

/// Events emitted while an invocation runs
#[derive(Debug, Clone)]
pub enum BuildEvent {
    /// An invocation started
    Started {
        id: InvocationId,
        /// Human-readable execution name ("Build app")
        execution_name: String,
        /// Build root the invocation runs against
        root: PathBuf,
        /// Restart/stop pair for UI controls
        actions: ExecutionActions,
        /// Whether failure UI may surface for this invocation
        activate_on_failure: bool,
    },
    /// Backend progress changed
    Status { id: InvocationId, message: String },
    /// The backend produced a line of output
    Output {
        id: InvocationId,
        line: String,
        stderr: bool,
    },
    /// The invocation reached its terminal state; fires exactly once
    Finished { id: InvocationId, outcome: BuildOutcome },
}

/// External consumer of build events
pub trait BuildEventSink: Send + Sync {
    /// Handle one event
    fn handle(&self, event: &BuildEvent);
}

/// Sink that logs to tracing
#[derive(Debug, Default)]
pub struct TracingSink;

impl BuildEventSink for TracingSink {
    fn handle(&self, event: &BuildEvent) {
        match event {
            BuildEvent::Started { id, execution_name, root, .. } => {
                tracing::info!(%id, root = %root.display(), "{} started", execution_name);
            }
            BuildEvent::Status { id, message } => {
                tracing::debug!(%id, "{}", message);
            }
            BuildEvent::Output { id, line, stderr } => {
                if *stderr {
                    tracing::warn!(%id, "{}", line);
                } else {
                    tracing::debug!(%id, "{}", line);
                }
            }
            BuildEvent::Finished { id, outcome } => match outcome {
                BuildOutcome::Succeeded => tracing::info!(%id, "build finished"),
                BuildOutcome::Failed { message } => tracing::error!(%id, "build failed: {}", message),
                BuildOutcome::Cancelled => tracing::info!(%id, "build cancelled"),
            },
        }
    }
}

/// Sink that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<BuildEvent>>,
}

impl CollectingSink {
    /// Get all collected events
    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Terminal outcomes in arrival order
    pub fn outcomes(&self) -> Vec<BuildOutcome> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BuildEvent::Finished { outcome, .. } => Some(outcome.clone()),
                _ => None,
            })
            .collect()
    }
}

impl BuildEventSink for CollectingSink {
    fn handle(&self, event: &BuildEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Lifecycle callbacks for one invocation.
///
/// The executor calls `on_start` once, streams status/output while the
/// build runs, fires exactly one of `on_success` / `on_failure` /
/// `on_cancel`, and always finishes with exactly one `on_end`.
pub trait InvocationListener: Send + Sync {
    /// The invocation started executing
    fn on_start(&self, _id: InvocationId) {}

    /// Backend progress changed
    fn on_status(&self, _id: InvocationId, _message: &str) {}

    /// The backend produced a line of output
    fn on_output(&self, _id: InvocationId, _line: &str, _stderr: bool) {}

    /// The build finished successfully
    fn on_success(&self, _id: InvocationId) {}

    /// The build failed
    fn on_failure(&self, _id: InvocationId, _error: &BuildError) {}

    /// The build was cancelled
    fn on_cancel(&self, _id: InvocationId) {}

    /// The invocation drained; always called exactly once
    fn on_end(&self, _id: InvocationId) {}
}

/// Listener that records callback names in order (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingListener {
    calls: Mutex<Vec<String>>,
}

impl CollectingListener {
    /// Names of callbacks received, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

impl InvocationListener for CollectingListener {
    fn on_start(&self, _id: InvocationId) {
        self.record("start");
    }
    fn on_status(&self, _id: InvocationId, _message: &str) {
        self.record("status");
    }
    fn on_output(&self, _id: InvocationId, _line: &str, _stderr: bool) {
        self.record("output");
    }
    fn on_success(&self, _id: InvocationId) {
        self.record("success");
    }
    fn on_failure(&self, _id: InvocationId, _error: &BuildError) {
        self.record("failure");
    }
    fn on_cancel(&self, _id: InvocationId) {
        self.record("cancel");
    }
    fn on_end(&self, _id: InvocationId) {
        self.record("end");
    }
}

/// Per-request listener forwarding lifecycle callbacks to a sink.
///
/// Guards the terminal transition: whichever of success/failure/cancel
/// arrives first wins, later ones are dropped.
pub struct EventRelay {
    execution_name: String,
    root: PathBuf,
    actions: ExecutionActions,
    activate_on_failure: bool,
    sink: Arc<dyn BuildEventSink>,
    delegate: Option<Arc<dyn InvocationListener>>,
    finished: AtomicBool,
}

impl EventRelay {
    /// Create a relay for one request
    pub fn new(
        execution_name: impl Into<String>,
        root: impl Into<PathBuf>,
        actions: ExecutionActions,
        activate_on_failure: bool,
        sink: Arc<dyn BuildEventSink>,
        delegate: Option<Arc<dyn InvocationListener>>,
    ) -> Self {
        Self {
            execution_name: execution_name.into(),
            root: root.into(),
            actions,
            activate_on_failure,
            sink,
            delegate,
            finished: AtomicBool::new(false),
        }
    }

    fn terminal(&self, id: InvocationId, outcome: BuildOutcome) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sink.handle(&BuildEvent::Finished { id, outcome });
    }
}

impl InvocationListener for EventRelay {
    fn on_start(&self, id: InvocationId) {
        self.sink.handle(&BuildEvent::Started {
            id,
            execution_name: self.execution_name.clone(),
            root: self.root.clone(),
            actions: self.actions.clone(),
            activate_on_failure: self.activate_on_failure,
        });
        if let Some(delegate) = &self.delegate {
            delegate.on_start(id);
        }
    }

    fn on_status(&self, id: InvocationId, message: &str) {
        self.sink.handle(&BuildEvent::Status {
            id,
            message: message.to_string(),
        });
        if let Some(delegate) = &self.delegate {
            delegate.on_status(id, message);
        }
    }

    fn on_output(&self, id: InvocationId, line: &str, stderr: bool) {
        self.sink.handle(&BuildEvent::Output {
            id,
            line: line.to_string(),
            stderr,
        });
        if let Some(delegate) = &self.delegate {
            delegate.on_output(id, line, stderr);
        }
    }

    fn on_success(&self, id: InvocationId) {
        self.terminal(id, BuildOutcome::Succeeded);
        if let Some(delegate) = &self.delegate {
            delegate.on_success(id);
        }
    }

    fn on_failure(&self, id: InvocationId, error: &BuildError) {
        self.terminal(
            id,
            BuildOutcome::Failed {
                message: error.to_string(),
            },
        );
        if let Some(delegate) = &self.delegate {
            delegate.on_failure(id, error);
        }
    }

    fn on_cancel(&self, id: InvocationId) {
        // Shown as skipped work, never surfaced as an error.
        self.terminal(id, BuildOutcome::Cancelled);
        if let Some(delegate) = &self.delegate {
            delegate.on_cancel(id);
        }
    }

    fn on_end(&self, id: InvocationId) {
        if let Some(delegate) = &self.delegate {
            delegate.on_end(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay_with_sink() -> (EventRelay, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let relay = EventRelay::new(
            "Build app",
            "/ws",
            ExecutionActions::noop(),
            true,
            sink.clone(),
            None,
        );
        (relay, sink)
    }

    #[test]
    fn test_relay_forwards_lifecycle() {
        let (relay, sink) = relay_with_sink();
        let id = InvocationId::mint();

        relay.on_start(id);
        relay.on_output(id, "compiling", false);
        relay.on_success(id);

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], BuildEvent::Started { .. }));
        assert!(matches!(events[2], BuildEvent::Finished { .. }));
    }

    #[test]
    fn test_exactly_one_terminal_event() {
        let (relay, sink) = relay_with_sink();
        let id = InvocationId::mint();

        relay.on_cancel(id);
        relay.on_failure(
            id,
            &BuildError::Backend {
                diagnostics: "late failure".to_string(),
            },
        );
        relay.on_success(id);

        assert_eq!(sink.outcomes(), vec![BuildOutcome::Cancelled]);
    }

    #[test]
    fn test_cancel_is_neutral_outcome() {
        let (relay, sink) = relay_with_sink();
        let id = InvocationId::mint();

        relay.on_cancel(id);
        assert_eq!(sink.outcomes(), vec![BuildOutcome::Cancelled]);
    }

    #[test]
    fn test_delegate_receives_callbacks() {
        let sink = Arc::new(CollectingSink::default());
        let delegate = Arc::new(CollectingListener::default());
        let relay = EventRelay::new(
            "Build app",
            "/ws",
            ExecutionActions::noop(),
            true,
            sink,
            Some(delegate.clone() as Arc<dyn InvocationListener>),
        );
        let id = InvocationId::mint();

        relay.on_start(id);
        relay.on_failure(
            id,
            &BuildError::Backend {
                diagnostics: "broken".to_string(),
            },
        );
        relay.on_end(id);

        assert_eq!(delegate.calls(), vec!["start", "failure", "end"]);
    }

    #[test]
    fn test_actions_invoke_closures() {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let actions = ExecutionActions::new(
            || {},
            move || {
                flag.store(true, Ordering::SeqCst);
                true
            },
        );

        assert!(actions.stop());
        assert!(stopped.load(Ordering::SeqCst));
    }
}
