//! Execution adapter
//!
//! Runs each build request as one cancellable background unit of work:
//! flushes unsaved editor state, takes the compiler-exclusivity lock,
//! registers a cancellation token, drives the backend connection and
//! classifies the outcome. Exactly one terminal listener callback and
//! exactly one `on_end` fire per invocation, on every path.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, BackendEvents, BackendSpec, BuildBackend};
use crate::events::InvocationListener;
use crate::request::{BuildRequest, InvocationId};
use crate::result::{BuildError, InvocationResult};
use crate::stopper::BuildStopper;

/// Flushes unsaved in-memory editor state to disk before a build
pub trait EditorSaver: Send + Sync {
    /// Save everything; called synchronously before each invocation
    fn save_all(&self);
}

/// Saver for environments without an editor (CLI, tests)
#[derive(Debug, Default)]
pub struct NoopSaver;

impl EditorSaver for NoopSaver {
    fn save_all(&self) {}
}

/// Offers a remediation path for a misconfigured build runtime
pub trait RuntimeFixer: Send + Sync {
    /// Present the failure and let the user pick a different runtime;
    /// returns whether anything was changed
    fn offer_fix(&self, message: &str) -> bool;
}

/// Fixer that never remediates
#[derive(Debug, Default)]
pub struct NoRemediation;

impl RuntimeFixer for NoRemediation {
    fn offer_fix(&self, _message: &str) -> bool {
        false
    }
}

/// Named semaphore shared with the IDE's own compiler, so two build
/// pipelines never race over the same output directories
pub struct CompilerLock {
    name: String,
    semaphore: Arc<Semaphore>,
}

impl CompilerLock {
    /// Create a lock with a diagnostic name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Lock name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Try to take the lock without waiting
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }

    /// Take the lock, waiting as long as needed
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        Arc::clone(&self.semaphore).acquire_owned().await.unwrap()
    }
}

impl std::fmt::Debug for CompilerLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerLock").field("name", &self.name).finish()
    }
}

/// Lifecycle of one invocation; a terminal state is final
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    /// Accepted, not yet running
    Queued,
    /// Backend operation in flight
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished with a failure
    Failed,
    /// Finished by cancellation
    Cancelled,
}

impl InvocationState {
    /// Whether this state ends the invocation
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Guards the single-terminal-transition invariant
struct StateCell(Mutex<InvocationState>);

impl StateCell {
    fn new() -> Self {
        Self(Mutex::new(InvocationState::Queued))
    }

    /// Advance to the next state; returns false once terminal
    fn advance(&self, next: InvocationState) -> bool {
        let mut state = self.0.lock().unwrap();
        if state.is_terminal() {
            debug_assert!(!next.is_terminal(), "second terminal transition attempted");
            return false;
        }
        *state = next;
        true
    }
}

/// Failure before a request was accepted for execution; no result can be
/// meaningfully constructed for these
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The backend connection could not be set up
    #[error("backend connection failed: {0}")]
    Connection(String),

    /// The background worker itself died
    #[error("invocation worker failed: {0}")]
    Worker(String),
}

/// Runs build requests as background units of work
pub struct TaskExecutor {
    backend: Arc<dyn BuildBackend>,
    compiler_lock: Arc<CompilerLock>,
    saver: Arc<dyn EditorSaver>,
    fixer: Arc<dyn RuntimeFixer>,
    poll_interval: Duration,
}

impl TaskExecutor {
    /// Create an executor
    pub fn new(
        backend: Arc<dyn BuildBackend>,
        compiler_lock: Arc<CompilerLock>,
        saver: Arc<dyn EditorSaver>,
        fixer: Arc<dyn RuntimeFixer>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            backend,
            compiler_lock,
            saver,
            fixer,
            poll_interval,
        }
    }

    /// Execute one request as a background unit of work.
    ///
    /// The handle resolves to the invocation's result; backend build
    /// failures and cancellations are carried inside the result, only
    /// pre-acceptance failures surface as errors.
    pub fn execute(
        &self,
        request: BuildRequest,
        query_outputs: bool,
        stopper: Arc<BuildStopper>,
        listener: Arc<dyn InvocationListener>,
    ) -> JoinHandle<Result<InvocationResult, InvokeError>> {
        let backend = Arc::clone(&self.backend);
        let compiler_lock = Arc::clone(&self.compiler_lock);
        let saver = Arc::clone(&self.saver);
        let fixer = Arc::clone(&self.fixer);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let id = request.id();
            saver.save_all();
            let token = stopper.register(id);
            let state = StateCell::new();

            let outcome = run_invocation(
                backend,
                compiler_lock,
                poll_interval,
                fixer,
                &stopper,
                &request,
                query_outputs,
                token,
                &listener,
                &state,
            )
            .await;

            listener.on_end(id);
            stopper.remove(id);
            outcome
        })
    }
}

/// Drive one invocation to its terminal state
#[allow(clippy::too_many_arguments)]
async fn run_invocation(
    backend: Arc<dyn BuildBackend>,
    compiler_lock: Arc<CompilerLock>,
    poll_interval: Duration,
    fixer: Arc<dyn RuntimeFixer>,
    stopper: &Arc<BuildStopper>,
    request: &BuildRequest,
    query_outputs: bool,
    token: CancellationToken,
    listener: &Arc<dyn InvocationListener>,
    state: &StateCell,
) -> Result<InvocationResult, InvokeError> {
    let id = request.id();
    state.advance(InvocationState::Running);
    listener.on_start(id);
    info!(%id, root = %request.root_path().display(), tasks = ?request.tasks(), "executing build tasks");

    // Poll for the compiler lock, re-checking for cancellation between
    // attempts instead of blocking indefinitely.
    let _permit = loop {
        if token.is_cancelled() {
            debug!(%id, "cancelled while waiting for the compiler lock");
            let result = cancelled_result(request);
            finish(state, listener, id, &result);
            return Ok(result);
        }
        match compiler_lock.try_acquire() {
            Some(permit) => break permit,
            None => tokio::time::sleep(poll_interval).await,
        }
    };

    listener.on_status(id, "running...");

    let bridge = Arc::new(ListenerBridge {
        id,
        stopper: Arc::clone(stopper),
        listener: Arc::clone(listener),
    });
    let spec = BackendSpec {
        root: request.root_path().to_path_buf(),
        tasks: request.tasks().to_vec(),
        jvm_args: request.jvm_args().to_vec(),
        args: request.command_line_args().to_vec(),
        env: request.env().clone(),
        pass_parent_env: request.pass_parent_env(),
        query_outputs,
        token: token.clone(),
        events: bridge,
    };

    let result = match backend.execute(spec).await {
        Ok(model) => {
            InvocationResult::success(request.root_path(), request.tasks().to_vec(), model)
        }
        Err(BackendError::Cancelled) => cancelled_result(request),
        Err(BackendError::Build { diagnostics }) => {
            // A stop request racing the backend's own failure still counts
            // as a cancellation, not an error.
            if token.is_cancelled() {
                cancelled_result(request)
            } else {
                let error = classify_failure(diagnostics, fixer.as_ref());
                InvocationResult::failure(request.root_path(), request.tasks().to_vec(), error)
            }
        }
        Err(BackendError::Connection(message)) => {
            warn!(%id, "backend connection failed: {}", message);
            return Err(InvokeError::Connection(message));
        }
    };

    finish(state, listener, id, &result);
    Ok(result)
}

fn cancelled_result(request: &BuildRequest) -> InvocationResult {
    InvocationResult::failure(
        request.root_path(),
        request.tasks().to_vec(),
        BuildError::Cancelled,
    )
}

/// Advance to the terminal state and fire the matching callback once
fn finish(
    state: &StateCell,
    listener: &Arc<dyn InvocationListener>,
    id: InvocationId,
    result: &InvocationResult,
) {
    let next = match &result.error {
        None => InvocationState::Succeeded,
        Some(BuildError::Cancelled) => InvocationState::Cancelled,
        Some(_) => InvocationState::Failed,
    };
    if !state.advance(next) {
        return;
    }
    match &result.error {
        None => listener.on_success(id),
        Some(BuildError::Cancelled) => listener.on_cancel(id),
        Some(error) => listener.on_failure(id, error),
    }
}

/// Tell a misconfigured runtime apart from a regular build failure.
///
/// Matches the backend's "supplied runtime home is not valid" signature;
/// this failure class is user-actionable and gets a remediation offer
/// instead of a bare diagnostic.
fn classify_failure(diagnostics: String, fixer: &dyn RuntimeFixer) -> BuildError {
    if runtime_misconfig_pattern().is_match(&diagnostics) {
        if fixer.offer_fix(&diagnostics) {
            info!("runtime remediation applied");
        }
        BuildError::RuntimeMisconfigured {
            message: diagnostics,
        }
    } else {
        BuildError::Backend { diagnostics }
    }
}

fn runtime_misconfig_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(supplied|configured) (java|runtime) ?home .*is not a valid")
            .expect("static pattern compiles")
    })
}

/// Forwards backend stream events to the listener while the invocation is
/// still registered; a drained invocation stops relaying
struct ListenerBridge {
    id: InvocationId,
    stopper: Arc<BuildStopper>,
    listener: Arc<dyn InvocationListener>,
}

impl BackendEvents for ListenerBridge {
    fn on_output(&self, line: &str, stderr: bool) {
        if self.stopper.contains(self.id) {
            self.listener.on_output(self.id, line, stderr);
        }
    }

    fn on_status(&self, message: &str) {
        if self.stopper.contains(self.id) {
            self.listener.on_status(self.id, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingListener;
    use crate::test_support::{Script, ScriptedBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn executor_with(backend: Arc<ScriptedBackend>, fixer: Arc<dyn RuntimeFixer>) -> TaskExecutor {
        TaskExecutor::new(
            backend,
            Arc::new(CompilerLock::new("compiler")),
            Arc::new(NoopSaver),
            fixer,
            Duration::from_millis(10),
        )
    }

    fn request_for(root: &str) -> BuildRequest {
        BuildRequest::builder(root, vec![":app:assembleDebug".to_string()]).build()
    }

    #[tokio::test]
    async fn test_successful_invocation_lifecycle() {
        let backend = Arc::new(ScriptedBackend::new());
        let executor = executor_with(backend.clone(), Arc::new(NoRemediation));
        let stopper = Arc::new(BuildStopper::new());
        let listener = Arc::new(CollectingListener::default());

        let result = executor
            .execute(request_for("/ws"), false, stopper.clone(), listener.clone())
            .await
            .unwrap()
            .unwrap();

        assert!(result.is_successful());
        assert_eq!(backend.call_count(), 1);
        assert!(!stopper.has_active());
        let calls = listener.calls();
        assert_eq!(calls.first().map(String::as_str), Some("start"));
        assert!(calls.contains(&"success".to_string()));
        assert_eq!(calls.iter().filter(|c| *c == "end").count(), 1);
        assert!(!calls.contains(&"failure".to_string()));
    }

    #[tokio::test]
    async fn test_backend_cancellation_is_classified() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script("/ws", Script::CancelledByBackend);
        let executor = executor_with(backend, Arc::new(NoRemediation));
        let stopper = Arc::new(BuildStopper::new());
        let listener = Arc::new(CollectingListener::default());

        let result = executor
            .execute(request_for("/ws"), false, stopper, listener.clone())
            .await
            .unwrap()
            .unwrap();

        assert!(result.is_cancelled());
        assert!(!result.is_successful());
        let calls = listener.calls();
        assert!(calls.contains(&"cancel".to_string()));
        assert!(!calls.contains(&"failure".to_string()));
    }

    #[tokio::test]
    async fn test_stop_during_execution_cancels() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script("/ws", Script::WaitForToken);
        let executor = executor_with(backend, Arc::new(NoRemediation));
        let stopper = Arc::new(BuildStopper::new());
        let listener = Arc::new(CollectingListener::default());

        let request = request_for("/ws");
        let id = request.id();
        let handle = executor.execute(request, false, stopper.clone(), listener.clone());

        // Let the invocation register itself, then stop it.
        while !stopper.contains(id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(stopper.stop(id));

        let result = handle.await.unwrap().unwrap();
        assert!(result.is_cancelled());
        assert!(listener.calls().contains(&"cancel".to_string()));
        assert!(!stopper.contains(id));
    }

    #[tokio::test]
    async fn test_build_failure_carries_diagnostics() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script(
            "/ws",
            Script::Fail {
                delay_ms: 0,
                diagnostics: "compilation failed; see output".to_string(),
            },
        );
        let executor = executor_with(backend, Arc::new(NoRemediation));
        let listener = Arc::new(CollectingListener::default());

        let result = executor
            .execute(request_for("/ws"), false, Arc::new(BuildStopper::new()), listener.clone())
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            result.error,
            Some(BuildError::Backend { ref diagnostics }) if diagnostics.contains("compilation failed")
        ));
        assert!(listener.calls().contains(&"failure".to_string()));
    }

    #[tokio::test]
    async fn test_runtime_misconfiguration_offers_remediation() {
        struct CountingFixer(AtomicUsize);
        impl RuntimeFixer for CountingFixer {
            fn offer_fix(&self, _message: &str) -> bool {
                self.0.fetch_add(1, Ordering::SeqCst);
                true
            }
        }

        let backend = Arc::new(ScriptedBackend::new());
        backend.script(
            "/ws",
            Script::Fail {
                delay_ms: 0,
                diagnostics: "Supplied Java home '/bad/jdk' is not a valid directory".to_string(),
            },
        );
        let fixer = Arc::new(CountingFixer(AtomicUsize::new(0)));
        let executor = executor_with(backend, fixer.clone());

        let result = executor
            .execute(
                request_for("/ws"),
                false,
                Arc::new(BuildStopper::new()),
                Arc::new(CollectingListener::default()),
            )
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(result.error, Some(BuildError::RuntimeMisconfigured { .. })));
        assert_eq!(fixer.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_propagates_as_error() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script("/ws", Script::ConnectionRefused);
        let executor = executor_with(backend, Arc::new(NoRemediation));
        let stopper = Arc::new(BuildStopper::new());
        let listener = Arc::new(CollectingListener::default());

        let outcome = executor
            .execute(request_for("/ws"), false, stopper.clone(), listener.clone())
            .await
            .unwrap();

        assert!(matches!(outcome, Err(InvokeError::Connection(_))));
        // on_end still fires and the token is removed.
        assert!(listener.calls().contains(&"end".to_string()));
        assert!(!stopper.has_active());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_compiler_lock() {
        let backend = Arc::new(ScriptedBackend::new());
        let lock = Arc::new(CompilerLock::new("compiler"));
        let executor = TaskExecutor::new(
            backend.clone(),
            lock.clone(),
            Arc::new(NoopSaver),
            Arc::new(NoRemediation),
            Duration::from_millis(5),
        );
        let stopper = Arc::new(BuildStopper::new());
        let listener = Arc::new(CollectingListener::default());

        // Hold the lock so acquisition has to poll.
        let permit = lock.acquire().await;

        let request = request_for("/ws");
        let id = request.id();
        let handle = executor.execute(request, false, stopper.clone(), listener.clone());

        while !stopper.contains(id) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        stopper.stop(id);

        let result = handle.await.unwrap().unwrap();
        drop(permit);

        assert!(result.is_cancelled());
        // The backend was never contacted.
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_state_cell_single_terminal_transition() {
        let cell = StateCell::new();
        assert!(cell.advance(InvocationState::Running));
        assert!(cell.advance(InvocationState::Succeeded));
        assert!(!cell.advance(InvocationState::Running));
    }

    #[test]
    fn test_misconfig_pattern() {
        assert!(runtime_misconfig_pattern()
            .is_match("Supplied Java home '/x' is not a valid directory"));
        assert!(runtime_misconfig_pattern()
            .is_match("configured runtime home /y is not a valid installation"));
        assert!(!runtime_misconfig_pattern().is_match("Task ':app:compileDebug' failed"));
    }
}
