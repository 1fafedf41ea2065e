//! Invocation orchestrator
//!
//! Turns resolved task groupings into build requests, fans them out to the
//! execution adapter concurrently and composes the individual results into
//! one aggregate preserving submission order. Failure of one root never
//! short-circuits or hides the results of the others.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{info, instrument};

use gantry_core::{BuildMode, ModuleId, TestScope, Workspace};
use gantry_resolver::{ModuleTasks, TaskResolver, CLEAN_TASK_NAME};

use crate::events::{BuildEventSink, EventRelay, ExecutionActions, InvocationListener};
use crate::executor::{InvokeError, TaskExecutor};
use crate::request::{BuildRequest, InvocationId};
use crate::result::{AssembleResult, InvocationResult, MultiInvocationResult};
use crate::stopper::BuildStopper;

/// Property asking the backend to run only source generation
pub const SOURCE_GEN_ONLY_ARG: &str = "-Pgantry.sourceGenOnly=true";

/// Finds natively-debugged processes that would be disturbed by closing
pub trait DebugSessionFinder: Send + Sync {
    /// Whether a native debug session is currently attached
    fn has_native_debug_session(&self) -> bool;
}

/// Finder for environments without a debugger
#[derive(Debug, Default)]
pub struct NoDebugSessions;

impl DebugSessionFinder for NoDebugSessions {
    fn has_native_debug_session(&self) -> bool {
        false
    }
}

/// What the user chose when closing while a build runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAnswer {
    /// Stop the build and close
    Terminate,
    /// Leave the build running; do not close
    KeepRunning,
    /// Abort the close entirely
    CancelClose,
}

/// Prompts the user when a close request races a running build
pub trait ClosePrompt: Send + Sync {
    /// Ask what to do; `debugging` is set when a native debug session
    /// would be disturbed
    fn ask(&self, debugging: bool) -> CloseAnswer;
}

/// Whether a close request may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Close may continue; any stop requests have been issued
    Proceed,
    /// Close is vetoed while the build keeps running
    Veto,
}

/// Orchestrates build invocations across build roots
pub struct BuildInvoker {
    workspace: Arc<Workspace>,
    resolver: TaskResolver,
    executor: Arc<TaskExecutor>,
    stopper: Arc<BuildStopper>,
    sink: Arc<dyn BuildEventSink>,
    debug_sessions: Arc<dyn DebugSessionFinder>,
    close_prompt: Arc<dyn ClosePrompt>,
    one_time_args: Mutex<Vec<String>>,
    last_build_tasks: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl BuildInvoker {
    /// Create an orchestrator
    pub fn new(
        workspace: Arc<Workspace>,
        executor: Arc<TaskExecutor>,
        stopper: Arc<BuildStopper>,
        sink: Arc<dyn BuildEventSink>,
        debug_sessions: Arc<dyn DebugSessionFinder>,
        close_prompt: Arc<dyn ClosePrompt>,
    ) -> Self {
        Self {
            resolver: TaskResolver::new(Arc::clone(&workspace)),
            workspace,
            executor,
            stopper,
            sink,
            debug_sessions,
            close_prompt,
            one_time_args: Mutex::new(Vec::new()),
            last_build_tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Run the backend clean task against every build root
    #[instrument(skip_all)]
    pub async fn clean_project(&self) -> Result<MultiInvocationResult, InvokeError> {
        let requests = self
            .workspace
            .roots()
            .into_iter()
            .map(|root| {
                BuildRequest::builder(root, vec![CLEAN_TASK_NAME.to_string()])
                    .mode(BuildMode::Clean)
                    .build()
            })
            .collect();
        self.execute_requests(requests).await
    }

    /// Run source-generation tasks for the given modules
    #[instrument(skip_all)]
    pub async fn generate_sources(
        &self,
        modules: &[ModuleId],
    ) -> Result<MultiInvocationResult, InvokeError> {
        let mode = BuildMode::SourceGen;
        let groups = self.resolver.resolve_modules(modules, mode, TestScope::None);
        if groups.is_empty() {
            return Ok(self.nothing_to_build(mode));
        }
        let requests = groups
            .into_values()
            .map(|group| {
                let mut args = self.current_one_time_args();
                args.push(SOURCE_GEN_ONLY_ARG.to_string());
                BuildRequest::builder(group.root.clone(), group.task_list())
                    .mode(mode)
                    .command_line_args(args)
                    .build()
            })
            .collect();
        self.execute_requests(requests).await
    }

    /// Compile the given modules' sources
    #[instrument(skip_all)]
    pub async fn compile(
        &self,
        modules: &[ModuleId],
        tests: TestScope,
    ) -> Result<MultiInvocationResult, InvokeError> {
        let mode = BuildMode::Compile;
        let groups = self.resolver.resolve_modules(modules, mode, tests);
        if groups.is_empty() {
            return Ok(self.nothing_to_build(mode));
        }
        let requests = self.requests_for_groups(groups, mode);
        self.execute_requests(requests).await
    }

    /// Assemble distributable artifacts for the given modules
    #[instrument(skip_all)]
    pub async fn assemble(
        &self,
        modules: &[ModuleId],
        tests: TestScope,
    ) -> Result<AssembleResult, InvokeError> {
        self.execute_packaging(BuildMode::Assemble, modules, tests).await
    }

    /// Build app bundles for the given modules
    #[instrument(skip_all)]
    pub async fn bundle(&self, modules: &[ModuleId]) -> Result<AssembleResult, InvokeError> {
        self.execute_packaging(BuildMode::Bundle, modules, TestScope::None).await
    }

    /// Extract installable archives from previously built bundles
    #[instrument(skip_all)]
    pub async fn archive_from_bundle(
        &self,
        modules: &[ModuleId],
    ) -> Result<AssembleResult, InvokeError> {
        self.execute_packaging(BuildMode::ArchiveFromBundle, modules, TestScope::None)
            .await
    }

    /// Clean and assemble the whole workspace.
    ///
    /// Clean invocations for every root complete, successfully or not,
    /// before any regular-task invocation is submitted.
    #[instrument(skip_all)]
    pub async fn rebuild(&self) -> Result<MultiInvocationResult, InvokeError> {
        let modules = self.workspace.module_ids();
        let groups = self
            .resolver
            .resolve_modules(&modules, BuildMode::Rebuild, TestScope::None);
        if groups.is_empty() {
            return Ok(self.nothing_to_build(BuildMode::Rebuild));
        }

        let clean_requests: Vec<BuildRequest> = groups
            .values()
            .filter(|group| !group.clean_tasks.is_empty())
            .map(|group| {
                BuildRequest::builder(group.root.clone(), group.clean_task_list())
                    .mode(BuildMode::Clean)
                    .build()
            })
            .collect();
        let clean_result = self.execute_requests(clean_requests).await?;

        let regular_requests = self.requests_for_groups(groups, BuildMode::Rebuild);
        let regular_result = self.execute_requests(regular_requests).await?;
        Ok(clean_result.concat(regular_result))
    }

    /// Replay the most recent non-clean task list for a root with one-shot
    /// extra arguments.
    ///
    /// The arguments are consumed exactly once, regardless of outcome; a
    /// lost task list falls back to a full rebuild.
    pub async fn rebuild_with_temp_args(
        &self,
        root: &Path,
        args: Vec<String>,
    ) -> Result<MultiInvocationResult, InvokeError> {
        self.one_time_args.lock().unwrap().extend(args);
        let result = self.replay_last_tasks(root).await;
        self.one_time_args.lock().unwrap().clear();
        result
    }

    async fn replay_last_tasks(&self, root: &Path) -> Result<MultiInvocationResult, InvokeError> {
        let tasks = self
            .last_build_tasks
            .lock()
            .unwrap()
            .get(root)
            .cloned()
            .unwrap_or_default();
        if tasks.is_empty() {
            // The last task list was lost; rebuild from scratch.
            return self.rebuild().await;
        }
        let request = BuildRequest::builder(root, tasks)
            .command_line_args(self.current_one_time_args())
            .build();
        self.execute_requests(vec![request]).await
    }

    /// Submit requests concurrently and compose their results.
    ///
    /// Every constituent completes, successfully or not, before the
    /// aggregate is built; results keep submission order regardless of
    /// completion order.
    pub async fn execute_requests(
        &self,
        requests: Vec<BuildRequest>,
    ) -> Result<MultiInvocationResult, InvokeError> {
        self.execute_requests_with_query(requests, false).await
    }

    /// Submit one request and wait for its result
    pub async fn execute_request(
        &self,
        request: BuildRequest,
    ) -> Result<InvocationResult, InvokeError> {
        self.submit_request(request, false).join().await
    }

    async fn execute_requests_with_query(
        &self,
        requests: Vec<BuildRequest>,
        query_outputs: bool,
    ) -> Result<MultiInvocationResult, InvokeError> {
        let handles: Vec<RequestHandle> = requests
            .into_iter()
            .map(|request| self.submit_request(request, query_outputs))
            .collect();

        let mut invocations = Vec::with_capacity(handles.len());
        for handle in handles {
            invocations.push(handle.join().await?);
        }
        Ok(MultiInvocationResult::new(invocations))
    }

    /// Hand one request to the executor, remembering its task list for
    /// later replay. Empty task lists complete immediately without
    /// contacting the backend.
    fn submit_request(&self, request: BuildRequest, query_outputs: bool) -> RequestHandle {
        let root = request.root_path().to_path_buf();
        if request.mode() != Some(BuildMode::Clean) {
            self.last_build_tasks
                .lock()
                .unwrap()
                .insert(root.clone(), request.tasks().to_vec());
        }

        info!(root = %root.display(), tasks = ?request.tasks(), "about to execute build tasks");
        if request.tasks().is_empty() {
            return RequestHandle::Immediate(InvocationResult::success(root, Vec::new(), None));
        }

        let relay = build_relay(&self.executor, &self.stopper, &self.sink, &request, query_outputs);
        RequestHandle::Running(self.executor.execute(
            request,
            query_outputs,
            Arc::clone(&self.stopper),
            relay,
        ))
    }

    async fn execute_packaging(
        &self,
        mode: BuildMode,
        modules: &[ModuleId],
        tests: TestScope,
    ) -> Result<AssembleResult, InvokeError> {
        let groups = self.resolver.resolve_modules(modules, mode, tests);
        if groups.is_empty() {
            return Ok(AssembleResult::new(self.nothing_to_build(mode), mode));
        }
        let requests = self.requests_for_groups(groups, mode);
        // One round-trip both builds and queries artifact metadata.
        let result = self.execute_requests_with_query(requests, true).await?;
        Ok(AssembleResult::new(result, mode))
    }

    fn requests_for_groups(
        &self,
        groups: std::collections::BTreeMap<PathBuf, ModuleTasks>,
        mode: BuildMode,
    ) -> Vec<BuildRequest> {
        groups
            .into_values()
            .map(|group| {
                BuildRequest::builder(group.root.clone(), group.task_list())
                    .mode(mode)
                    .command_line_args(self.current_one_time_args())
                    .build()
            })
            .collect()
    }

    fn nothing_to_build(&self, mode: BuildMode) -> MultiInvocationResult {
        info!(%mode, "unable to find build tasks for the requested modules");
        MultiInvocationResult::default()
    }

    fn current_one_time_args(&self) -> Vec<String> {
        self.one_time_args.lock().unwrap().clone()
    }

    /// Most recent non-clean task list submitted for a root
    pub fn last_build_tasks(&self, root: &Path) -> Option<Vec<String>> {
        self.last_build_tasks.lock().unwrap().get(root).cloned()
    }

    /// Request a cooperative stop of one invocation
    pub fn stop_build(&self, id: InvocationId) -> bool {
        if self.stopper.contains(id) {
            self.stopper.stop(id);
            true
        } else {
            false
        }
    }

    /// Whether any invocation is currently running
    pub fn is_build_running(&self) -> bool {
        self.stopper.has_active()
    }

    /// Decide whether the owning session may close.
    ///
    /// With a build running the user is prompted; electing to terminate
    /// issues the stop requests and lets the close proceed without waiting
    /// for the build to drain. Keeping a natively-debugged process alive
    /// vetoes the close entirely.
    pub fn request_close(&self) -> CloseDecision {
        if !self.stopper.has_active() {
            return CloseDecision::Proceed;
        }
        let debugging = self.debug_sessions.has_native_debug_session();
        match self.close_prompt.ask(debugging) {
            CloseAnswer::Terminate => {
                self.stopper.stop_all();
                CloseDecision::Proceed
            }
            CloseAnswer::KeepRunning | CloseAnswer::CancelClose => CloseDecision::Veto,
        }
    }
}

/// A submitted request: either short-circuited or running in the background
enum RequestHandle {
    Immediate(InvocationResult),
    Running(tokio::task::JoinHandle<Result<InvocationResult, InvokeError>>),
}

impl RequestHandle {
    async fn join(self) -> Result<InvocationResult, InvokeError> {
        match self {
            Self::Immediate(result) => Ok(result),
            Self::Running(handle) => handle
                .await
                .map_err(|e| InvokeError::Worker(e.to_string()))?,
        }
    }
}

/// Build the per-request relay, wiring restart/stop actions.
///
/// A free function so the restart action can re-enter it for the copied
/// request.
fn build_relay(
    executor: &Arc<TaskExecutor>,
    stopper: &Arc<BuildStopper>,
    sink: &Arc<dyn BuildEventSink>,
    request: &BuildRequest,
    query_outputs: bool,
) -> Arc<dyn InvocationListener> {
    let id = request.id();
    let stop_stopper = Arc::clone(stopper);
    let stop = move || stop_stopper.stop(id);

    let restart_executor = Arc::clone(executor);
    let restart_stopper = Arc::clone(stopper);
    let restart_sink = Arc::clone(sink);
    let name = execution_name(request);
    let root = request.root_path().to_path_buf();
    let activate_on_failure = !request.suppress_failure_ui();
    let delegate = request.listener().cloned();
    let original = request.clone();
    let restart = move || {
        let copy = original.copied();
        let relay = build_relay(&restart_executor, &restart_stopper, &restart_sink, &copy, query_outputs);
        let handle = restart_executor.execute(copy, query_outputs, Arc::clone(&restart_stopper), relay);
        drop(handle);
    };

    Arc::new(EventRelay::new(
        name,
        root,
        ExecutionActions::new(restart, stop),
        activate_on_failure,
        Arc::clone(sink),
        delegate,
    ))
}

/// Human-readable execution name shown with the start event
fn execution_name(request: &BuildRequest) -> String {
    let name = request
        .root_path()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| request.root_path().display().to_string());
    format!("Build {name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BuildEvent, CollectingSink};
    use crate::executor::{CompilerLock, NoRemediation, NoopSaver};
    use crate::result::BuildError;
    use crate::test_support::{Script, ScriptedBackend};
    use gantry_core::{ArtifactTasks, Module, ModuleKind, VariantModel};
    use std::time::Duration;

    struct FixedPrompt(CloseAnswer);
    impl ClosePrompt for FixedPrompt {
        fn ask(&self, _debugging: bool) -> CloseAnswer {
            self.0
        }
    }

    fn module(name: &str, root: &str, kind: ModuleKind) -> Module {
        Module {
            id: ModuleId::new(name),
            root: PathBuf::from(root),
            project_path: format!(":{}", name),
            kind,
            variant: Some(VariantModel {
                main: ArtifactTasks {
                    assemble: Some("assembleDebug".to_string()),
                    compile: Some("compileDebugSources".to_string()),
                    ide_setup: vec!["generateDebugSources".to_string()],
                },
                bundle_task: Some("bundleDebug".to_string()),
                archive_from_bundle_task: None,
                unit_test: None,
                device_test: None,
            }),
        }
    }

    fn test_workspace() -> Arc<Workspace> {
        Arc::new(Workspace::new(vec![
            module(
                "app",
                "/ws",
                ModuleKind::App {
                    dynamic_features: vec![ModuleId::new("f1"), ModuleId::new("f2")],
                },
            ),
            module("f1", "/ws", ModuleKind::DynamicFeature { host: ModuleId::new("app") }),
            module("f2", "/ws", ModuleKind::DynamicFeature { host: ModuleId::new("app") }),
            module("lib", "/other", ModuleKind::Library),
        ]))
    }

    fn invoker_with(
        backend: Arc<ScriptedBackend>,
        prompt: CloseAnswer,
    ) -> (BuildInvoker, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let executor = Arc::new(TaskExecutor::new(
            backend,
            Arc::new(CompilerLock::new("compiler")),
            Arc::new(NoopSaver),
            Arc::new(NoRemediation),
            Duration::from_millis(10),
        ));
        let invoker = BuildInvoker::new(
            test_workspace(),
            executor,
            Arc::new(BuildStopper::new()),
            sink.clone(),
            Arc::new(NoDebugSessions),
            Arc::new(FixedPrompt(prompt)),
        );
        (invoker, sink)
    }

    fn ids(modules: &[&str]) -> Vec<ModuleId> {
        modules.iter().map(|m| ModuleId::new(*m)).collect()
    }

    #[tokio::test]
    async fn test_results_preserve_submission_order() {
        let backend = Arc::new(ScriptedBackend::new());
        // Completion order is the reverse of submission order.
        backend.script("/a", Script::Succeed { delay_ms: 80, model: None });
        backend.script("/b", Script::Succeed { delay_ms: 40, model: None });
        backend.script("/c", Script::Succeed { delay_ms: 0, model: None });
        let (invoker, _) = invoker_with(backend, CloseAnswer::CancelClose);

        let requests = ["/a", "/b", "/c"]
            .into_iter()
            .map(|root| BuildRequest::builder(root, vec![":m:assemble".to_string()]).build())
            .collect();
        let result = invoker.execute_requests(requests).await.unwrap();

        let roots: Vec<PathBuf> = result.invocations.iter().map(|i| i.root.clone()).collect();
        assert_eq!(
            roots,
            vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_results() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script(
            "/b",
            Script::Fail {
                delay_ms: 0,
                diagnostics: "broken".to_string(),
            },
        );
        let (invoker, _) = invoker_with(backend, CloseAnswer::CancelClose);

        let requests = ["/a", "/b", "/c"]
            .into_iter()
            .map(|root| BuildRequest::builder(root, vec![":m:assemble".to_string()]).build())
            .collect();
        let result = invoker.execute_requests(requests).await.unwrap();

        assert!(!result.is_successful());
        assert_eq!(result.invocations.len(), 3);
        assert!(result.invocations[0].is_successful());
        assert!(matches!(
            result.invocations[1].error,
            Some(BuildError::Backend { .. })
        ));
        assert!(result.invocations[2].is_successful());
    }

    #[tokio::test]
    async fn test_empty_task_list_short_circuits() {
        let backend = Arc::new(ScriptedBackend::new());
        let (invoker, sink) = invoker_with(backend.clone(), CloseAnswer::CancelClose);

        let request = BuildRequest::builder("/ws", Vec::new()).build();
        let result = invoker.execute_request(request).await.unwrap();

        assert!(result.is_successful());
        assert_eq!(backend.call_count(), 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_assemble_builds_app_and_features_in_one_invocation() {
        let backend = Arc::new(ScriptedBackend::new());
        let (invoker, sink) = invoker_with(backend.clone(), CloseAnswer::CancelClose);

        let result = invoker
            .assemble(&ids(&["app"]), TestScope::None)
            .await
            .unwrap();

        assert_eq!(result.mode, BuildMode::Assemble);
        assert!(result.is_successful());
        assert_eq!(result.result.invocations.len(), 1);
        let invocation = &result.result.invocations[0];
        assert_eq!(invocation.root, PathBuf::from("/ws"));
        assert_eq!(
            invocation.tasks,
            vec![
                ":app:assembleDebug".to_string(),
                ":f1:assembleDebug".to_string(),
                ":f2:assembleDebug".to_string(),
            ]
        );

        // Packaging invocations carry the output query.
        assert!(backend.recorded()[0].query_outputs);
        // Exactly one start and one terminal event reached the sink.
        let events = sink.events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, BuildEvent::Started { .. }))
                .count(),
            1
        );
        assert_eq!(sink.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_runs_clean_before_regular_tasks() {
        let backend = Arc::new(ScriptedBackend::new());
        let (invoker, _) = invoker_with(backend.clone(), CloseAnswer::CancelClose);

        let result = invoker.rebuild().await.unwrap();
        assert!(result.is_successful());

        let recorded = backend.recorded();
        // Two roots: each gets one clean invocation, then one regular.
        assert_eq!(recorded.len(), 4);
        let clean_calls: Vec<_> = recorded.iter().take(2).collect();
        assert!(clean_calls.iter().all(|r| r.tasks == vec!["clean".to_string()]));
        let regular_calls: Vec<_> = recorded.iter().skip(2).collect();
        assert!(regular_calls.iter().all(|r| !r.tasks.contains(&"clean".to_string())));
    }

    #[tokio::test]
    async fn test_rebuild_with_temp_args_replays_last_tasks() {
        let backend = Arc::new(ScriptedBackend::new());
        let (invoker, _) = invoker_with(backend.clone(), CloseAnswer::CancelClose);

        invoker
            .assemble(&ids(&["lib"]), TestScope::None)
            .await
            .unwrap();
        let remembered = invoker.last_build_tasks(Path::new("/other")).unwrap();
        assert_eq!(remembered, vec![":lib:assembleDebug".to_string()]);

        invoker
            .rebuild_with_temp_args(Path::new("/other"), vec!["--stacktrace".to_string()])
            .await
            .unwrap();

        let recorded = backend.recorded();
        let replay = &recorded[recorded.len() - 1];
        assert_eq!(replay.tasks, vec![":lib:assembleDebug".to_string()]);
        assert!(replay.args.contains(&"--stacktrace".to_string()));

        // One-shot arguments are not reused by later invocations.
        invoker
            .assemble(&ids(&["lib"]), TestScope::None)
            .await
            .unwrap();
        let recorded = backend.recorded();
        let last = &recorded[recorded.len() - 1];
        assert!(!last.args.contains(&"--stacktrace".to_string()));
    }

    #[tokio::test]
    async fn test_clean_requests_do_not_overwrite_last_tasks() {
        let backend = Arc::new(ScriptedBackend::new());
        let (invoker, _) = invoker_with(backend, CloseAnswer::CancelClose);

        invoker
            .assemble(&ids(&["lib"]), TestScope::None)
            .await
            .unwrap();
        invoker.clean_project().await.unwrap();

        let remembered = invoker.last_build_tasks(Path::new("/other")).unwrap();
        assert_eq!(remembered, vec![":lib:assembleDebug".to_string()]);
    }

    #[tokio::test]
    async fn test_resolution_gap_yields_empty_result() {
        let backend = Arc::new(ScriptedBackend::new());
        let (invoker, _) = invoker_with(backend.clone(), CloseAnswer::CancelClose);

        let result = invoker.generate_sources(&ids(&["ghost"])).await.unwrap();
        assert!(result.is_empty());
        assert!(result.is_successful());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_close_with_no_build_proceeds() {
        let backend = Arc::new(ScriptedBackend::new());
        let (invoker, _) = invoker_with(backend, CloseAnswer::CancelClose);
        assert_eq!(invoker.request_close(), CloseDecision::Proceed);
    }

    #[tokio::test]
    async fn test_close_veto_while_build_runs() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script("/ws", Script::WaitForToken);
        let (invoker, _) = invoker_with(backend, CloseAnswer::CancelClose);

        let request = BuildRequest::builder("/ws", vec![":app:assembleDebug".to_string()]).build();
        let id = request.id();
        let handle = invoker.submit_request(request, false);

        while !invoker.is_build_running() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(invoker.request_close(), CloseDecision::Veto);
        assert!(invoker.is_build_running());

        // Drain the build so the test ends cleanly.
        invoker.stop_build(id);
        let result = handle.join().await.unwrap();
        assert!(result.is_cancelled());
    }

    #[tokio::test]
    async fn test_close_terminate_stops_build_and_proceeds() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script("/ws", Script::WaitForToken);
        let (invoker, _) = invoker_with(backend, CloseAnswer::Terminate);

        let request = BuildRequest::builder("/ws", vec![":app:assembleDebug".to_string()]).build();
        let handle = invoker.submit_request(request, false);

        while !invoker.is_build_running() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(invoker.request_close(), CloseDecision::Proceed);

        let result = handle.join().await.unwrap();
        assert!(result.is_cancelled());
    }

    #[tokio::test]
    async fn test_stop_build_reports_unknown_id() {
        let backend = Arc::new(ScriptedBackend::new());
        let (invoker, _) = invoker_with(backend, CloseAnswer::CancelClose);
        assert!(!invoker.stop_build(crate::request::InvocationId::mint()));
    }

    #[tokio::test]
    async fn test_restart_action_resubmits_equivalent_request() {
        let backend = Arc::new(ScriptedBackend::new());
        let (invoker, sink) = invoker_with(backend.clone(), CloseAnswer::CancelClose);

        let request = BuildRequest::builder("/ws", vec![":app:assembleDebug".to_string()]).build();
        invoker.execute_request(request).await.unwrap();
        assert_eq!(backend.call_count(), 1);

        let events = sink.events();
        let actions = events
            .iter()
            .find_map(|e| match e {
                BuildEvent::Started { actions, .. } => Some(actions.clone()),
                _ => None,
            })
            .unwrap();

        actions.restart();
        // The restarted invocation runs detached; wait for it to land.
        while backend.call_count() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let recorded = backend.recorded();
        assert_eq!(recorded[0].tasks, recorded[1].tasks);
    }
}
