//! Build request model
//!
//! A request describes exactly one backend invocation. It is constructed
//! through a builder, never mutated afterwards, and discarded once its
//! result is produced; derived requests (restart, temporary flags) are made
//! by copying under a fresh id.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gantry_core::BuildMode;

use crate::events::InvocationListener;

static NEXT_INVOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier minted per invocation attempt; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvocationId(u64);

impl InvocationId {
    /// Mint a fresh id
    pub fn mint() -> Self {
        Self(NEXT_INVOCATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "build-{}", self.0)
    }
}

/// An immutable description of one backend invocation
#[derive(Clone)]
pub struct BuildRequest {
    id: InvocationId,
    root_path: PathBuf,
    tasks: Vec<String>,
    mode: Option<BuildMode>,
    jvm_args: Vec<String>,
    command_line_args: Vec<String>,
    env: HashMap<String, String>,
    pass_parent_env: bool,
    wait_for_completion: bool,
    suppress_failure_ui: bool,
    listener: Option<Arc<dyn InvocationListener>>,
}

impl BuildRequest {
    /// Start building a request for a root and task list
    pub fn builder(root_path: impl Into<PathBuf>, tasks: Vec<String>) -> BuildRequestBuilder {
        BuildRequestBuilder {
            request: BuildRequest {
                id: InvocationId::mint(),
                root_path: root_path.into(),
                tasks,
                mode: None,
                jvm_args: Vec::new(),
                command_line_args: Vec::new(),
                env: HashMap::new(),
                pass_parent_env: true,
                wait_for_completion: false,
                suppress_failure_ui: false,
                listener: None,
            },
        }
    }

    /// Derive an equivalent request under a fresh id
    pub fn copied(&self) -> Self {
        let mut copy = self.clone();
        copy.id = InvocationId::mint();
        copy
    }

    /// Invocation id
    pub fn id(&self) -> InvocationId {
        self.id
    }

    /// Build root this request runs against
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Backend task paths, in submission order
    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    /// Originating build mode, when known
    pub fn mode(&self) -> Option<BuildMode> {
        self.mode
    }

    /// JVM arguments for the backend daemon
    pub fn jvm_args(&self) -> &[String] {
        &self.jvm_args
    }

    /// Extra command-line arguments
    pub fn command_line_args(&self) -> &[String] {
        &self.command_line_args
    }

    /// Environment overrides
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Whether the parent process environment is inherited
    pub fn pass_parent_env(&self) -> bool {
        self.pass_parent_env
    }

    /// Whether the submitting caller blocks on this invocation
    pub fn wait_for_completion(&self) -> bool {
        self.wait_for_completion
    }

    /// Whether failure UI should stay closed for this invocation
    pub fn suppress_failure_ui(&self) -> bool {
        self.suppress_failure_ui
    }

    /// Additional per-request listener
    pub fn listener(&self) -> Option<&Arc<dyn InvocationListener>> {
        self.listener.as_ref()
    }
}

impl fmt::Debug for BuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildRequest")
            .field("id", &self.id)
            .field("root_path", &self.root_path)
            .field("tasks", &self.tasks)
            .field("mode", &self.mode)
            .field("jvm_args", &self.jvm_args)
            .field("command_line_args", &self.command_line_args)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BuildRequest {
    // Identity fields only; ids and listeners differ between equivalent
    // requests by construction.
    fn eq(&self, other: &Self) -> bool {
        self.root_path == other.root_path
            && self.tasks == other.tasks
            && self.jvm_args == other.jvm_args
            && self.command_line_args == other.command_line_args
    }
}

impl Eq for BuildRequest {}

/// Builder for [`BuildRequest`]
pub struct BuildRequestBuilder {
    request: BuildRequest,
}

impl BuildRequestBuilder {
    /// Set the originating build mode
    pub fn mode(mut self, mode: BuildMode) -> Self {
        self.request.mode = Some(mode);
        self
    }

    /// Set JVM arguments
    pub fn jvm_args(mut self, args: Vec<String>) -> Self {
        self.request.jvm_args = args;
        self
    }

    /// Set command-line arguments
    pub fn command_line_args(mut self, args: Vec<String>) -> Self {
        self.request.command_line_args = args;
        self
    }

    /// Add environment variables
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.request.env.extend(env);
        self
    }

    /// Control inheritance of the parent process environment
    pub fn pass_parent_env(mut self, pass: bool) -> Self {
        self.request.pass_parent_env = pass;
        self
    }

    /// Make the submitting caller block on this invocation
    pub fn wait_for_completion(mut self, wait: bool) -> Self {
        self.request.wait_for_completion = wait;
        self
    }

    /// Keep failure UI closed for this invocation
    pub fn suppress_failure_ui(mut self, suppress: bool) -> Self {
        self.request.suppress_failure_ui = suppress;
        self
    }

    /// Attach a per-request listener
    pub fn listener(mut self, listener: Arc<dyn InvocationListener>) -> Self {
        self.request.listener = Some(listener);
        self
    }

    /// Finish the request
    pub fn build(self) -> BuildRequest {
        self.request
    }
}
