//! Resolution units: queue entries and grouped output

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use serde::Serialize;

use gantry_core::{BuildMode, ModuleId, TestScope};

/// One unit of resolution work: build this module in this mode.
///
/// Equality and hashing cover (module, mode, tests) only; the `expand` flag
/// is a traversal control, not part of the identity used for dedup.
#[derive(Debug, Clone)]
pub struct ResolveEntry {
    /// Module to resolve tasks for
    pub module: ModuleId,
    /// Requested build mode
    pub mode: BuildMode,
    /// Which test compilation units to include
    pub tests: TestScope,
    /// Whether implicit dependents of this entry are pulled in
    pub expand: bool,
}

impl ResolveEntry {
    /// Create an entry that participates in implicit expansion
    pub fn new(module: impl Into<ModuleId>, mode: BuildMode, tests: TestScope) -> Self {
        Self {
            module: module.into(),
            mode,
            tests,
            expand: true,
        }
    }

    /// Create an entry that is resolved as-is, with no implicit dependents
    pub fn without_expansion(module: impl Into<ModuleId>, mode: BuildMode, tests: TestScope) -> Self {
        Self {
            expand: false,
            ..Self::new(module, mode, tests)
        }
    }
}

impl PartialEq for ResolveEntry {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.mode == other.mode && self.tests == other.tests
    }
}

impl Eq for ResolveEntry {}

impl Hash for ResolveEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.module.hash(state);
        self.mode.hash(state);
        self.tests.hash(state);
    }
}

/// A fully-qualified task path owned by exactly one build root.
///
/// The atomic unit the resolver emits before grouping; tasks are never
/// merged across roots into a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootedTask {
    /// Build root owning the task
    pub root: PathBuf,
    /// Fully-qualified task path (":app:assembleDebug")
    pub task_path: String,
}

impl RootedTask {
    /// Create a rooted task
    pub fn new(root: impl Into<PathBuf>, task_path: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            task_path: task_path.into(),
        }
    }
}

/// Resolved tasks for one build root.
///
/// Clean tasks are tracked apart from regular tasks because clean must run
/// as a strictly preceding, separate invocation against the same root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleTasks {
    /// Build root these tasks belong to
    pub root: PathBuf,
    /// Tasks that must run in a preceding clean invocation
    pub clean_tasks: BTreeSet<String>,
    /// Regular build tasks
    pub tasks: BTreeSet<String>,
}

impl ModuleTasks {
    /// Create an empty grouping for a root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clean_tasks: BTreeSet::new(),
            tasks: BTreeSet::new(),
        }
    }

    /// Whether neither bucket holds any task
    pub fn is_empty(&self) -> bool {
        self.clean_tasks.is_empty() && self.tasks.is_empty()
    }

    /// Regular tasks in deterministic order
    pub fn task_list(&self) -> Vec<String> {
        self.tasks.iter().cloned().collect()
    }

    /// Clean tasks in deterministic order
    pub fn clean_task_list(&self) -> Vec<String> {
        self.clean_tasks.iter().cloned().collect()
    }
}
