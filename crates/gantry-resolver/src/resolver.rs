//! Work-queue task resolution
//!
//! Seeds a queue with the requested (module, mode, tests) entries and
//! repeatedly pops one, skipping already-visited identities, computing the
//! module's own task names and prepending its implicit expansions so that
//! expansions of expansions are discovered before sibling requests.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use gantry_core::{ArtifactTasks, BuildMode, Module, ModuleId, ModuleKind, TestScope, VariantModel, Workspace};

use crate::entry::{ModuleTasks, ResolveEntry, RootedTask};
use crate::expansion;

/// Backend task that deletes build outputs; scheduled as its own
/// invocation ahead of regular tasks for the same root.
pub const CLEAN_TASK_NAME: &str = "clean";

/// Fallback packaging task for modules without a variant model
const DEFAULT_ASSEMBLE_TASK: &str = "assemble";

/// Fallback compile task for modules without a variant model
const DEFAULT_COMPILE_TASK: &str = "classes";

/// Fallback unit-test compile task for modules without a variant model
const DEFAULT_TEST_CLASSES_TASK: &str = "testClasses";

/// Resolves modules + build mode into per-root task groupings
pub struct TaskResolver {
    workspace: Arc<Workspace>,
}

impl TaskResolver {
    /// Create a resolver over a workspace snapshot
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    /// Resolve tasks for a set of modules under one mode and test scope
    pub fn resolve_modules(
        &self,
        modules: &[ModuleId],
        mode: BuildMode,
        tests: TestScope,
    ) -> BTreeMap<PathBuf, ModuleTasks> {
        let seed = modules
            .iter()
            .map(|id| ResolveEntry::new(id.clone(), mode, tests))
            .collect();
        self.resolve(seed)
    }

    /// Resolve tasks for explicit entries.
    ///
    /// An unresolvable module contributes nothing and never blocks the
    /// others; an empty aggregate map is a valid result, not an error.
    #[instrument(skip_all, fields(seed = seed.len()))]
    pub fn resolve(&self, seed: Vec<ResolveEntry>) -> BTreeMap<PathBuf, ModuleTasks> {
        let mut queue: VecDeque<ResolveEntry> = seed.into();
        let mut visited: HashSet<ResolveEntry> = HashSet::new();
        let mut grouped: BTreeMap<PathBuf, ModuleTasks> = BTreeMap::new();

        while let Some(entry) = queue.pop_front() {
            if !visited.insert(entry.clone()) {
                continue;
            }

            // Depth-first bias: prepend expansions, preserving their order.
            let expanded = expansion::expand_entry(&entry, &self.workspace);
            for implicit in expanded.into_iter().rev() {
                queue.push_front(implicit);
            }

            let Some(module) = self.workspace.module(&entry.module) else {
                debug!(module = %entry.module, "module not in workspace, skipping");
                continue;
            };

            let tasks = Self::module_tasks(module, entry.mode, entry.tests);
            if tasks.is_empty() {
                continue;
            }

            let group = grouped
                .entry(module.root.clone())
                .or_insert_with(|| ModuleTasks::new(&module.root));
            for task in tasks {
                group.tasks.insert(task.task_path);
            }
            if entry.mode == BuildMode::Rebuild {
                group.clean_tasks.insert(CLEAN_TASK_NAME.to_string());
            }
        }

        if grouped.is_empty() {
            info!("no tasks found for requested modules");
        } else {
            info!(
                roots = grouped.len(),
                tasks = grouped.values().map(|g| g.tasks.len()).sum::<usize>(),
                "tasks resolved"
            );
        }
        grouped
    }

    /// Task names one module contributes under a mode, fully qualified
    fn module_tasks(module: &Module, mode: BuildMode, tests: TestScope) -> Vec<RootedTask> {
        let names = match &module.variant {
            Some(variant) => Self::variant_task_names(variant, mode, tests),
            None if module.kind == ModuleKind::Plain => Self::fallback_task_names(mode, tests),
            None => Vec::new(),
        };
        names
            .into_iter()
            .map(|name| RootedTask::new(module.root.clone(), module.task_path(&name)))
            .collect()
    }

    /// Task names from variant metadata
    fn variant_task_names(variant: &VariantModel, mode: BuildMode, tests: TestScope) -> Vec<String> {
        let mut names = Vec::new();
        match mode {
            BuildMode::Clean | BuildMode::SourceGen => {
                names.extend(variant.main.ide_setup.iter().cloned());
                for artifact in Self::selected_test_artifacts(variant, tests) {
                    names.extend(artifact.ide_setup.iter().cloned());
                }
            }
            BuildMode::Assemble | BuildMode::Rebuild => {
                names.extend(variant.main.assemble.iter().cloned());
                if tests != TestScope::None {
                    for artifact in Self::selected_test_artifacts(variant, tests) {
                        names.extend(artifact.assemble.iter().cloned());
                    }
                }
            }
            BuildMode::Bundle => {
                names.extend(variant.bundle_task.iter().cloned());
            }
            BuildMode::ArchiveFromBundle => {
                names.extend(variant.archive_from_bundle_task.iter().cloned());
            }
            BuildMode::Compile => {
                names.extend(variant.main.ide_setup.iter().cloned());
                for artifact in Self::selected_test_artifacts(variant, tests) {
                    names.extend(artifact.ide_setup.iter().cloned());
                }
                // Unit-test compilation already covers the main sources;
                // compiling them again would be wasted work.
                if tests != TestScope::Unit {
                    names.extend(variant.main.compile.iter().cloned());
                }
                for artifact in Self::selected_test_artifacts(variant, tests) {
                    names.extend(artifact.compile.iter().cloned());
                }
            }
        }
        names
    }

    /// Fixed task-name table for buildable modules without a variant model
    fn fallback_task_names(mode: BuildMode, tests: TestScope) -> Vec<String> {
        let mut names = Vec::new();
        match mode {
            BuildMode::Assemble
            | BuildMode::Rebuild
            | BuildMode::Bundle
            | BuildMode::ArchiveFromBundle => {
                names.push(DEFAULT_ASSEMBLE_TASK.to_string());
            }
            BuildMode::Compile => {
                names.push(DEFAULT_COMPILE_TASK.to_string());
                if tests.includes_unit() && tests != TestScope::None {
                    names.push(DEFAULT_TEST_CLASSES_TASK.to_string());
                }
            }
            BuildMode::Clean | BuildMode::SourceGen => {}
        }
        names
    }

    /// Test artifacts selected by scope.
    ///
    /// `None` selects every test artifact: it is the scope clean and
    /// compile-everything operations run with.
    fn selected_test_artifacts(variant: &VariantModel, tests: TestScope) -> Vec<&ArtifactTasks> {
        let mut selected = Vec::new();
        if tests.includes_unit() {
            if let Some(unit) = &variant.unit_test {
                selected.push(unit);
            }
        }
        if tests.includes_device() {
            if let Some(device) = &variant.device_test {
                selected.push(device);
            }
        }
        selected
    }
}
