//! Workspace and module model
//!
//! The module model is a snapshot of what the backend reported during the
//! last sync: which modules exist, which build root owns each of them, and
//! the task names their active variant exposes. The resolver works entirely
//! from this snapshot; it never talks to the backend itself.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, WorkspaceError};

/// Separator used in backend project paths (":app:feature").
pub const PROJECT_PATH_SEPARATOR: char = ':';

/// Name of the workspace snapshot file written by the backend at sync time.
pub const SNAPSHOT_FILE_NAME: &str = "gantry-workspace.toml";

/// Unique identifier for a module within the workspace
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub String);

impl ModuleId {
    /// Create a new module id
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Module name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What a module is, as far as build orchestration is concerned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ModuleKind {
    /// An application that packages other modules' outputs
    App {
        /// Dynamic feature modules delivered as part of this app
        #[serde(default)]
        dynamic_features: Vec<ModuleId>,
    },
    /// A regular library module
    Library,
    /// A dynamic feature module delivered by a host application
    DynamicFeature {
        /// The application that hosts this feature
        host: ModuleId,
    },
    /// A module containing only tests for other modules
    TestOnly {
        /// Modules exercised by this test module
        #[serde(default)]
        tested: Vec<ModuleId>,
    },
    /// Buildable but carries no variant model; task names come from a
    /// fixed per-mode table
    Plain,
    /// Not buildable by the backend; contributes no tasks
    Opaque,
}

/// Task names exposed by one artifact (main, unit-test or device-test)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactTasks {
    /// Packaging task for this artifact
    pub assemble: Option<String>,
    /// Compilation task for this artifact
    pub compile: Option<String>,
    /// Setup tasks the IDE needs after a sync (generated sources,
    /// mockable jars); cheap when already up to date
    #[serde(default)]
    pub ide_setup: Vec<String>,
}

/// Variant metadata for a recognized module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantModel {
    /// The main artifact
    pub main: ArtifactTasks,
    /// Bundle packaging task, when the module supports bundling
    pub bundle_task: Option<String>,
    /// Task extracting installable archives from a built bundle
    pub archive_from_bundle_task: Option<String>,
    /// Unit-test artifact, when the variant has one
    pub unit_test: Option<ArtifactTasks>,
    /// Device-test artifact, when the variant has one
    pub device_test: Option<ArtifactTasks>,
}

/// One module of the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Module identity
    pub id: ModuleId,
    /// Build root that owns this module
    pub root: PathBuf,
    /// Backend project path (":app", ":libs:core")
    pub project_path: String,
    /// Orchestration-relevant kind
    pub kind: ModuleKind,
    /// Variant metadata; absent for `Plain` and `Opaque` modules
    #[serde(default)]
    pub variant: Option<VariantModel>,
}

impl Module {
    /// Qualify a bare task name with this module's project path.
    ///
    /// The root module's path is the bare separator; prefixing it verbatim
    /// would produce a double colon.
    pub fn task_path(&self, task_name: &str) -> String {
        if self.project_path == ":" {
            format!("{}{}", self.project_path, task_name)
        } else {
            format!("{}{}{}", self.project_path, PROJECT_PATH_SEPARATOR, task_name)
        }
    }
}

/// The full module model for one IDE session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workspace {
    /// All modules, keyed by id
    modules: HashMap<ModuleId, Module>,
}

impl Workspace {
    /// Create a workspace from a list of modules
    pub fn new(modules: Vec<Module>) -> Self {
        Self {
            modules: modules.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    /// Load the workspace snapshot from a directory
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SNAPSHOT_FILE_NAME);
        if !path.exists() {
            return Err(WorkspaceError::SnapshotNotFound(path).into());
        }
        debug!(path = %path.display(), "loading workspace snapshot");

        let content = std::fs::read_to_string(&path)?;
        let snapshot: Snapshot = toml::from_str(&content)
            .map_err(|e| WorkspaceError::ParseError(e.to_string()))?;

        let workspace = Self::new(snapshot.modules);
        workspace.validate()?;
        info!(
            modules = workspace.modules.len(),
            roots = workspace.roots().len(),
            "workspace snapshot loaded"
        );
        Ok(workspace)
    }

    /// Look up a module by id
    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    /// All modules
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// All module ids
    pub fn module_ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.modules.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Distinct build roots across the workspace
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.modules.values().map(|m| m.root.clone()).collect();
        roots.sort();
        roots.dedup();
        roots
    }

    /// Check that every cross-module reference resolves
    pub fn validate(&self) -> Result<()> {
        for module in self.modules.values() {
            let refs: Vec<&ModuleId> = match &module.kind {
                ModuleKind::App { dynamic_features } => dynamic_features.iter().collect(),
                ModuleKind::DynamicFeature { host } => vec![host],
                ModuleKind::TestOnly { tested } => tested.iter().collect(),
                _ => Vec::new(),
            };
            for reference in refs {
                if !self.modules.contains_key(reference) {
                    return Err(WorkspaceError::DanglingReference {
                        module: module.id.to_string(),
                        reference: reference.to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// On-disk shape of the snapshot file
#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    modules: Vec<Module>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library(name: &str, root: &str) -> Module {
        Module {
            id: ModuleId::new(name),
            root: PathBuf::from(root),
            project_path: format!(":{}", name),
            kind: ModuleKind::Library,
            variant: Some(VariantModel {
                main: ArtifactTasks {
                    assemble: Some("assembleDebug".to_string()),
                    compile: Some("compileDebugSources".to_string()),
                    ide_setup: vec![],
                },
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_task_path_qualification() {
        let module = library("core", "/ws");
        assert_eq!(module.task_path("assembleDebug"), ":core:assembleDebug");
    }

    #[test]
    fn test_task_path_root_module() {
        let mut module = library("root", "/ws");
        module.project_path = ":".to_string();
        assert_eq!(module.task_path("assemble"), ":assemble");
    }

    #[test]
    fn test_roots_deduplicated() {
        let workspace = Workspace::new(vec![
            library("a", "/ws"),
            library("b", "/ws"),
            library("c", "/other"),
        ]);
        assert_eq!(workspace.roots().len(), 2);
    }

    #[test]
    fn test_validate_dangling_reference() {
        let mut app = library("app", "/ws");
        app.kind = ModuleKind::App {
            dynamic_features: vec![ModuleId::new("missing")],
        };
        let workspace = Workspace::new(vec![app]);
        assert!(workspace.validate().is_err());
    }

    #[test]
    fn test_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let content = r#"
[[modules]]
id = "app"
root = "/ws"
project_path = ":app"

[modules.kind]
type = "app"
dynamic_features = ["feature"]

[modules.variant]
bundle_task = "bundleDebug"

[modules.variant.main]
assemble = "assembleDebug"
compile = "compileDebugSources"

[[modules]]
id = "feature"
root = "/ws"
project_path = ":feature"

[modules.kind]
type = "dynamic-feature"
host = "app"

[modules.variant]

[modules.variant.main]
assemble = "assembleDebug"
"#;
        std::fs::write(dir.path().join(SNAPSHOT_FILE_NAME), content).unwrap();

        let workspace = Workspace::load(dir.path()).unwrap();
        let app = workspace.module(&ModuleId::new("app")).unwrap();
        assert!(matches!(app.kind, ModuleKind::App { .. }));
        assert_eq!(
            app.variant.as_ref().unwrap().bundle_task.as_deref(),
            Some("bundleDebug")
        );
    }

    #[test]
    fn test_load_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Workspace::load(dir.path()).is_err());
    }
}
