//! Implicit-expansion policy
//!
//! Modules can require other modules to be built for product reasons that
//! are not build-graph edges: an application packages its dynamic features,
//! a test-only module exercises modules its own task graph does not pull in,
//! and a device-tested feature needs its host's shared setup tasks. The
//! policy lives here, apart from the queue mechanics, so each rule is
//! testable on its own.

use gantry_core::{BuildMode, ModuleKind, TestScope, Workspace};

use crate::entry::ResolveEntry;

/// Whether a mode pulls in implicit dependents at all.
///
/// Packaging modes expand. Clean, source-gen and compile do not: there is
/// nothing to gain from cleaning or compiling modules that would only be
/// pulled in for packaging. Rebuild expands exactly like assemble.
pub fn expands(mode: BuildMode) -> bool {
    mode.is_packaging()
}

/// Compute the implicit dependents of one entry.
///
/// Pure with respect to the workspace snapshot; returns entries in the
/// order they should be prepended to the work queue. An unknown module
/// expands to nothing.
pub fn expand_entry(entry: &ResolveEntry, workspace: &Workspace) -> Vec<ResolveEntry> {
    if !entry.expand || !expands(entry.mode) {
        return Vec::new();
    }

    let Some(module) = workspace.module(&entry.module) else {
        return Vec::new();
    };

    match &module.kind {
        // Dynamic features ship inside the app's artifact but are not
        // dependencies of it; packaging the app must package them too.
        ModuleKind::App { dynamic_features } => dynamic_features
            .iter()
            .map(|id| ResolveEntry::new(id.clone(), entry.mode, entry.tests))
            .collect(),

        // A test module's own task graph does not build what it tests.
        ModuleKind::TestOnly { tested } => tested
            .iter()
            .map(|id| ResolveEntry::new(id.clone(), entry.mode, entry.tests))
            .collect(),

        // Device tests of a feature run against the host, which carries the
        // shared setup tasks. Host/feature links form a tree, so recursing
        // through the queue terminates; the visited set bounds it anyway.
        ModuleKind::DynamicFeature { host } if entry.tests.includes_device() => {
            vec![ResolveEntry::new(host.clone(), entry.mode, entry.tests)]
        }

        _ => Vec::new(),
    }
}
