//! Gantry Resolver - Task resolution engine
//!
//! Given a set of modules and a build mode, computes the minimal set of
//! backend task names to run, grouped by build root, including transitive
//! implicit targets (dynamic features of an app, modules exercised by a
//! test-only module, the host of a device-tested feature).

pub mod entry;
pub mod expansion;
pub mod resolver;

pub use entry::{ModuleTasks, ResolveEntry, RootedTask};
pub use resolver::{TaskResolver, CLEAN_TASK_NAME};
