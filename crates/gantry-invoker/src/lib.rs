//! Gantry Invoker - Build invocation orchestration
//!
//! Turns resolved task groupings into concurrent, cancellable invocations of
//! the external build backend and composes their individual results into one
//! aggregate, preserving submission order.

pub mod backend;
pub mod events;
pub mod executor;
pub mod invoker;
pub mod request;
pub mod result;
pub mod stopper;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{BackendError, BackendEvents, BackendSpec, BuildBackend, ProcessBackend};
pub use events::{
    BuildEvent, BuildEventSink, BuildOutcome, CollectingListener, CollectingSink, EventRelay,
    ExecutionActions, InvocationListener, TracingSink,
};
pub use executor::{
    CompilerLock, EditorSaver, InvocationState, InvokeError, NoRemediation, NoopSaver,
    RuntimeFixer, TaskExecutor,
};
pub use invoker::{
    BuildInvoker, CloseAnswer, CloseDecision, ClosePrompt, DebugSessionFinder, NoDebugSessions,
};
pub use request::{BuildRequest, BuildRequestBuilder, InvocationId};
pub use result::{AssembleResult, BuildError, InvocationResult, MultiInvocationResult};
pub use stopper::BuildStopper;
