//! Invocation results

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use gantry_core::BuildMode;

/// What went wrong with one invocation
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BuildError {
    /// The backend reported a build failure
    #[error("build failed: {diagnostics}")]
    Backend {
        /// Diagnostic text from the backend
        diagnostics: String,
    },

    /// The invocation was cooperatively cancelled; shown as a neutral
    /// outcome, never counted as an error
    #[error("build cancelled")]
    Cancelled,

    /// The configured build runtime is unusable; user-actionable
    #[error("build runtime is misconfigured: {message}")]
    RuntimeMisconfigured {
        /// Root-cause message from the backend
        message: String,
    },
}

impl BuildError {
    /// Whether this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Outcome of exactly one build request
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    /// Build root the request ran against
    pub root: PathBuf,
    /// Task list that was run
    pub tasks: Vec<String>,
    /// Failure, when the build did not succeed
    pub error: Option<BuildError>,
    /// Opaque backend-model payload, when the invocation carried an
    /// output query
    pub model: Option<serde_json::Value>,
}

impl InvocationResult {
    /// A successful result
    pub fn success(
        root: impl Into<PathBuf>,
        tasks: Vec<String>,
        model: Option<serde_json::Value>,
    ) -> Self {
        Self {
            root: root.into(),
            tasks,
            error: None,
            model,
        }
    }

    /// A failed (or cancelled) result
    pub fn failure(root: impl Into<PathBuf>, tasks: Vec<String>, error: BuildError) -> Self {
        Self {
            root: root.into(),
            tasks,
            error: Some(error),
            model: None,
        }
    }

    /// Absence of error is success
    pub fn is_successful(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the invocation was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(BuildError::is_cancelled)
    }
}

/// Composed outcome of several concurrently executed requests.
///
/// Invocations appear in submission order regardless of completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MultiInvocationResult {
    /// One result per submitted request
    pub invocations: Vec<InvocationResult>,
}

impl MultiInvocationResult {
    /// Compose results, preserving the given order
    pub fn new(invocations: Vec<InvocationResult>) -> Self {
        Self { invocations }
    }

    /// All invocations succeeded
    pub fn is_successful(&self) -> bool {
        self.invocations.iter().all(InvocationResult::is_successful)
    }

    /// Every invocation was cancelled
    pub fn is_cancelled(&self) -> bool {
        !self.invocations.is_empty() && self.invocations.iter().all(InvocationResult::is_cancelled)
    }

    /// Whether nothing was invoked at all
    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    /// Concatenate two aggregates, keeping order
    pub fn concat(mut self, other: MultiInvocationResult) -> Self {
        self.invocations.extend(other.invocations);
        self
    }
}

/// A packaging-mode aggregate, tagged with the originating mode.
///
/// The underlying requests carried the backend output query, so each
/// invocation's `model` describes the produced artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct AssembleResult {
    /// The composed invocation results
    pub result: MultiInvocationResult,
    /// The packaging mode that produced them
    pub mode: BuildMode,
}

impl AssembleResult {
    /// Tag an aggregate with its packaging mode
    pub fn new(result: MultiInvocationResult, mode: BuildMode) -> Self {
        Self { result, mode }
    }

    /// All invocations succeeded
    pub fn is_successful(&self) -> bool {
        self.result.is_successful()
    }
}
