//! Scriptable backend for orchestration tests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{BackendError, BackendSpec, BuildBackend};

/// What a scripted backend does for one root
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Complete successfully after a delay
    Succeed {
        delay_ms: u64,
        model: Option<serde_json::Value>,
    },
    /// Report a build failure after a delay
    Fail { delay_ms: u64, diagnostics: String },
    /// Throw the backend's cancellation error immediately
    CancelledByBackend,
    /// Run until the token is cancelled, then acknowledge
    WaitForToken,
    /// Fail before the build starts
    ConnectionRefused,
}

/// What one operation asked for, kept for assertions
#[derive(Debug, Clone)]
pub(crate) struct RecordedSpec {
    pub(crate) root: PathBuf,
    pub(crate) tasks: Vec<String>,
    pub(crate) args: Vec<String>,
    pub(crate) query_outputs: bool,
}

/// In-memory backend whose behavior is scripted per build root.
///
/// Roots without a script succeed immediately.
pub(crate) struct ScriptedBackend {
    scripts: Mutex<HashMap<PathBuf, Script>>,
    recorded: Mutex<Vec<RecordedSpec>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            recorded: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn script(&self, root: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(PathBuf::from(root), script);
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn recorded(&self) -> Vec<RecordedSpec> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildBackend for ScriptedBackend {
    async fn execute(&self, spec: BackendSpec) -> Result<Option<serde_json::Value>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().push(RecordedSpec {
            root: spec.root.clone(),
            tasks: spec.tasks.clone(),
            args: spec.args.clone(),
            query_outputs: spec.query_outputs,
        });
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&spec.root)
            .cloned()
            .unwrap_or(Script::Succeed {
                delay_ms: 0,
                model: None,
            });

        match script {
            Script::Succeed { delay_ms, model } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                spec.events.on_output("BUILD SUCCESSFUL", false);
                Ok(model)
            }
            Script::Fail {
                delay_ms,
                diagnostics,
            } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                spec.events.on_output(&diagnostics, true);
                Err(BackendError::Build { diagnostics })
            }
            Script::CancelledByBackend => Err(BackendError::Cancelled),
            Script::WaitForToken => {
                spec.token.cancelled().await;
                Err(BackendError::Cancelled)
            }
            Script::ConnectionRefused => {
                Err(BackendError::Connection("connection refused".to_string()))
            }
        }
    }
}
