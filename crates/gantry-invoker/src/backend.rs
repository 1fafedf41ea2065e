//! Backend connection
//!
//! The external build backend is reached through the [`BuildBackend`] trait:
//! one operation per invocation, scoped to a build root, streaming output
//! through a callback and honoring a cancellation token. [`ProcessBackend`]
//! is the production implementation driving the backend executable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use gantry_core::config::BackendConfig;

/// Environment variable carrying JVM arguments to the backend launcher
const JVM_ARGS_ENV: &str = "JAVA_OPTS";

/// Errors surfaced by a backend operation
#[derive(Debug, Error)]
pub enum BackendError {
    /// The operation was cancelled through its token
    #[error("build cancelled")]
    Cancelled,

    /// The backend ran and reported a build failure
    #[error("build failed: {diagnostics}")]
    Build {
        /// Diagnostic text, typically the backend's stderr tail
        diagnostics: String,
    },

    /// The backend could not be reached or started
    #[error("failed to reach the build backend: {0}")]
    Connection(String),
}

/// Status and output events streamed during one operation
pub trait BackendEvents: Send + Sync {
    /// A line of backend output
    fn on_output(&self, line: &str, stderr: bool);

    /// A progress/status change
    fn on_status(&self, _message: &str) {}
}

/// One "run tasks" operation, optionally carrying the output query
pub struct BackendSpec {
    /// Build root to run against
    pub root: PathBuf,
    /// Task paths, in order
    pub tasks: Vec<String>,
    /// JVM arguments for the backend daemon
    pub jvm_args: Vec<String>,
    /// Extra command-line arguments, before the task list
    pub args: Vec<String>,
    /// Environment overrides
    pub env: HashMap<String, String>,
    /// Whether the parent environment is inherited
    pub pass_parent_env: bool,
    /// Ask the backend to also report produced artifacts
    pub query_outputs: bool,
    /// Cooperative cancellation handle
    pub token: CancellationToken,
    /// Stream consumer
    pub events: Arc<dyn BackendEvents>,
}

/// Connection to the external build backend
#[async_trait]
pub trait BuildBackend: Send + Sync {
    /// Run one operation to completion.
    ///
    /// Returns the backend-model payload when the output query was
    /// requested and the backend produced one.
    async fn execute(&self, spec: BackendSpec) -> Result<Option<serde_json::Value>, BackendError>;
}

/// Backend implementation spawning the backend executable per invocation
pub struct ProcessBackend {
    config: BackendConfig,
}

impl ProcessBackend {
    /// Create a backend from configuration
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    /// Locate the backend executable for a build root.
    ///
    /// An explicit configured path wins; otherwise a wrapper script inside
    /// the root is preferred over a PATH lookup.
    fn locate_executable(&self, root: &Path) -> Result<PathBuf, BackendError> {
        if let Some(path) = &self.config.executable_path {
            return Ok(path.clone());
        }
        let local = root.join(&self.config.executable);
        if local.exists() {
            return Ok(local);
        }
        which::which(&self.config.executable).map_err(|e| {
            BackendError::Connection(format!(
                "backend executable '{}' not found: {}",
                self.config.executable, e
            ))
        })
    }
}

#[async_trait]
impl BuildBackend for ProcessBackend {
    async fn execute(&self, spec: BackendSpec) -> Result<Option<serde_json::Value>, BackendError> {
        let executable = self.locate_executable(&spec.root)?;
        info!(
            executable = %executable.display(),
            root = %spec.root.display(),
            tasks = ?spec.tasks,
            "invoking backend"
        );

        let mut command = Command::new(&executable);
        command
            .current_dir(&spec.root)
            .args(&self.config.default_arguments)
            .args(&spec.args);
        if spec.query_outputs {
            command.arg(&self.config.query_outputs_flag);
        }
        command.args(&spec.tasks);

        if !spec.pass_parent_env {
            command.env_clear();
        }
        command.envs(&spec.env);
        if !spec.jvm_args.is_empty() {
            command.env(JVM_ARGS_ENV, spec.jvm_args.join(" "));
        }

        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        command.kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| BackendError::Connection(format!("failed to spawn backend: {e}")))?;

        let stdout_task = child
            .stdout
            .take()
            .map(|out| spawn_line_reader(out, spec.events.clone(), false));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| spawn_line_reader(err, spec.events.clone(), true));

        let status = tokio::select! {
            status = child.wait() => {
                status.map_err(|e| BackendError::Connection(format!("failed to wait for backend: {e}")))?
            }
            () = spec.token.cancelled() => {
                // Ask the child to stop and wait for it to acknowledge
                // before reporting the invocation as cancelled.
                debug!("cancellation requested, stopping backend process");
                let _ = child.start_kill();
                let _ = child.wait().await;
                drain(stdout_task).await;
                drain(stderr_task).await;
                return Err(BackendError::Cancelled);
            }
        };

        let stdout_lines = drain(stdout_task).await;
        let stderr_lines = drain(stderr_task).await;

        if spec.token.is_cancelled() {
            return Err(BackendError::Cancelled);
        }

        if status.success() {
            let model = if spec.query_outputs {
                parse_artifact_manifest(&stdout_lines)
            } else {
                None
            };
            Ok(model)
        } else {
            let code = status.code().unwrap_or(-1);
            let diagnostics = if stderr_lines.is_empty() {
                format!("backend exited with code {code}")
            } else {
                stderr_lines.join("\n")
            };
            Err(BackendError::Build { diagnostics })
        }
    }
}

/// Stream lines from a pipe to the event consumer, keeping them for
/// diagnostics and manifest parsing
fn spawn_line_reader(
    pipe: impl AsyncRead + Unpin + Send + 'static,
    events: Arc<dyn BackendEvents>,
    stderr: bool,
) -> tokio::task::JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        let mut collected = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            events.on_output(&line, stderr);
            collected.push(line);
        }
        collected
    })
}

async fn drain(task: Option<tokio::task::JoinHandle<Vec<String>>>) -> Vec<String> {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => Vec::new(),
    }
}

/// The artifact manifest is the last stdout line that parses as a JSON
/// object; earlier lines are regular build output.
fn parse_artifact_manifest(stdout_lines: &[String]) -> Option<serde_json::Value> {
    stdout_lines
        .iter()
        .rev()
        .find_map(|line| serde_json::from_str::<serde_json::Value>(line).ok().filter(serde_json::Value::is_object))
}
