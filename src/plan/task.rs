// src/plan/task.rs

//! Orchestrator-level task description.

use std::path::PathBuf;
use std::time::Duration;

use crate::fingerprint::FingerprintInput;

/// Task identifier, `"<instance>:<step>"`.
pub type TaskId = String;

/// Build the identifier for `step` of `instance`.
pub fn task_id(instance: &str, step: &str) -> TaskId {
    format!("{instance}:{step}")
}

/// What a task does when it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    /// Send the file's text to the remote shell verbatim. The file is read
    /// when the task runs, not when the plan is built.
    RemoteScript { path: PathBuf },
    /// A synthesized snippet for the remote shell.
    RemoteCommand { command: String },
    /// Materialize `contents` at `path` on the remote host (heredoc write).
    WriteFile { path: String, contents: String },
    /// Transfer a local directory tree to the remote host (controller-side).
    SyncDir { local: PathBuf, remote: String },
    /// Reboot the host. Losing the connection is the expected outcome.
    Reboot,
    /// Wait `delay`, then probe the host every `poll_interval` until it
    /// answers.
    Settle { delay: Duration, poll_interval: Duration },
}

impl TaskAction {
    /// Short label for logs and dry-run output.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskAction::RemoteScript { .. } => "remote-script",
            TaskAction::RemoteCommand { .. } => "remote-command",
            TaskAction::WriteFile { .. } => "write-file",
            TaskAction::SyncDir { .. } => "sync-dir",
            TaskAction::Reboot => "reboot",
            TaskAction::Settle { .. } => "settle",
        }
    }
}

/// Whether a task may be skipped on a repeat run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangePolicy {
    /// Skip when the signature over these inputs matches the recorded one.
    Tracked(Vec<FingerprintInput>),
    /// Run on every invocation (an idempotent verification step).
    Always,
}

/// One step of a plan with its declared predecessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: TaskId,
    pub action: TaskAction,
    /// Tasks that must be `Succeeded` or `Skipped` before this one starts.
    pub after: Vec<TaskId>,
    pub change: ChangePolicy,
    pub timeout: Duration,
}

impl TaskSpec {
    pub fn new(id: impl Into<TaskId>, action: TaskAction, timeout: Duration) -> Self {
        Self {
            id: id.into(),
            action,
            after: Vec::new(),
            change: ChangePolicy::Always,
            timeout,
        }
    }

    pub fn after<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.after.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn tracked(mut self, inputs: Vec<FingerprintInput>) -> Self {
        self.change = ChangePolicy::Tracked(inputs);
        self
    }
}
