// src/engine/mod.rs

//! Orchestration engine for fleetdag.
//!
//! This module ties together:
//! - the per-instance scheduler
//! - the runtime event loop that dispatches ready tasks and reacts to
//!   their completions
//! - the per-run result aggregate returned to the caller
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::fmt;

use crate::errors::FleetdagError;
use crate::plan::TaskId;

/// Terminal outcome of one dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    /// Signature unchanged since the last successful run.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Error description for failed tasks.
    pub message: Option<String>,
    /// Captured remote standard error, when there was any.
    pub stderr: String,
}

impl TaskResult {
    pub fn succeeded(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: TaskStatus::Succeeded,
            message: None,
            stderr: String::new(),
        }
    }

    pub fn skipped(id: &str) -> Self {
        Self {
            status: TaskStatus::Skipped,
            ..Self::succeeded(id)
        }
    }

    pub fn failed(id: &str, err: &FleetdagError) -> Self {
        let stderr = match err {
            FleetdagError::RemoteExecution { stderr, .. }
            | FleetdagError::Connection { stderr, .. } => stderr.clone(),
            _ => String::new(),
        };
        Self::failed_with(id, err.to_string(), stderr)
    }

    pub fn failed_with(id: &str, message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            status: TaskStatus::Failed,
            message: Some(message.into()),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Succeeded,
    /// `task` is the first task that failed.
    Failed {
        task: TaskId,
        message: String,
        stderr: String,
    },
}

/// Outcome of one instance's plan.
#[derive(Debug, Clone)]
pub struct InstanceReport {
    pub name: String,
    pub host: String,
    pub status: InstanceStatus,
    /// Results in completion order.
    pub results: Vec<TaskResult>,
    /// Tasks never dispatched because an upstream task failed.
    pub blocked: Vec<TaskId>,
    /// Tasks in the order they were dispatched.
    pub dispatch_order: Vec<TaskId>,
}

impl InstanceReport {
    pub fn is_success(&self) -> bool {
        self.status == InstanceStatus::Succeeded
    }

    pub fn result(&self, id: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn was_dispatched(&self, id: &str) -> bool {
        self.dispatch_order.iter().any(|d| d == id)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Per-run result aggregate, one entry per instance in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub instances: Vec<InstanceReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.instances.iter().all(InstanceReport::is_success)
    }

    pub fn instance(&self, name: &str) -> Option<&InstanceReport> {
        self.instances.iter().find(|i| i.name == name)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.instances {
            let summary = format!(
                "{} succeeded, {} skipped, {} failed, {} blocked",
                report.count(TaskStatus::Succeeded),
                report.count(TaskStatus::Skipped),
                report.count(TaskStatus::Failed),
                report.blocked.len()
            );
            match &report.status {
                InstanceStatus::Succeeded => {
                    writeln!(f, "{} ({}): ok [{summary}]", report.name, report.host)?;
                }
                InstanceStatus::Failed {
                    task,
                    message,
                    stderr,
                } => {
                    writeln!(f, "{} ({}): FAILED at {task} [{summary}]", report.name, report.host)?;
                    writeln!(f, "  error: {message}")?;
                    for line in stderr.lines() {
                        writeln!(f, "  stderr: {line}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Events flowing into an instance runtime.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A dispatched task reached a terminal outcome.
    TaskCompleted { result: TaskResult },
}

pub mod core;
pub mod runtime;

pub use core::{CoreCommand, CoreStep, InstanceCore};
pub use runtime::{run_fleet, InstanceRuntime};
