// src/dag/task_info.rs

//! Task metadata and per-run state.

use crate::plan::TaskSpec;

/// Per-run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// Waiting on predecessors.
    Pending,
    /// Dispatched to the executor.
    Running,
    /// Executed and exited successfully.
    Succeeded,
    /// Signature unchanged; not executed but satisfied for dependents.
    Skipped,
    /// Executed and failed.
    Failed,
    /// Never dispatched because an upstream task failed.
    Blocked,
}

impl TaskRunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskRunState::Pending | TaskRunState::Running)
    }

    /// Whether dependents may proceed.
    pub fn satisfies_dependents(self) -> bool {
        matches!(self, TaskRunState::Succeeded | TaskRunState::Skipped)
    }
}

/// Static task information from the plan, plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub spec: TaskSpec,
    pub state: TaskRunState,
}

impl TaskInfo {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            spec,
            state: TaskRunState::Pending,
        }
    }
}
