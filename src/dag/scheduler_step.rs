// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::plan::{TaskId, TaskSpec};

/// Structured result of a single scheduler "step".
///
/// Tests use this to step a plan by hand and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<TaskSpec>,
    /// Tasks newly marked `Blocked` because of an upstream failure.
    pub newly_blocked: Vec<TaskId>,
    /// Whether every task is now terminal.
    pub finished: bool,
}
