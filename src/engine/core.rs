// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces commands describing what
//! the IO shell should do next. It has no channels, no Tokio types and does
//! not perform any IO, so it can be unit tested by hand.

use tracing::{debug, warn};

use crate::dag::{Scheduler, TaskRunState};
use crate::engine::{InstanceReport, InstanceStatus, RuntimeEvent, TaskResult, TaskStatus};
use crate::plan::{Plan, TaskSpec};

/// What the IO shell should do after a core step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    DispatchTasks(Vec<TaskSpec>),
}

#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// `false` once every task is terminal.
    pub keep_running: bool,
}

impl CoreStep {
    fn from_dispatch(tasks: Vec<TaskSpec>, keep_running: bool) -> Self {
        let commands = if tasks.is_empty() {
            Vec::new()
        } else {
            vec![CoreCommand::DispatchTasks(tasks)]
        };
        Self {
            commands,
            keep_running,
        }
    }
}

/// Core state for one instance: the scheduler plus collected results.
#[derive(Debug)]
pub struct InstanceCore {
    name: String,
    host: String,
    scheduler: Scheduler,
    results: Vec<TaskResult>,
}

impl InstanceCore {
    pub fn new(plan: &Plan) -> Self {
        Self {
            name: plan.instance.clone(),
            host: plan.host.clone(),
            scheduler: Scheduler::from_plan(plan),
            results: Vec::new(),
        }
    }

    /// Dispatch the plan's roots.
    pub fn start(&mut self) -> CoreStep {
        let step = self.scheduler.start();
        CoreStep::from_dispatch(step.newly_scheduled, !step.finished)
    }

    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskCompleted { result } => self.handle_completion(result),
        }
    }

    fn handle_completion(&mut self, result: TaskResult) -> CoreStep {
        if self.scheduler.state_of(&result.id) != Some(TaskRunState::Running) {
            warn!(
                instance = %self.name,
                task = %result.id,
                "completion for task that was not dispatched; ignoring"
            );
            return CoreStep {
                commands: Vec::new(),
                keep_running: !self.scheduler.is_finished(),
            };
        }

        let step = self.scheduler.complete(&result.id, result.status);
        if !step.newly_blocked.is_empty() {
            debug!(instance = %self.name, blocked = ?step.newly_blocked, "dependents blocked");
        }
        self.results.push(result);
        CoreStep::from_dispatch(step.newly_scheduled, !step.finished)
    }

    /// Fold the collected results into the instance's report.
    pub fn into_report(self) -> InstanceReport {
        let status = match self
            .results
            .iter()
            .find(|r| r.status == TaskStatus::Failed)
        {
            Some(failed) => InstanceStatus::Failed {
                task: failed.id.clone(),
                message: failed.message.clone().unwrap_or_default(),
                stderr: failed.stderr.clone(),
            },
            None => InstanceStatus::Succeeded,
        };

        InstanceReport {
            name: self.name,
            host: self.host,
            status,
            blocked: self.scheduler.tasks_in_state(TaskRunState::Blocked),
            dispatch_order: self.scheduler.dispatch_order().to_vec(),
            results: self.results,
        }
    }
}
