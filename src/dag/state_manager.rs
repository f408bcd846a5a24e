// src/dag/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::task_info::{TaskInfo, TaskRunState};
use crate::dag::PlanGraph;
use crate::plan::{TaskId, TaskSpec};

/// Manages per-run state transitions for the tasks of one plan.
pub struct StateManager<'a> {
    graph: &'a PlanGraph,
    tasks: &'a mut HashMap<TaskId, TaskInfo>,
    instance: &'a str,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a PlanGraph,
        tasks: &'a mut HashMap<TaskId, TaskInfo>,
        instance: &'a str,
    ) -> Self {
        Self {
            graph,
            tasks,
            instance,
        }
    }

    /// Mark every transitive dependent of a failed task that has not been
    /// dispatched as `Blocked`.
    ///
    /// Returns the ids that were newly blocked.
    pub fn block_dependents(&mut self, failed_task: &str) -> Vec<TaskId> {
        let mut stack: Vec<TaskId> = self.graph.dependents_of(failed_task).to_vec();
        let mut newly_blocked = Vec::new();

        while let Some(id) = stack.pop() {
            if let Some(info) = self.tasks.get_mut(&id) {
                match info.state {
                    TaskRunState::Pending => {
                        info.state = TaskRunState::Blocked;
                        debug!(
                            instance = %self.instance,
                            task = %id,
                            upstream = %failed_task,
                            "blocking dependent of failed task"
                        );
                        newly_blocked.push(id.clone());
                        stack.extend(self.graph.dependents_of(&id).iter().cloned());
                    }
                    TaskRunState::Running => {
                        // Cannot happen: a running task had every predecessor satisfied.
                        warn!(instance = %self.instance, task = %id, "dependent already running");
                    }
                    _ => {}
                }
            }
        }

        newly_blocked
    }

    /// Collect `Pending` tasks whose predecessors are satisfied, mark them
    /// `Running`, and return their specs in topological order.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<TaskSpec> {
        let candidates: Vec<TaskId> = self
            .graph
            .tasks()
            .filter(|id| {
                self.tasks.get(*id).is_some_and(|info| {
                    info.state == TaskRunState::Pending && deps_satisfied(self.tasks, info)
                })
            })
            .map(str::to_string)
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        for id in candidates {
            if let Some(info) = self.tasks.get_mut(&id) {
                info!(
                    instance = %self.instance,
                    task = %id,
                    action = info.spec.action.kind(),
                    "predecessors resolved; dispatching task"
                );
                info.state = TaskRunState::Running;
                ready.push(info.spec.clone());
            }
        }
        ready
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks.values().all(|info| info.state.is_terminal())
    }
}

/// Whether every predecessor of `info` has `Succeeded` or been `Skipped`.
pub fn deps_satisfied(tasks: &HashMap<TaskId, TaskInfo>, info: &TaskInfo) -> bool {
    info.spec.after.iter().all(|dep| {
        tasks
            .get(dep)
            .is_some_and(|d| d.state.satisfies_dependents())
    })
}
