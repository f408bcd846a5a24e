use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::PlanGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{StateManager, deps_satisfied};
use crate::dag::task_info::{TaskInfo, TaskRunState};
use crate::engine::TaskStatus;
use crate::plan::{Plan, TaskId};

/// Scheduler holds one instance's plan graph plus mutable per-run state.
///
/// It is responsible for:
/// - deciding when a task is ready (every predecessor satisfied)
/// - recording completions and scheduling dependents
/// - blocking the transitive dependents of a failed task
#[derive(Debug)]
pub struct Scheduler {
    instance: String,
    graph: PlanGraph,
    tasks: HashMap<TaskId, TaskInfo>,
    /// Ids in the order they were handed out, for reports and tests.
    dispatch_order: Vec<TaskId>,
    started: bool,
}

impl Scheduler {
    pub fn from_plan(plan: &Plan) -> Self {
        let tasks = plan
            .tasks
            .iter()
            .map(|spec| (spec.id.clone(), TaskInfo::new(spec.clone())))
            .collect();

        Self {
            instance: plan.instance.clone(),
            graph: plan.graph.clone(),
            tasks,
            dispatch_order: Vec::new(),
            started: false,
        }
    }

    /// Hand out every task without predecessors.
    ///
    /// Calling this more than once is a no-op.
    pub fn start(&mut self) -> SchedulerStep {
        if self.started {
            warn!(instance = %self.instance, "scheduler already started; ignoring");
            return SchedulerStep {
                finished: self.is_finished(),
                ..SchedulerStep::default()
            };
        }
        self.started = true;
        debug!(instance = %self.instance, tasks = self.tasks.len(), "scheduler: starting plan");
        self.step(Vec::new())
    }

    /// Record the outcome of a dispatched task.
    pub fn complete(&mut self, task: &str, status: TaskStatus) -> SchedulerStep {
        let Some(info) = self.tasks.get_mut(task) else {
            warn!(instance = %self.instance, task = %task, "completion for unknown task; ignoring");
            return SchedulerStep {
                finished: self.is_finished(),
                ..SchedulerStep::default()
            };
        };

        if info.state != TaskRunState::Running {
            warn!(
                instance = %self.instance,
                task = %task,
                state = ?info.state,
                "completion for task that is not running; ignoring"
            );
            return SchedulerStep {
                finished: self.is_finished(),
                ..SchedulerStep::default()
            };
        }

        let mut newly_blocked = Vec::new();
        match status {
            TaskStatus::Succeeded => {
                info.state = TaskRunState::Succeeded;
                debug!(instance = %self.instance, task = %task, "task succeeded");
            }
            TaskStatus::Skipped => {
                info.state = TaskRunState::Skipped;
                debug!(instance = %self.instance, task = %task, "task skipped; signature unchanged");
            }
            TaskStatus::Failed => {
                info.state = TaskRunState::Failed;
                warn!(instance = %self.instance, task = %task, "task failed; blocking dependents");
                let mut manager = StateManager::new(&self.graph, &mut self.tasks, &self.instance);
                newly_blocked = manager.block_dependents(task);
            }
        }

        self.step(newly_blocked)
    }

    fn step(&mut self, newly_blocked: Vec<TaskId>) -> SchedulerStep {
        let mut manager = StateManager::new(&self.graph, &mut self.tasks, &self.instance);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let finished = manager.all_tasks_terminal();

        self.dispatch_order
            .extend(newly_scheduled.iter().map(|spec| spec.id.clone()));

        if finished {
            info!(instance = %self.instance, "scheduler: all tasks terminal");
        }

        SchedulerStep {
            newly_scheduled,
            newly_blocked,
            finished,
        }
    }

    pub fn state_of(&self, task: &str) -> Option<TaskRunState> {
        self.tasks.get(task).map(|info| info.state)
    }

    /// Whether the predecessors of `task` are satisfied. `None` for an
    /// unknown task.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        Some(deps_satisfied(&self.tasks, info))
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.values().all(|info| info.state.is_terminal())
    }

    pub fn dispatch_order(&self) -> &[TaskId] {
        &self.dispatch_order
    }

    /// Ids in the given state, in topological order.
    pub fn tasks_in_state(&self, state: TaskRunState) -> Vec<TaskId> {
        self.graph
            .tasks()
            .filter(|id| self.state_of(id) == Some(state))
            .map(str::to_string)
            .collect()
    }
}
