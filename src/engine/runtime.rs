// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::engine::{InstanceReport, RuntimeEvent, TaskResult};
use crate::exec::{Connection, TaskExecutor};
use crate::plan::{InstancePlan, Plan, TaskSpec};

use super::core::{CoreCommand, InstanceCore};

/// Drives one instance's scheduler in response to `RuntimeEvent`s and
/// delegates task execution to a shared [`TaskExecutor`].
///
/// This is the IO shell around [`InstanceCore`]: it spawns ready tasks and
/// feeds their completions back through a channel. Independent tasks of
/// the same instance run concurrently.
pub struct InstanceRuntime {
    core: InstanceCore,
    connection: Arc<Connection>,
    executor: Arc<TaskExecutor>,
    event_tx: mpsc::Sender<RuntimeEvent>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl fmt::Debug for InstanceRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRuntime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl InstanceRuntime {
    pub fn new(plan: &Plan, connection: Connection, executor: Arc<TaskExecutor>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        Self {
            core: InstanceCore::new(plan),
            connection: Arc::new(connection),
            executor,
            event_tx,
            event_rx,
        }
    }

    /// Main event loop. Returns once every task is terminal.
    pub async fn run(mut self) -> InstanceReport {
        info!(instance = %self.connection.instance, host = %self.connection.host, "instance run started");

        let mut step = self.core.start();
        loop {
            for command in step.commands {
                match command {
                    CoreCommand::DispatchTasks(tasks) => self.dispatch(tasks),
                }
            }

            if !step.keep_running {
                break;
            }

            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    // Unreachable while `self.event_tx` is alive.
                    error!(instance = %self.connection.instance, "runtime event channel closed");
                    break;
                }
            };
            debug!(instance = %self.connection.instance, ?event, "runtime received event");
            step = self.core.step(event);
        }

        let report = self.core.into_report();
        info!(
            instance = %report.name,
            success = report.is_success(),
            "instance run finished"
        );
        report
    }

    fn dispatch(&self, tasks: Vec<TaskSpec>) {
        for task in tasks {
            debug!(instance = %self.connection.instance, task = %task.id, "dispatching task");
            let executor = Arc::clone(&self.executor);
            let connection = Arc::clone(&self.connection);
            let tx = self.event_tx.clone();

            tokio::spawn(async move {
                let id = task.id.clone();
                // Run in a nested task so a panic surfaces as a failure
                // instead of leaving the scheduler waiting forever.
                let handle =
                    tokio::spawn(async move { executor.execute(&task, &connection).await });
                let result = match handle.await {
                    Ok(result) => result,
                    Err(join_err) => {
                        error!(task = %id, error = %join_err, "task panicked");
                        TaskResult::failed_with(&id, format!("task panicked: {join_err}"), "")
                    }
                };
                let _ = tx.send(RuntimeEvent::TaskCompleted { result }).await;
            });
        }
    }
}

/// Run every plan; instances proceed fully in parallel.
///
/// A failure in one instance never affects another. Reports come back in
/// the order the plans were given.
pub async fn run_fleet(plans: Vec<InstancePlan>, executor: Arc<TaskExecutor>) -> Vec<InstanceReport> {
    let mut handles = Vec::with_capacity(plans.len());
    for InstancePlan { plan, connection } in plans {
        let name = plan.instance.clone();
        let host = plan.host.clone();
        let runtime = InstanceRuntime::new(&plan, connection, Arc::clone(&executor));
        handles.push((name, host, tokio::spawn(runtime.run())));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for (name, host, handle) in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(join_err) => {
                error!(instance = %name, error = %join_err, "instance runtime panicked");
                reports.push(InstanceReport {
                    name,
                    host,
                    status: crate::engine::InstanceStatus::Failed {
                        task: String::new(),
                        message: format!("instance runtime panicked: {join_err}"),
                        stderr: String::new(),
                    },
                    results: Vec::new(),
                    blocked: Vec::new(),
                    dispatch_order: Vec::new(),
                });
            }
        }
    }
    reports
}
