// src/plan/mod.rs

//! Per-instance provisioning plans.
//!
//! - [`task`] defines the orchestrator-level task description.
//! - [`assets`] locates the checked-in scripts, templates and config tree.
//! - [`environment`] derives the environment map exported to every remote script.
//! - [`builder`] turns a validated instance into its dependency-ordered plan.

pub mod assets;
pub mod builder;
pub mod environment;
pub mod task;

use std::fmt::Write as _;

use crate::dag::PlanGraph;
use crate::errors::Result;
use crate::fingerprint::FingerprintInput;

pub use assets::AssetLayout;
pub use builder::{InstancePlan, PlanBuilder};
pub use environment::{instance_environment, resolve_dependency, ResolvedDependency};
pub use task::{task_id, ChangePolicy, TaskAction, TaskId, TaskSpec};

/// The tasks of one instance together with their validated graph.
#[derive(Debug, Clone)]
pub struct Plan {
    pub instance: String,
    pub host: String,
    /// Tasks in declaration order.
    pub tasks: Vec<TaskSpec>,
    pub graph: PlanGraph,
}

impl Plan {
    /// Validate `tasks` into a plan. Cycles and dangling predecessors are
    /// rejected here rather than surfacing as a deadlock at run time.
    pub fn new(
        instance: impl Into<String>,
        host: impl Into<String>,
        tasks: Vec<TaskSpec>,
    ) -> Result<Self> {
        let graph = PlanGraph::build(&tasks)?;
        Ok(Self {
            instance: instance.into(),
            host: host.into(),
            tasks,
            graph,
        })
    }

    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.id.as_str())
    }

    /// Human-readable listing used by `--dry-run`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "instance {} ({})", self.instance, self.host);
        for id in self.graph.topological_order() {
            let Some(task) = self.task(id) else { continue };
            let after = if task.after.is_empty() {
                "-".to_string()
            } else {
                task.after.join(", ")
            };
            let policy = match &task.change {
                ChangePolicy::Always => "always".to_string(),
                ChangePolicy::Tracked(inputs) => {
                    let kinds: Vec<String> = inputs.iter().map(describe_input).collect();
                    format!("tracked[{}]", kinds.join(", "))
                }
            };
            let _ = writeln!(
                out,
                "  {:<32} {:<15} after: {:<40} {}",
                task.id,
                task.action.kind(),
                after,
                policy
            );
        }
        out
    }
}

fn describe_input(input: &FingerprintInput) -> String {
    match input {
        FingerprintInput::File(path) => format!("file {}", path.display()),
        FingerprintInput::Dir(path) => format!("dir {}", path.display()),
        FingerprintInput::Params(values) => format!("{} params", values.len()),
    }
}
