// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{FleetdagError, Result};
use crate::plan::{TaskId, TaskSpec};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct PlanNode {
    /// Direct predecessors: tasks that must resolve before this one can run.
    deps: Vec<TaskId>,
    /// Direct dependents: tasks that list this one as a predecessor.
    dependents: Vec<TaskId>,
}

/// Validated, inspectable dependency graph of one plan.
///
/// Construction rejects duplicate ids, unknown or self predecessors and
/// cycles, so everything downstream can assume a DAG.
#[derive(Debug, Clone)]
pub struct PlanGraph {
    nodes: HashMap<TaskId, PlanNode>,
    /// A topological order, stable for a given task list.
    order: Vec<TaskId>,
}

impl PlanGraph {
    pub fn build(tasks: &[TaskSpec]) -> Result<Self> {
        let mut nodes: HashMap<TaskId, PlanNode> = HashMap::new();

        for task in tasks {
            let node = PlanNode {
                deps: task.after.clone(),
                dependents: Vec::new(),
            };
            if nodes.insert(task.id.clone(), node).is_some() {
                return Err(FleetdagError::config(
                    "plan",
                    format!("duplicate task id '{}'", task.id),
                ));
            }
        }

        for task in tasks {
            for dep in &task.after {
                if dep == &task.id {
                    return Err(FleetdagError::config(
                        "plan",
                        format!("task '{}' cannot depend on itself", task.id),
                    ));
                }
                match nodes.get_mut(dep) {
                    Some(dep_node) => dep_node.dependents.push(task.id.clone()),
                    None => {
                        return Err(FleetdagError::config(
                            "plan",
                            format!("task '{}' has unknown predecessor '{}'", task.id, dep),
                        ));
                    }
                }
            }
        }

        // Edge direction: predecessor -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for task in tasks {
            graph.add_node(task.id.as_str());
        }
        for task in tasks {
            for dep in &task.after {
                graph.add_edge(dep.as_str(), task.id.as_str(), ());
            }
        }

        let order = match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(str::to_string).collect(),
            Err(cycle) => {
                return Err(FleetdagError::PlanCycle(format!(
                    "cycle detected in plan involving task '{}'",
                    cycle.node_id()
                )));
            }
        };

        Ok(Self { nodes, order })
    }

    /// All task ids, in topological order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn topological_order(&self) -> &[TaskId] {
        &self.order
    }

    /// Immediate predecessors of a task.
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
