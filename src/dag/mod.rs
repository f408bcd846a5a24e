// src/dag/mod.rs

//! Plan graph and scheduling.
//!
//! - [`graph`] holds the validated dependency graph of one plan.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready to run and which are blocked by a failure.
//! - [`task_info`] provides task metadata and run states.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::PlanGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::TaskRunState;
