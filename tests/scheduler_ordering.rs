// tests/scheduler_ordering.rs

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use proptest::prelude::*;

use fleetdag::dag::{Scheduler, TaskRunState};
use fleetdag::engine::TaskStatus;
use fleetdag::errors::FleetdagError;
use fleetdag::plan::{Plan, TaskAction, TaskSpec};

fn task(i: usize, deps: &HashSet<usize>) -> TaskSpec {
    TaskSpec::new(
        format!("p:t{i}"),
        TaskAction::RemoteCommand {
            command: format!("echo {i}"),
        },
        Duration::from_secs(1),
    )
    .after(deps.iter().map(|d| format!("p:t{d}")))
}

// Acyclic by construction: task N may only depend on tasks 0..N.
fn plan_strategy(max_tasks: usize) -> impl Strategy<Value = Plan> {
    (1..=max_tasks).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            move |raw| {
                let tasks = raw
                    .into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let deps: HashSet<usize> = if i == 0 {
                            HashSet::new()
                        } else {
                            picks.into_iter().map(|p| p % i).collect()
                        };
                        task(i, &deps)
                    })
                    .collect();
                Plan::new("p", "10.0.0.1", tasks).unwrap()
            },
        )
    })
}

proptest! {
    #[test]
    fn never_dispatches_before_predecessors_resolve(
        plan in plan_strategy(12),
        failing in proptest::collection::hash_set(0..12usize, 0..3),
        pick in proptest::collection::vec(any::<usize>(), 64),
    ) {
        let mut scheduler = Scheduler::from_plan(&plan);
        let deps: HashMap<String, Vec<String>> = plan
            .tasks
            .iter()
            .map(|t| (t.id.clone(), t.after.clone()))
            .collect();
        let mut resolved: HashMap<String, TaskStatus> = HashMap::new();
        let mut running: Vec<String> = Vec::new();

        for t in scheduler.start().newly_scheduled {
            running.push(t.id);
        }

        let mut step = 0;
        while !running.is_empty() {
            // Complete an arbitrary running task to model concurrent completion order.
            let idx = pick[step % pick.len()] % running.len();
            step += 1;
            let id = running.swap_remove(idx);

            let n: usize = id.trim_start_matches("p:t").parse().unwrap();
            let status = if failing.contains(&n) { TaskStatus::Failed } else { TaskStatus::Succeeded };
            resolved.insert(id.clone(), status);

            for next in scheduler.complete(&id, status).newly_scheduled {
                for dep in &deps[&next.id] {
                    prop_assert!(
                        matches!(resolved.get(dep), Some(TaskStatus::Succeeded | TaskStatus::Skipped)),
                        "{} dispatched before {} resolved", next.id, dep
                    );
                }
                running.push(next.id);
            }
        }

        prop_assert!(scheduler.is_finished());
        for t in &plan.tasks {
            let state = scheduler.state_of(&t.id).unwrap();
            if state == TaskRunState::Blocked {
                prop_assert!(!scheduler.dispatch_order().contains(&t.id));
            } else {
                prop_assert!(resolved.contains_key(&t.id));
            }
        }
    }
}

#[test]
fn injected_cycle_is_rejected_at_build_time() {
    let mut deps = HashSet::new();
    deps.insert(2);
    let mut tasks = vec![task(0, &deps)];
    tasks.push(task(1, &[0].into_iter().collect()));
    tasks.push(task(2, &[1].into_iter().collect()));

    match Plan::new("p", "10.0.0.1", tasks) {
        Err(FleetdagError::PlanCycle(message)) => assert!(message.contains("cycle")),
        other => panic!("expected PlanCycle, got {other:?}"),
    }
}
