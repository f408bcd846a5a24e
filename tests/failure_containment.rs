// tests/failure_containment.rs

mod common;
use crate::common::*;

use std::sync::Arc;

use fleetdag::engine::{InstanceStatus, TaskStatus};

#[tokio::test]
async fn restore_failure_blocks_service_tasks_but_not_other_instances() {
    init_tracing();
    let dir = temp_workspace();
    let config = FleetTomlBuilder::new()
        .fast_settle()
        .local_instance("a", "10.0.0.1", 8332)
        .external_instance("b", "10.0.0.2", "10.0.0.1", 8332)
        .write_to(dir.path());
    let opts = options(dir.path(), &config);

    let transport = Arc::new(FakeTransport::new());
    transport.fail_when("10.0.0.1", "run --rm restore", 1, "snapshot corrupt");

    let report = run(&opts, &standard_env(), transport.clone()).await;
    assert!(!report.is_success());

    let a = report.instance("a").unwrap();
    match &a.status {
        InstanceStatus::Failed { task, stderr, .. } => {
            assert_eq!(task, "a:restore");
            assert_eq!(stderr, "snapshot corrupt");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!a.was_dispatched("a:write-service-compose"));
    assert!(!a.was_dispatched("a:start-services"));
    assert_eq!(
        a.blocked,
        vec!["a:write-service-compose".to_string(), "a:start-services".to_string()]
    );
    // Independent branch still ran.
    assert_eq!(a.result("a:create-swap").unwrap().status, TaskStatus::Succeeded);
    assert_eq!(transport.count_matching("10.0.0.1", "up -d"), 0);

    let b = report.instance("b").unwrap();
    assert!(b.is_success(), "{report}");
    assert_eq!(transport.count_matching("10.0.0.2", "up -d"), 1);

    let summary = report.to_string();
    assert!(summary.contains("a (10.0.0.1): FAILED at a:restore"));
    assert!(summary.contains("stderr: snapshot corrupt"));
}

#[tokio::test]
async fn rerun_after_failure_resumes_at_failed_step() {
    init_tracing();
    let dir = temp_workspace();
    let config = FleetTomlBuilder::new()
        .fast_settle()
        .local_instance("a", "10.0.0.1", 8332)
        .write_to(dir.path());
    let opts = options(dir.path(), &config);

    let failing = Arc::new(FakeTransport::new());
    failing.fail_when("10.0.0.1", "run --rm restore", 1, "network");
    run(&opts, &standard_env(), failing).await;

    let transport = Arc::new(FakeTransport::new());
    let report = run(&opts, &standard_env(), transport.clone()).await;
    let a = report.instance("a").unwrap();
    assert!(a.is_success(), "{report}");

    assert_eq!(a.result("a:restore").unwrap().status, TaskStatus::Succeeded);
    assert_eq!(a.result("a:write-service-compose").unwrap().status, TaskStatus::Succeeded);
    assert_eq!(a.result("a:copy-config").unwrap().status, TaskStatus::Skipped);
    assert_eq!(a.result("a:reboot").unwrap().status, TaskStatus::Skipped);
    assert_eq!(transport.count_matching("10.0.0.1", "sudo reboot"), 0);
}

#[tokio::test]
async fn unreachable_host_after_reboot_fails_settle() {
    init_tracing();
    let dir = temp_workspace();
    let config = FleetTomlBuilder::new()
        .config("settle_delay_secs = 0")
        .config("reachability_poll_secs = 1")
        .config("reachability_timeout_secs = 1")
        .local_instance("a", "10.0.0.1", 8332)
        .write_to(dir.path());
    let opts = options(dir.path(), &config);

    let transport = Arc::new(FakeTransport::new());
    transport.fail_exact("10.0.0.1", "true", 255, "Connection refused");

    let report = run(&opts, &standard_env(), transport).await;
    let a = report.instance("a").unwrap();
    match &a.status {
        InstanceStatus::Failed { task, message, .. } => {
            assert_eq!(task, "a:settle");
            assert!(message.contains("timed out"), "{message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!a.was_dispatched("a:cleanup"));
}
