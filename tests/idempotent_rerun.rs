// tests/idempotent_rerun.rs

mod common;
use crate::common::*;

use std::fs;
use std::sync::Arc;

use fleetdag::engine::TaskStatus;

#[tokio::test]
async fn second_run_only_restarts_services() {
    init_tracing();
    let dir = temp_workspace();
    let config = FleetTomlBuilder::new()
        .fast_settle()
        .local_instance("a", "10.0.0.1", 8332)
        .write_to(dir.path());
    let opts = options(dir.path(), &config);
    let env = standard_env();

    let transport = Arc::new(FakeTransport::new());
    let first = run(&opts, &env, transport.clone()).await;
    assert!(first.is_success(), "{first}");
    let a = first.instance("a").unwrap();
    assert_eq!(a.count(TaskStatus::Succeeded), 12);
    assert!(dir.path().join(".fleetdag/signatures").exists());

    let transport = Arc::new(FakeTransport::new());
    let second = run(&opts, &env, transport.clone()).await;
    assert!(second.is_success(), "{second}");
    let a = second.instance("a").unwrap();
    assert_eq!(a.count(TaskStatus::Skipped), 11);
    assert_eq!(
        a.result("a:start-services").unwrap().status,
        TaskStatus::Succeeded
    );

    // The only command sent is the service start.
    let calls = transport.calls();
    assert_eq!(calls.len(), 1, "{calls:?}");
    assert!(calls[0].command.contains("up -d --remove-orphans"));
}

#[tokio::test]
async fn edited_script_reruns_its_task_and_reboot_chain() {
    init_tracing();
    let dir = temp_workspace();
    let config = FleetTomlBuilder::new()
        .fast_settle()
        .local_instance("a", "10.0.0.1", 8332)
        .write_to(dir.path());
    let opts = options(dir.path(), &config);
    let env = standard_env();

    run(&opts, &env, Arc::new(FakeTransport::new())).await;

    fs::write(
        dir.path().join("deploy/scripts/base-setup.sh"),
        "#!/usr/bin/env bash\necho changed\n",
    )
    .unwrap();

    let transport = Arc::new(FakeTransport::new());
    let report = run(&opts, &env, transport.clone()).await;
    let a = report.instance("a").unwrap();
    assert!(a.is_success(), "{report}");

    for id in ["a:base-setup", "a:reboot", "a:settle", "a:start-services"] {
        assert_eq!(a.result(id).unwrap().status, TaskStatus::Succeeded, "{id}");
    }
    for id in ["a:apt-config", "a:cleanup", "a:restore", "a:create-swap"] {
        assert_eq!(a.result(id).unwrap().status, TaskStatus::Skipped, "{id}");
    }
    assert_eq!(transport.count_matching("10.0.0.1", "echo changed"), 1);
}

#[tokio::test]
async fn memory_store_never_skips() {
    init_tracing();
    let dir = temp_workspace();
    let config = FleetTomlBuilder::new()
        .config("signature_storage_mode = \"memory\"")
        .fast_settle()
        .local_instance("a", "10.0.0.1", 8332)
        .write_to(dir.path());
    let opts = options(dir.path(), &config);

    run(&opts, &standard_env(), Arc::new(FakeTransport::new())).await;
    let report = run(&opts, &standard_env(), Arc::new(FakeTransport::new())).await;
    assert_eq!(report.instance("a").unwrap().count(TaskStatus::Skipped), 0);
    assert!(!dir.path().join(".fleetdag/signatures").exists());
}
