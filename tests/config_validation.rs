// tests/config_validation.rs

use std::fs;

use fleetdag::config::{load_and_validate, DependencyService};
use fleetdag::errors::FleetdagError;
use fleetdag_test_utils::FleetTomlBuilder;

fn config_error(result: fleetdag::errors::Result<fleetdag::config::FleetConfig>) -> (String, String) {
    match result {
        Err(FleetdagError::Configuration { scope, message }) => (scope, message),
        Err(other) => panic!("expected Configuration error, got {other:?}"),
        Ok(cfg) => panic!("expected error, got {cfg:?}"),
    }
}

#[test]
fn local_discriminator_without_local_block_names_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = FleetTomlBuilder::new()
        .raw(
            r#"
[instance.node1]
host = "10.0.0.1"
user = "ubuntu"
data_path = "/mnt/data"

[instance.node1.bitcoind]
deploy = true
"#,
        )
        .write_to(dir.path());

    let (scope, message) = config_error(load_and_validate(&path, None));
    assert_eq!(scope, "node1");
    assert!(message.contains("requires a [bitcoind.local] block"), "{message}");
}

#[test]
fn local_discriminator_with_external_block_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = FleetTomlBuilder::new()
        .local_instance("a", "10.0.0.1", 8332)
        .raw(
            r#"
[instance.a.bitcoind.external]
host = "10.0.0.9"
port = 8332
user = "u"
password = "p"
zmq_port = 28332
"#,
        )
        .write_to(dir.path());

    let (scope, message) = config_error(load_and_validate(&path, None));
    assert_eq!(scope, "a");
    assert!(message.contains("conflicts with a [bitcoind.external] block"), "{message}");
}

#[test]
fn wrong_typed_field_names_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = FleetTomlBuilder::new()
        .raw("[instance.broken]\nhost = 42\nuser = \"u\"\ndata_path = \"/d\"\n")
        .write_to(dir.path());

    let (scope, _) = config_error(load_and_validate(&path, None));
    assert_eq!(scope, "broken");
}

#[test]
fn instances_keep_declaration_order_and_override_wins() {
    let dir = tempfile::tempdir().unwrap();
    let path = FleetTomlBuilder::new()
        .local_instance("zeta", "10.0.0.3", 8332)
        .instance("alpha", "10.0.0.4")
        .write_to(dir.path());
    let override_path = dir.path().join("Fleet.override.toml");
    fs::write(
        &override_path,
        "[instance.zeta.bitcoind.local]\nport = 18332\n\n[instance.beta]\nhost = \"10.0.0.5\"\nuser = \"u\"\ndata_path = \"/d\"\n",
    )
    .unwrap();

    let cfg = load_and_validate(&path, Some(&override_path)).unwrap();
    let names: Vec<&str> = cfg.instances.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha", "beta"]);

    match &cfg.instance("zeta").unwrap().bitcoind {
        Some(DependencyService::Local(local)) => {
            assert_eq!(local.port, 18332);
            assert_eq!(local.user, "rpc");
        }
        other => panic!("unexpected dependency {other:?}"),
    }
    assert!(cfg.instance("alpha").unwrap().bitcoind.is_none());
}

#[test]
fn identical_input_validates_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = FleetTomlBuilder::new()
        .local_instance("a", "10.0.0.1", 8332)
        .external_instance("b", "10.0.0.2", "10.0.0.1", 8332)
        .write_to(dir.path());

    let first = load_and_validate(&path, None).unwrap();
    let second = load_and_validate(&path, None).unwrap();
    assert_eq!(first.instances, second.instances);
}

#[test]
fn sample_fleet_document_validates_with_restore_sized_timeout() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("Fleet.toml");
    let cfg = load_and_validate(&path, None).unwrap();
    assert_eq!(cfg.config.task_timeout_secs, 14400);
    assert!(cfg.instance("mainnet-a").unwrap().bitcoind.as_ref().unwrap().is_local());
    assert!(!cfg.instance("mainnet-b").unwrap().bitcoind.as_ref().unwrap().is_local());
}
