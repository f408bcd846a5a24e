#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use fleetdag::config::EnvSettings;
use fleetdag::engine::RunReport;
use fleetdag::exec::Transport;
use fleetdag::{run_with, RunOptions};

pub use fleetdag_test_utils::*;

/// Options for a full run of `config` against `<dir>/deploy`.
pub fn options(dir: &Path, config: &Path) -> RunOptions {
    RunOptions {
        config: config.to_path_buf(),
        override_path: None,
        assets: dir.join("deploy"),
        only: Vec::new(),
        dry_run: false,
    }
}

pub async fn run(opts: &RunOptions, env: &EnvSettings, transport: Arc<FakeTransport>) -> RunReport {
    let transport: Arc<dyn Transport> = transport;
    with_timeout(run_with(opts, env, transport))
        .await
        .expect("run should not fail before execution")
}
