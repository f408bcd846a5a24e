use std::fs;
use std::path::Path;

/// Write a minimal but complete asset tree under `root`.
pub fn write_asset_tree(root: &Path) {
    let scripts = root.join("scripts");
    fs::create_dir_all(&scripts).expect("create scripts dir");
    for name in ["apt-config.sh", "base-setup.sh", "cleanup.sh", "create-swap.sh"] {
        fs::write(scripts.join(name), format!("#!/usr/bin/env bash\necho {name}\n"))
            .expect("write script");
    }

    let templates = root.join("templates");
    fs::create_dir_all(&templates).expect("create templates dir");
    fs::write(
        templates.join("restore-compose.yml"),
        "services:\n  restore:\n    image: ${RESTORE_IMAGE}\n    environment:\n      POSTGRES_DB: ${POSTGRES_DB}\n",
    )
    .expect("write restore template");
    fs::write(
        templates.join("compose.yml"),
        "services:\n  indexer:\n    image: ${INDEXER_IMAGE}\n    environment:\n      BITCOIND_URL: ${BITCOIND_URL}\n      DASHBOARD: ${DASHBOARD_NAME}\n",
    )
    .expect("write service template");

    let config = root.join("config");
    fs::create_dir_all(config.join("nested")).expect("create config dir");
    fs::write(config.join("indexer.toml"), "log = \"info\"\n").expect("write config file");
    fs::write(config.join("nested/extra.conf"), "x=1\n").expect("write nested config");
}

/// Temporary directory holding a `deploy/` asset tree.
pub fn temp_workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    write_asset_tree(&dir.path().join("deploy"));
    dir
}
