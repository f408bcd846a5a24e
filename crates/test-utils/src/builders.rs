#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use fleetdag::config::env::{
    DASHBOARD_NAME, INDEXER_IMAGE, POSTGRES_DB, POSTGRES_PASSWORD, POSTGRES_USER,
    BITCOIND_RPC_PASSWORD, BITCOIND_RPC_USER, RESTORE_IMAGE, SSH_PRIVATE_KEY_PATH,
};
use fleetdag::config::EnvSettings;

/// Builder for fleet config documents, emitted as TOML text.
pub struct FleetTomlBuilder {
    config: Vec<String>,
    instances: Vec<String>,
}

impl FleetTomlBuilder {
    pub fn new() -> Self {
        Self {
            config: Vec::new(),
            instances: Vec::new(),
        }
    }

    /// Add a raw `key = value` line to `[config]`.
    pub fn config(mut self, line: &str) -> Self {
        self.config.push(line.to_string());
        self
    }

    /// Short delays so settle tasks finish instantly in tests.
    pub fn fast_settle(self) -> Self {
        self.config("settle_delay_secs = 0")
            .config("reachability_poll_secs = 1")
            .config("reachability_timeout_secs = 5")
    }

    /// Instance without a `bitcoind` block (environment defaults).
    pub fn instance(mut self, name: &str, host: &str) -> Self {
        self.instances.push(instance_header(name, host));
        self
    }

    /// Instance deploying its own node on `port`.
    pub fn local_instance(mut self, name: &str, host: &str, port: u16) -> Self {
        let mut s = instance_header(name, host);
        s.push_str(&format!(
            "\n[instance.{name}.bitcoind]\ndeploy = true\n\n\
             [instance.{name}.bitcoind.local]\nport = {port}\nuser = \"rpc\"\n\
             password = \"rpcpass\"\nzmq_port = 28332\ndbcache = 4000\n"
        ));
        self.instances.push(s);
        self
    }

    /// Instance using the node at `node_host:port`.
    pub fn external_instance(mut self, name: &str, host: &str, node_host: &str, port: u16) -> Self {
        let mut s = instance_header(name, host);
        s.push_str(&format!(
            "\n[instance.{name}.bitcoind]\ndeploy = false\n\n\
             [instance.{name}.bitcoind.external]\nhost = \"{node_host}\"\nport = {port}\n\
             user = \"rpc\"\npassword = \"rpcpass\"\nzmq_port = 28332\n"
        ));
        self.instances.push(s);
        self
    }

    /// Append arbitrary TOML (e.g. a deliberately broken record).
    pub fn raw(mut self, toml: &str) -> Self {
        self.instances.push(toml.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::new();
        if !self.config.is_empty() {
            out.push_str("[config]\n");
            for line in &self.config {
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&self.instances.join("\n"));
        out
    }

    /// Write `Fleet.toml` into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join("Fleet.toml");
        fs::write(&path, self.build()).expect("write Fleet.toml");
        path
    }
}

impl Default for FleetTomlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn instance_header(name: &str, host: &str) -> String {
    format!(
        "[instance.{name}]\nhost = \"{host}\"\nuser = \"ubuntu\"\nkey_path = \"/keys/{name}\"\ndata_path = \"/mnt/{name}\"\n"
    )
}

/// `EnvSettings` backed by the given pairs only.
pub fn env_settings(pairs: &[(&str, &str)]) -> EnvSettings {
    let owned: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvSettings::from_lookup(move |key| {
        owned
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
}

/// Every variable a full run needs.
pub fn standard_env() -> EnvSettings {
    env_settings(&[
        (POSTGRES_USER, "indexer"),
        (POSTGRES_PASSWORD, "pgpass"),
        (POSTGRES_DB, "indexer"),
        (BITCOIND_RPC_USER, "rpc"),
        (BITCOIND_RPC_PASSWORD, "rpcpass"),
        (INDEXER_IMAGE, "example/indexer:1.0"),
        (RESTORE_IMAGE, "example/restore:1.0"),
        (SSH_PRIVATE_KEY_PATH, "/keys/default"),
        (DASHBOARD_NAME, "fleet"),
    ])
}
