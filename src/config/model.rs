// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::SignatureStorageMode;

/// Default bitcoind RPC port used when nothing else is configured.
pub const DEFAULT_BITCOIND_PORT: u16 = 8332;
/// Default bitcoind ZMQ port for the implicit local node.
pub const DEFAULT_BITCOIND_ZMQ_PORT: u16 = 28332;
/// Default `dbcache` (MiB) for the implicit local node.
pub const DEFAULT_BITCOIND_DBCACHE: u32 = 4000;

/// Configuration as read from TOML, before semantic validation.
///
/// ```toml
/// [config]
/// signature_storage_mode = "file"
///
/// [instance.a]
/// host = "203.0.113.10"
/// user = "ubuntu"
/// data_path = "/mnt/data"
///
/// [instance.a.bitcoind]
/// deploy = true
///
/// [instance.a.bitcoind.local]
/// port = 8332
/// user = "rpc"
/// password = "secret"
/// zmq_port = 28332
/// dbcache = 4000
/// ```
///
/// Instances keep the order in which they were declared.
#[derive(Debug, Clone, Default)]
pub struct RawConfigFile {
    /// Global behaviour from `[config]`.
    pub config: ConfigSection,

    /// All instances from `[instance.<name>]`, in declaration order.
    pub instances: Vec<(String, RawInstance)>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConfigSection {
    /// `"file"` (default) or `"memory"`.
    #[serde(default)]
    pub signature_storage_mode: SignatureStorageMode,

    /// Wall-clock bound for a single task. Restoring a multi-hundred-gigabyte
    /// snapshot is the longest step, hence four hours.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Fixed wait after a reboot before the host is probed.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,

    /// How long to keep probing a rebooted host before giving up.
    #[serde(default = "default_reachability_timeout_secs")]
    pub reachability_timeout_secs: u64,

    /// Interval between reachability probes.
    #[serde(default = "default_reachability_poll_secs")]
    pub reachability_poll_secs: u64,
}

fn default_task_timeout_secs() -> u64 {
    4 * 60 * 60
}

fn default_settle_delay_secs() -> u64 {
    60
}

fn default_reachability_timeout_secs() -> u64 {
    600
}

fn default_reachability_poll_secs() -> u64 {
    10
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            signature_storage_mode: SignatureStorageMode::default(),
            task_timeout_secs: default_task_timeout_secs(),
            settle_delay_secs: default_settle_delay_secs(),
            reachability_timeout_secs: default_reachability_timeout_secs(),
            reachability_poll_secs: default_reachability_poll_secs(),
        }
    }
}

/// `[instance.<name>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RawInstance {
    pub host: String,
    pub user: String,

    /// Private key for SSH. If `None`, `SSH_PRIVATE_KEY_PATH` is used.
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Working data directory on the remote filesystem.
    pub data_path: String,

    /// Optional dependency-service block. When absent, a local node is
    /// deployed with defaults taken from the environment.
    #[serde(default)]
    pub bitcoind: Option<RawDependencyService>,
}

/// `[instance.<name>.bitcoind]` section.
///
/// `deploy` selects which of `local` / `external` must be present.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RawDependencyService {
    pub deploy: bool,
    #[serde(default)]
    pub local: Option<LocalDependency>,
    #[serde(default)]
    pub external: Option<ExternalDependency>,
}

/// A bitcoind node run on the instance itself.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LocalDependency {
    pub port: u16,
    pub user: String,
    pub password: String,
    pub zmq_port: u16,
    /// bitcoind `dbcache` in MiB.
    pub dbcache: u32,
}

/// A bitcoind node reached over the network.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExternalDependency {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub zmq_port: u16,
}

/// Validated dependency-service selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyService {
    Local(LocalDependency),
    External(ExternalDependency),
}

impl DependencyService {
    pub fn is_local(&self) -> bool {
        matches!(self, DependencyService::Local(_))
    }
}

/// One managed host, validated. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    pub host: String,
    pub user: String,
    pub key_path: Option<PathBuf>,
    pub data_path: String,
    /// `None` means "deploy locally with environment defaults".
    pub bitcoind: Option<DependencyService>,
}

/// Validated configuration.
///
/// Construct via `FleetConfig::try_from(RawConfigFile)` or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub config: ConfigSection,
    pub instances: Vec<Instance>,
}

impl FleetConfig {
    pub(crate) fn new_unchecked(config: ConfigSection, instances: Vec<Instance>) -> Self {
        Self { config, instances }
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name == name)
    }
}
