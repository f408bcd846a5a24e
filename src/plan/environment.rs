// src/plan/environment.rs

//! The environment map exported into every remote script of an instance.

use std::collections::BTreeMap;

use crate::config::env::{
    BITCOIND_RPC_PASSWORD, BITCOIND_RPC_USER, POSTGRES_DB, POSTGRES_PASSWORD, POSTGRES_USER,
};
use crate::config::{
    DependencyService, EnvSettings, Instance, DEFAULT_BITCOIND_DBCACHE, DEFAULT_BITCOIND_ZMQ_PORT,
};
use crate::errors::Result;

/// `dbcache` handed to services when the node is external and its record
/// carries no cache size.
pub const EXTERNAL_DBCACHE: u32 = 450;

/// Hostname of the bitcoind container inside the compose network.
pub const LOCAL_BITCOIND_HOST: &str = "bitcoind";

/// Dependency service of one instance with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub deploy: bool,
    /// Host the services reach bitcoind at.
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub zmq_port: u16,
    pub dbcache: u32,
}

impl ResolvedDependency {
    pub fn rpc_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn zmq_url(&self) -> String {
        format!("tcp://{}:{}", self.host, self.zmq_port)
    }
}

/// Apply the discriminated variant, or the environment defaults when the
/// instance has no `bitcoind` block at all.
pub fn resolve_dependency(instance: &Instance, settings: &EnvSettings) -> Result<ResolvedDependency> {
    let resolved = match &instance.bitcoind {
        Some(DependencyService::Local(local)) => ResolvedDependency {
            deploy: true,
            host: LOCAL_BITCOIND_HOST.to_string(),
            port: local.port,
            user: local.user.clone(),
            password: local.password.clone(),
            zmq_port: local.zmq_port,
            dbcache: local.dbcache,
        },
        Some(DependencyService::External(ext)) => ResolvedDependency {
            deploy: false,
            host: ext.host.clone(),
            port: ext.port,
            user: ext.user.clone(),
            password: ext.password.clone(),
            zmq_port: ext.zmq_port,
            dbcache: EXTERNAL_DBCACHE,
        },
        None => ResolvedDependency {
            deploy: true,
            host: LOCAL_BITCOIND_HOST.to_string(),
            port: settings.bitcoind_port()?,
            user: settings.require(BITCOIND_RPC_USER)?.to_string(),
            password: settings.require(BITCOIND_RPC_PASSWORD)?.to_string(),
            zmq_port: DEFAULT_BITCOIND_ZMQ_PORT,
            dbcache: DEFAULT_BITCOIND_DBCACHE,
        },
    };
    Ok(resolved)
}

/// Build the per-instance environment map.
///
/// Fails with a configuration error when a variable this instance needs is
/// missing from the environment.
pub fn instance_environment(
    instance: &Instance,
    settings: &EnvSettings,
) -> Result<BTreeMap<String, String>> {
    let dep = resolve_dependency(instance, settings)?;

    let mut env = BTreeMap::new();
    env.insert("INSTANCE_NAME".to_string(), instance.name.clone());
    env.insert("DATA_PATH".to_string(), instance.data_path.clone());
    for key in [POSTGRES_USER, POSTGRES_PASSWORD, POSTGRES_DB] {
        env.insert(key.to_string(), settings.require(key)?.to_string());
    }
    env.insert("DEPLOY_BITCOIND".to_string(), dep.deploy.to_string());
    env.insert("BITCOIND_URL".to_string(), dep.rpc_url());
    env.insert("BITCOIND_ZMQ_URL".to_string(), dep.zmq_url());
    env.insert("BITCOIND_RPC_PORT".to_string(), dep.port.to_string());
    env.insert("BITCOIND_RPC_USER".to_string(), dep.user);
    env.insert("BITCOIND_RPC_PASSWORD".to_string(), dep.password);
    env.insert("BITCOIND_ZMQ_PORT".to_string(), dep.zmq_port.to_string());
    env.insert("BITCOIND_DBCACHE".to_string(), dep.dbcache.to_string());
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExternalDependency, LocalDependency};
    use crate::errors::FleetdagError;

    fn settings(extra: &[(&str, &str)]) -> EnvSettings {
        let mut pairs = vec![
            (POSTGRES_USER, "pg"),
            (POSTGRES_PASSWORD, "pgpass"),
            (POSTGRES_DB, "indexer"),
        ];
        pairs.extend_from_slice(extra);
        EnvSettings::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
    }

    fn instance(name: &str, bitcoind: Option<DependencyService>) -> Instance {
        Instance {
            name: name.to_string(),
            host: "10.0.0.1".to_string(),
            user: "ubuntu".to_string(),
            key_path: None,
            data_path: "/mnt/data".to_string(),
            bitcoind,
        }
    }

    #[test]
    fn local_node_uses_compose_hostname() {
        let inst = instance(
            "a",
            Some(DependencyService::Local(LocalDependency {
                port: 8332,
                user: "rpc".into(),
                password: "pw".into(),
                zmq_port: 28332,
                dbcache: 4000,
            })),
        );
        let env = instance_environment(&inst, &settings(&[])).unwrap();
        assert_eq!(env["DEPLOY_BITCOIND"], "true");
        assert_eq!(env["BITCOIND_URL"], "http://bitcoind:8332");
        assert_eq!(env["BITCOIND_ZMQ_URL"], "tcp://bitcoind:28332");
        assert_eq!(env["BITCOIND_DBCACHE"], "4000");
    }

    #[test]
    fn external_node_uses_its_own_host() {
        let inst = instance(
            "b",
            Some(DependencyService::External(ExternalDependency {
                host: "10.0.0.1".into(),
                port: 8332,
                user: "rpc".into(),
                password: "pw".into(),
                zmq_port: 28332,
            })),
        );
        let env = instance_environment(&inst, &settings(&[])).unwrap();
        assert_eq!(env["DEPLOY_BITCOIND"], "false");
        assert_eq!(env["BITCOIND_URL"], "http://10.0.0.1:8332");
        assert_eq!(env["BITCOIND_DBCACHE"], "450");
    }

    #[test]
    fn absent_block_takes_defaults_from_environment() {
        let inst = instance("c", None);
        let env = instance_environment(
            &inst,
            &settings(&[(BITCOIND_RPC_USER, "u"), (BITCOIND_RPC_PASSWORD, "p")]),
        )
        .unwrap();
        assert_eq!(env["BITCOIND_RPC_PORT"], "8332");
        assert_eq!(env["BITCOIND_RPC_USER"], "u");

        let err = instance_environment(&inst, &settings(&[])).unwrap_err();
        match err {
            FleetdagError::Configuration { message, .. } => {
                assert!(message.contains(BITCOIND_RPC_USER))
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }
}
