// src/config/env.rs

//! Environment inputs consumed per run.
//!
//! Values are captured once through an injectable lookup so tests never
//! touch the process environment. A value is only *required* when the code
//! path that needs it is actually taken; [`EnvSettings::require`] is the
//! single place that turns an absence into a configuration error.

use std::collections::BTreeMap;

use crate::errors::{FleetdagError, Result};

pub const POSTGRES_USER: &str = "POSTGRES_USER";
pub const POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
pub const POSTGRES_DB: &str = "POSTGRES_DB";
pub const BITCOIND_RPC_USER: &str = "BITCOIND_RPC_USER";
pub const BITCOIND_RPC_PASSWORD: &str = "BITCOIND_RPC_PASSWORD";
pub const BITCOIND_RPC_PORT: &str = "BITCOIND_RPC_PORT";
pub const INDEXER_IMAGE: &str = "INDEXER_IMAGE";
pub const RESTORE_IMAGE: &str = "RESTORE_IMAGE";
pub const SSH_PRIVATE_KEY_PATH: &str = "SSH_PRIVATE_KEY_PATH";
pub const DASHBOARD_NAME: &str = "DASHBOARD_NAME";

/// Every variable this program reads.
pub const KNOWN_VARIABLES: &[&str] = &[
    POSTGRES_USER,
    POSTGRES_PASSWORD,
    POSTGRES_DB,
    BITCOIND_RPC_USER,
    BITCOIND_RPC_PASSWORD,
    BITCOIND_RPC_PORT,
    INDEXER_IMAGE,
    RESTORE_IMAGE,
    SSH_PRIVATE_KEY_PATH,
    DASHBOARD_NAME,
];

/// Snapshot of the environment inputs for one run.
#[derive(Debug, Clone, Default)]
pub struct EnvSettings {
    values: BTreeMap<String, String>,
}

impl EnvSettings {
    /// Capture the known variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Capture the known variables through `lookup`. Empty values are
    /// treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let values = KNOWN_VARIABLES
            .iter()
            .filter_map(|key| {
                lookup(key)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (key.to_string(), v))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Fetch a value the current code path cannot do without.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            FleetdagError::config(
                "environment",
                format!("required environment variable {key} is not set"),
            )
        })
    }

    /// Default bitcoind RPC port, falling back to 8332.
    pub fn bitcoind_port(&self) -> Result<u16> {
        match self.get(BITCOIND_RPC_PORT) {
            None => Ok(crate::config::model::DEFAULT_BITCOIND_PORT),
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                FleetdagError::config(
                    "environment",
                    format!("{BITCOIND_RPC_PORT} must be a port number (got '{raw}')"),
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> EnvSettings {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvSettings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn missing_value_names_the_variable() {
        let env = settings(&[]);
        let err = env.require(POSTGRES_DB).unwrap_err();
        assert!(err.to_string().contains("POSTGRES_DB"));
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let env = settings(&[(POSTGRES_DB, "  ")]);
        assert!(env.require(POSTGRES_DB).is_err());
    }

    #[test]
    fn port_defaults_and_parses() {
        assert_eq!(settings(&[]).bitcoind_port().unwrap(), 8332);
        assert_eq!(
            settings(&[(BITCOIND_RPC_PORT, "18332")]).bitcoind_port().unwrap(),
            18332
        );
        assert!(settings(&[(BITCOIND_RPC_PORT, "x")]).bitcoind_port().is_err());
    }

    #[test]
    fn unknown_variables_are_ignored() {
        let env = EnvSettings::from_lookup(|_| Some("v".to_string()));
        assert_eq!(env.get("HOME"), None);
        assert_eq!(env.get(INDEXER_IMAGE), Some("v"));
    }
}
