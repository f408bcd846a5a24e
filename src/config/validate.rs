// src/config/validate.rs

use crate::config::model::{
    ConfigSection, DependencyService, FleetConfig, Instance, RawConfigFile,
    RawDependencyService, RawInstance,
};
use crate::errors::{FleetdagError, Result};

impl TryFrom<RawConfigFile> for FleetConfig {
    type Error = crate::errors::FleetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_instances(&raw)?;
        validate_global_config(&raw.config)?;

        let instances = raw
            .instances
            .iter()
            .map(|(name, inst)| validate_instance(name, inst))
            .collect::<Result<Vec<_>>>()?;

        Ok(FleetConfig::new_unchecked(raw.config, instances))
    }
}

fn ensure_has_instances(cfg: &RawConfigFile) -> Result<()> {
    if cfg.instances.is_empty() {
        return Err(FleetdagError::config(
            "config",
            "config must contain at least one [instance.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigSection) -> Result<()> {
    let positive = [
        ("task_timeout_secs", cfg.task_timeout_secs),
        ("reachability_timeout_secs", cfg.reachability_timeout_secs),
        ("reachability_poll_secs", cfg.reachability_poll_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(FleetdagError::config(
                "config",
                format!("[config].{field} must be >= 1 (got 0)"),
            ));
        }
    }
    Ok(())
}

/// Validate one `[instance.<name>]` record and convert it into an [`Instance`].
pub fn validate_instance(name: &str, raw: &RawInstance) -> Result<Instance> {
    validate_name(name)?;

    if raw.host.trim().is_empty() {
        return Err(FleetdagError::config(name, "`host` must not be empty"));
    }
    if raw.user.trim().is_empty() {
        return Err(FleetdagError::config(name, "`user` must not be empty"));
    }
    if !raw.data_path.starts_with('/') {
        return Err(FleetdagError::config(
            name,
            format!("`data_path` must be an absolute path (got '{}')", raw.data_path),
        ));
    }
    let data_path = raw.data_path.trim().trim_end_matches('/');
    if data_path.is_empty() {
        return Err(FleetdagError::config(
            name,
            format!("`data_path` must name a directory below '/' (got '{}')", raw.data_path),
        ));
    }
    if let Some(key) = &raw.key_path {
        if key.as_os_str().is_empty() {
            return Err(FleetdagError::config(name, "`key_path` must not be empty"));
        }
    }

    let bitcoind = raw
        .bitcoind
        .as_ref()
        .map(|dep| validate_dependency(name, dep))
        .transpose()?;

    Ok(Instance {
        name: name.to_string(),
        host: raw.host.trim().to_string(),
        user: raw.user.trim().to_string(),
        key_path: raw.key_path.clone(),
        data_path: data_path.to_string(),
        bitcoind,
    })
}

/// Names namespace every task id and signature-store key, so they must not
/// contain whitespace or separators.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FleetdagError::config(name, "instance name must not be empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(FleetdagError::config(
            name,
            "instance name may only contain ASCII letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

/// Exactly one branch must be populated, selected by `deploy`.
fn validate_dependency(name: &str, dep: &RawDependencyService) -> Result<DependencyService> {
    match (dep.deploy, &dep.local, &dep.external) {
        (true, Some(local), None) => {
            if local.port == 0 || local.zmq_port == 0 {
                return Err(FleetdagError::config(
                    name,
                    "bitcoind.local ports must be non-zero",
                ));
            }
            Ok(DependencyService::Local(local.clone()))
        }
        (false, None, Some(external)) => {
            if external.host.trim().is_empty() {
                return Err(FleetdagError::config(
                    name,
                    "bitcoind.external.host must not be empty",
                ));
            }
            if external.port == 0 || external.zmq_port == 0 {
                return Err(FleetdagError::config(
                    name,
                    "bitcoind.external ports must be non-zero",
                ));
            }
            Ok(DependencyService::External(external.clone()))
        }
        (true, None, _) => Err(FleetdagError::config(
            name,
            "bitcoind.deploy = true requires a [bitcoind.local] block",
        )),
        (true, Some(_), Some(_)) => Err(FleetdagError::config(
            name,
            "bitcoind.deploy = true conflicts with a [bitcoind.external] block",
        )),
        (false, _, None) => Err(FleetdagError::config(
            name,
            "bitcoind.deploy = false requires a [bitcoind.external] block",
        )),
        (false, Some(_), Some(_)) => Err(FleetdagError::config(
            name,
            "bitcoind.deploy = false conflicts with a [bitcoind.local] block",
        )),
    }
}
