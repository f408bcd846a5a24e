// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use toml::{Table, Value};
use tracing::{debug, info};

use crate::config::model::{ConfigSection, FleetConfig, RawConfigFile, RawInstance};
use crate::errors::{FleetdagError, Result};

/// Read a TOML document into a table without interpreting it.
pub fn load_table(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let table: Table = toml::from_str(&contents)?;
    Ok(table)
}

/// Load a configuration file (and an optional override document) and return
/// the raw `RawConfigFile`.
///
/// This only performs TOML deserialization and merging; it does **not**
/// perform semantic validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>, override_path: Option<&Path>) -> Result<RawConfigFile> {
    let mut table = load_table(&path)?;

    if let Some(over) = override_path {
        info!(path = ?over, "applying override document");
        let over_table = load_table(over)?;
        merge_tables(&mut table, over_table);
    }

    RawConfigFile::from_table(table)
}

/// Load, merge and validate.
///
/// - Reads the base TOML document.
/// - Deep-merges the override document on top of it, if given.
/// - Deserializes each `[instance.<name>]` record, reporting failures
///   against the offending service.
/// - Applies the discriminated dependency-service rule.
pub fn load_and_validate(path: impl AsRef<Path>, override_path: Option<&Path>) -> Result<FleetConfig> {
    let raw = load_from_path(&path, override_path)?;
    let config = FleetConfig::try_from(raw)?;
    debug!(instances = config.instances.len(), "configuration validated");
    Ok(config)
}

/// `<dir>/<stem>.override.toml`, returned only when it exists on disk.
pub fn discover_override_path(config_path: &Path) -> Option<PathBuf> {
    let stem = config_path.file_stem()?.to_str()?;
    let candidate = config_path.with_file_name(format!("{stem}.override.toml"));
    candidate.is_file().then_some(candidate)
}

/// Deep-merge `over` into `base`: nested tables merge key by key, any other
/// value in `over` replaces the one in `base`. Keys new to `base` are appended
/// in `over`'s order.
pub fn merge_tables(base: &mut Table, over: Table) {
    for (key, over_value) in over {
        match (base.get_mut(&key), over_value) {
            (Some(Value::Table(base_inner)), Value::Table(over_inner)) => {
                merge_tables(base_inner, over_inner);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

impl RawConfigFile {
    /// Split a parsed document into `[config]` and per-instance records.
    pub fn from_table(mut table: Table) -> Result<Self> {
        let config = match table.remove("config") {
            Some(value) => value
                .try_into::<ConfigSection>()
                .map_err(|e| FleetdagError::config("config", e.to_string()))?,
            None => ConfigSection::default(),
        };

        let instances_table = match table.remove("instance") {
            Some(Value::Table(t)) => t,
            Some(_) => {
                return Err(FleetdagError::config(
                    "config",
                    "`instance` must be a table of [instance.<name>] sections",
                ));
            }
            None => Table::new(),
        };

        if let Some(unknown) = table.keys().next() {
            return Err(FleetdagError::config(
                "config",
                format!("unknown top-level key '{unknown}'"),
            ));
        }

        let mut instances = Vec::with_capacity(instances_table.len());
        for (name, value) in instances_table {
            let raw = value
                .try_into::<RawInstance>()
                .map_err(|e| FleetdagError::config(&name, e.to_string()))?;
            instances.push((name, raw));
        }

        Ok(Self { config, instances })
    }
}
