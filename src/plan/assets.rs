// src/plan/assets.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{FleetdagError, Result};

pub const APT_CONFIG_SCRIPT: &str = "scripts/apt-config.sh";
pub const BASE_SETUP_SCRIPT: &str = "scripts/base-setup.sh";
pub const CLEANUP_SCRIPT: &str = "scripts/cleanup.sh";
pub const CREATE_SWAP_SCRIPT: &str = "scripts/create-swap.sh";
pub const RESTORE_COMPOSE_TEMPLATE: &str = "templates/restore-compose.yml";
pub const SERVICE_COMPOSE_TEMPLATE: &str = "templates/compose.yml";
pub const CONFIG_DIR: &str = "config";

/// Fixed layout of the provisioning assets under one root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn apt_config_script(&self) -> PathBuf {
        self.root.join(APT_CONFIG_SCRIPT)
    }

    pub fn base_setup_script(&self) -> PathBuf {
        self.root.join(BASE_SETUP_SCRIPT)
    }

    pub fn cleanup_script(&self) -> PathBuf {
        self.root.join(CLEANUP_SCRIPT)
    }

    pub fn create_swap_script(&self) -> PathBuf {
        self.root.join(CREATE_SWAP_SCRIPT)
    }

    pub fn restore_compose_template(&self) -> PathBuf {
        self.root.join(RESTORE_COMPOSE_TEMPLATE)
    }

    pub fn service_compose_template(&self) -> PathBuf {
        self.root.join(SERVICE_COMPOSE_TEMPLATE)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR)
    }

    /// Read a template at plan-build time. Templates are rendered before any
    /// remote action, so an unreadable one aborts the run up front.
    pub fn read_template(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| {
            FleetdagError::config(
                "assets",
                format!("cannot read template {}: {e}", path.display()),
            )
        })
    }
}
