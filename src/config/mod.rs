// src/config/mod.rs

//! Configuration loading and validation for fleetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file plus optional override document (`loader.rs`).
//! - Validate instance records, including the discriminated
//!   dependency-service variant (`validate.rs`).
//! - Capture environment inputs (`env.rs`).

pub mod env;
pub mod loader;
pub mod model;
pub mod validate;

pub use env::EnvSettings;
pub use loader::{discover_override_path, load_and_validate, load_from_path, merge_tables};
pub use model::{
    ConfigSection, DEFAULT_BITCOIND_DBCACHE, DEFAULT_BITCOIND_PORT, DEFAULT_BITCOIND_ZMQ_PORT,
    DependencyService, ExternalDependency, FleetConfig, Instance,
    LocalDependency, RawConfigFile, RawDependencyService, RawInstance,
};
pub use validate::validate_instance;
