// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetdagError {
    /// Malformed or variant-inconsistent instance record, or a missing
    /// environment input. `scope` names the offending service (or
    /// `environment` / `config`).
    #[error("Configuration error in '{scope}': {message}")]
    Configuration { scope: String, message: String },

    #[error("Fingerprint error for {path:?}: {source}")]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ssh could not reach the host, or lost it mid-command.
    #[error("Connection error: {message}")]
    Connection { message: String, stderr: String },

    #[error("Remote execution of '{task}' failed with exit code {exit_code}: {stderr}")]
    RemoteExecution {
        task: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Task '{task}' timed out after {after:?}")]
    Timeout { task: String, after: Duration },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Cycle detected in plan: {0}")]
    PlanCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FleetdagError {
    pub fn connection(message: impl Into<String>) -> Self {
        FleetdagError::Connection {
            message: message.into(),
            stderr: String::new(),
        }
    }

    pub fn config(scope: impl Into<String>, message: impl Into<String>) -> Self {
        FleetdagError::Configuration {
            scope: scope.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FleetdagError>;
