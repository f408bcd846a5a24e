// src/exec/transport.rs

//! Pluggable transport abstraction.
//!
//! The executor talks to a `Transport` instead of spawning `ssh` directly.
//! Production uses [`SshTransport`]; tests provide a recording fake so no
//! host is ever contacted.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::exec::connection::Connection;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait abstracting how commands reach a host.
///
/// An `Err` means the command could not be started at all; a started
/// command that exits non-zero is an `Ok` with that exit code.
pub trait Transport: Send + Sync {
    /// Run `script` under the remote user's shell. The caller has already
    /// prefixed the exported environment.
    fn run_remote<'a>(
        &'a self,
        connection: &'a Connection,
        script: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput>>;

    /// Run `command` on the controller machine.
    fn run_local<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<CommandOutput>>;
}

/// Transport backed by the system `ssh` client.
#[derive(Debug, Clone, Default)]
pub struct SshTransport;

impl SshTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for SshTransport {
    fn run_remote<'a>(
        &'a self,
        connection: &'a Connection,
        script: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput>> {
        Box::pin(async move {
            let mut cmd = Command::new("ssh");
            cmd.args(connection.ssh_options())
                .arg(connection.destination())
                .arg("bash -s");

            debug!(
                instance = %connection.instance,
                host = %connection.host,
                bytes = script.len(),
                "sending script over ssh"
            );
            run_with_stdin(cmd, script.as_bytes().to_vec())
                .await
                .with_context(|| format!("running ssh to {}", connection.destination()))
        })
    }

    fn run_local<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<CommandOutput>> {
        Box::pin(async move {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            debug!(cmd = %command, "running local command");
            run_with_stdin(cmd, Vec::new())
                .await
                .with_context(|| format!("running local command '{command}'"))
        })
    }
}

async fn run_with_stdin(mut cmd: Command, input: Vec<u8>) -> Result<CommandOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("spawning process")?;

    // Feed stdin concurrently so a chatty child cannot deadlock on a full pipe.
    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&input).await {
                warn!(error = %e, "failed to write script to child stdin");
            }
            // Dropping stdin closes the pipe so `bash -s` sees EOF.
        });
    }

    let output = child
        .wait_with_output()
        .await
        .context("waiting for process")?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
