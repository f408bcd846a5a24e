// src/exec/executor.rs

//! Runs a single task against its instance's connection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::TaskResult;
use crate::errors::{FleetdagError, Result};
use crate::exec::connection::Connection;
use crate::exec::shell::{heredoc_write, quote};
use crate::exec::transport::{CommandOutput, Transport};
use crate::fingerprint::{fingerprint, SharedSignatureStore, Signature};
use crate::plan::{ChangePolicy, TaskAction, TaskSpec};

/// Exit status `ssh` reports when the connection itself failed.
pub const SSH_CONNECTION_FAILED: i32 = 255;

/// Command used to probe whether a host answers again.
const PROBE_COMMAND: &str = "true";

/// Executes tasks through a [`Transport`], consulting and updating the
/// shared signature store.
pub struct TaskExecutor {
    transport: Arc<dyn Transport>,
    store: SharedSignatureStore,
}

impl TaskExecutor {
    pub fn new(transport: Arc<dyn Transport>, store: SharedSignatureStore) -> Self {
        Self { transport, store }
    }

    /// Execute `task`, or skip it when its signature matches the recorded one.
    ///
    /// Never returns an error: every failure becomes a `Failed` result so
    /// only this task's dependents are affected.
    pub async fn execute(&self, task: &TaskSpec, connection: &Connection) -> TaskResult {
        let signature = match &task.change {
            ChangePolicy::Always => None,
            ChangePolicy::Tracked(inputs) => match fingerprint(inputs) {
                Ok(sig) => Some(sig),
                Err(err) => {
                    warn!(
                        instance = %connection.instance,
                        task = %task.id,
                        error = %err,
                        "could not compute task signature"
                    );
                    return TaskResult::failed(&task.id, &err);
                }
            },
        };

        if let Some(sig) = &signature {
            if self.recorded(&task.id).as_ref() == Some(sig) {
                info!(
                    instance = %connection.instance,
                    task = %task.id,
                    signature = %sig,
                    "signature unchanged; skipping task"
                );
                return TaskResult::skipped(&task.id);
            }
        }

        info!(
            instance = %connection.instance,
            task = %task.id,
            action = task.action.kind(),
            "starting task"
        );

        let outcome = match tokio::time::timeout(task.timeout, self.run_action(task, connection)).await
        {
            Ok(result) => result,
            Err(_) => Err(FleetdagError::Timeout {
                task: task.id.clone(),
                after: task.timeout,
            }),
        };

        match outcome {
            Ok(output) => {
                if let Some(sig) = &signature {
                    self.record(&task.id, sig);
                }
                info!(
                    instance = %connection.instance,
                    task = %task.id,
                    exit_code = output.exit_code.unwrap_or(0),
                    "task succeeded"
                );
                TaskResult::succeeded(&task.id)
            }
            Err(err) => {
                warn!(
                    instance = %connection.instance,
                    task = %task.id,
                    error = %err,
                    "task failed"
                );
                TaskResult::failed(&task.id, &err)
            }
        }
    }

    async fn run_action(&self, task: &TaskSpec, connection: &Connection) -> Result<CommandOutput> {
        match &task.action {
            TaskAction::RemoteScript { path } => {
                let body = tokio::fs::read_to_string(path).await.map_err(|source| {
                    FleetdagError::Fingerprint {
                        path: path.clone(),
                        source,
                    }
                })?;
                let output = self.remote(connection, &connection.with_environment(&body)).await?;
                check_exit(&task.id, output)
            }
            TaskAction::RemoteCommand { command } => {
                let output = self.remote(connection, &connection.with_environment(command)).await?;
                check_exit(&task.id, output)
            }
            TaskAction::WriteFile { path, contents } => {
                let snippet = heredoc_write(path, contents)?;
                let output = self.remote(connection, &snippet).await?;
                check_exit(&task.id, output)
            }
            TaskAction::SyncDir { local, remote } => {
                let command = format!(
                    "rsync -az --delete -e {ssh} {src} {dest}",
                    ssh = quote(&connection.ssh_command_line()),
                    src = quote(&format!("{}/", local.display())),
                    dest = quote(&format!("{}:{}/", connection.destination(), remote)),
                );
                let output = self
                    .transport
                    .run_local(&command)
                    .await
                    .map_err(|e| FleetdagError::connection(format!("{e:#}")))?;
                check_exit(&task.id, output)
            }
            TaskAction::Reboot => {
                let output = self.remote(connection, "sudo reboot\n").await?;
                match output.exit_code {
                    // The reboot usually tears the session down before ssh sees an exit status.
                    Some(0) | Some(SSH_CONNECTION_FAILED) => Ok(output),
                    _ => check_exit(&task.id, output),
                }
            }
            TaskAction::Settle {
                delay,
                poll_interval,
            } => self.settle(connection, *delay, *poll_interval).await,
        }
    }

    /// Wait out the fixed delay, then probe until the host answers. The
    /// caller's timeout bounds the whole wait.
    async fn settle(
        &self,
        connection: &Connection,
        delay: Duration,
        poll_interval: Duration,
    ) -> Result<CommandOutput> {
        debug!(instance = %connection.instance, ?delay, "waiting for host to settle");
        tokio::time::sleep(delay).await;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.transport.run_remote(connection, PROBE_COMMAND).await {
                Ok(output) if output.success() => {
                    debug!(instance = %connection.instance, attempt, "host reachable");
                    return Ok(output);
                }
                Ok(output) => {
                    debug!(
                        instance = %connection.instance,
                        attempt,
                        exit_code = output.exit_code.unwrap_or(-1),
                        "host not reachable yet"
                    );
                }
                Err(err) => {
                    debug!(instance = %connection.instance, attempt, error = %err, "probe failed");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn remote(&self, connection: &Connection, script: &str) -> Result<CommandOutput> {
        self.transport
            .run_remote(connection, script)
            .await
            .map_err(|e| FleetdagError::connection(format!("{e:#}")))
    }

    /// A store that cannot be read counts as "no record": the task runs.
    fn recorded(&self, task: &str) -> Option<Signature> {
        let guard = match self.store.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(task = %task, "signature store lock poisoned");
                return None;
            }
        };
        match guard.load(task) {
            Ok(sig) => sig,
            Err(err) => {
                warn!(task = %task, error = %err, "failed to read recorded signature");
                None
            }
        }
    }

    fn record(&self, task: &str, signature: &Signature) {
        let mut guard = match self.store.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(task = %task, "signature store lock poisoned; not recording");
                return;
            }
        };
        if let Err(err) = guard.save(task, signature) {
            warn!(task = %task, error = %err, "failed to record signature");
        } else {
            debug!(task = %task, signature = %signature, "recorded signature");
        }
    }
}

fn check_exit(task: &str, output: CommandOutput) -> Result<CommandOutput> {
    match output.exit_code {
        Some(0) => Ok(output),
        Some(SSH_CONNECTION_FAILED) => Err(FleetdagError::Connection {
            message: format!("connection lost while running '{task}'"),
            stderr: output.stderr,
        }),
        Some(code) => Err(FleetdagError::RemoteExecution {
            task: task.to_string(),
            exit_code: code,
            stderr: output.stderr,
        }),
        None => Err(FleetdagError::RemoteExecution {
            task: task.to_string(),
            exit_code: -1,
            stderr: output.stderr,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaskStatus;
    use crate::exec::transport::BoxFuture;
    use crate::fingerprint::{FingerprintInput, MemorySignatureStore, SignatureStore};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Answers every command with a fixed exit code and counts calls.
    struct FixedTransport {
        exit_code: i32,
        calls: Mutex<Vec<String>>,
    }

    impl FixedTransport {
        fn new(exit_code: i32) -> Arc<Self> {
            Arc::new(Self {
                exit_code,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn answer(&self, command: &str) -> anyhow::Result<CommandOutput> {
            self.calls.lock().unwrap().push(command.to_string());
            Ok(CommandOutput {
                exit_code: Some(self.exit_code),
                stdout: String::new(),
                stderr: "boom".to_string(),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Transport for FixedTransport {
        fn run_remote<'a>(
            &'a self,
            _connection: &'a Connection,
            script: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<CommandOutput>> {
            Box::pin(async move { self.answer(script) })
        }

        fn run_local<'a>(&'a self, command: &'a str) -> BoxFuture<'a, anyhow::Result<CommandOutput>> {
            Box::pin(async move { self.answer(command) })
        }
    }

    fn connection() -> Connection {
        Connection {
            instance: "a".to_string(),
            host: "10.0.0.1".to_string(),
            user: "ubuntu".to_string(),
            key_path: PathBuf::from("/keys/id"),
            env: BTreeMap::new(),
        }
    }

    fn memory_store() -> SharedSignatureStore {
        let store: Box<dyn SignatureStore> = Box::new(MemorySignatureStore::new());
        Arc::new(Mutex::new(store))
    }

    fn tracked_command(id: &str) -> TaskSpec {
        TaskSpec::new(
            id,
            TaskAction::RemoteCommand {
                command: "echo hi".to_string(),
            },
            Duration::from_secs(5),
        )
        .tracked(vec![FingerprintInput::params(["v1"])])
    }

    #[tokio::test]
    async fn second_run_with_same_signature_is_skipped() {
        let transport = FixedTransport::new(0);
        let executor = TaskExecutor::new(transport.clone(), memory_store());
        let task = tracked_command("a:step");

        let first = executor.execute(&task, &connection()).await;
        assert_eq!(first.status, TaskStatus::Succeeded);
        let second = executor.execute(&task, &connection()).await;
        assert_eq!(second.status, TaskStatus::Skipped);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn failure_does_not_record_signature() {
        let transport = FixedTransport::new(2);
        let store = memory_store();
        let executor = TaskExecutor::new(transport.clone(), store.clone());
        let task = tracked_command("a:step");

        let result = executor.execute(&task, &connection()).await;
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.stderr, "boom");
        assert!(store.lock().unwrap().load("a:step").unwrap().is_none());

        executor.execute(&task, &connection()).await;
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn ssh_exit_255_is_connection_error_except_for_reboot() {
        let transport = FixedTransport::new(SSH_CONNECTION_FAILED);
        let executor = TaskExecutor::new(transport, memory_store());

        let result = executor.execute(&tracked_command("a:step"), &connection()).await;
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.stderr, "boom");
        assert!(result.message.unwrap_or_default().contains("Connection error"));

        let reboot = TaskSpec::new("a:reboot", TaskAction::Reboot, Duration::from_secs(5));
        let result = executor.execute(&reboot, &connection()).await;
        assert_eq!(result.status, TaskStatus::Succeeded);
    }

    #[tokio::test]
    async fn unreadable_input_fails_only_that_task() {
        let executor = TaskExecutor::new(FixedTransport::new(0), memory_store());
        let task = TaskSpec::new(
            "a:script",
            TaskAction::RemoteScript {
                path: PathBuf::from("/definitely/not/here.sh"),
            },
            Duration::from_secs(5),
        )
        .tracked(vec![FingerprintInput::File(PathBuf::from(
            "/definitely/not/here.sh",
        ))]);

        let result = executor.execute(&task, &connection()).await;
        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result.message.unwrap_or_default().contains("Fingerprint error"));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_that_never_answers_times_out() {
        let executor = TaskExecutor::new(FixedTransport::new(SSH_CONNECTION_FAILED), memory_store());
        let task = TaskSpec::new(
            "a:settle",
            TaskAction::Settle {
                delay: Duration::from_secs(60),
                poll_interval: Duration::from_secs(10),
            },
            Duration::from_secs(120),
        );

        let result = executor.execute(&task, &connection()).await;
        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result.message.unwrap_or_default().contains("timed out"));
    }
}
