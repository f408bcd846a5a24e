//! Recording transport for tests. Never contacts a host.

use std::sync::Mutex;

use fleetdag::exec::{BoxFuture, CommandOutput, Connection, Transport, SSH_CONNECTION_FAILED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Target host; the controller's commands record the host they sync to.
    pub host: String,
    pub kind: CallKind,
    pub command: String,
}

struct FailureRule {
    host: String,
    needle: String,
    exact: bool,
    exit_code: i32,
    stderr: String,
}

impl FailureRule {
    fn matches(&self, command: &str) -> bool {
        if self.exact {
            command == self.needle
        } else {
            command.contains(&self.needle)
        }
    }
}

/// Transport that records every command and answers success, unless a
/// failure rule matches.
///
/// `sudo reboot` answers with ssh's 255, the way a real reboot drops the
/// session.
#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<RecordedCall>>,
    rules: Mutex<Vec<FailureRule>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail commands for `host` whose text contains `needle`.
    pub fn fail_when(&self, host: &str, needle: &str, exit_code: i32, stderr: &str) {
        self.push_rule(host, needle, false, exit_code, stderr);
    }

    /// Fail commands for `host` that are exactly `command`.
    pub fn fail_exact(&self, host: &str, command: &str, exit_code: i32, stderr: &str) {
        self.push_rule(host, command, true, exit_code, stderr);
    }

    fn push_rule(&self, host: &str, needle: &str, exact: bool, exit_code: i32, stderr: &str) {
        self.rules.lock().unwrap().push(FailureRule {
            host: host.to_string(),
            needle: needle.to_string(),
            exact,
            exit_code,
            stderr: stderr.to_string(),
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, host: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.host == host)
            .collect()
    }

    /// Commands for `host` containing `needle`.
    pub fn count_matching(&self, host: &str, needle: &str) -> usize {
        self.calls_for(host)
            .iter()
            .filter(|c| c.command.contains(needle))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn answer(&self, host: &str, kind: CallKind, command: &str) -> CommandOutput {
        self.calls.lock().unwrap().push(RecordedCall {
            host: host.to_string(),
            kind,
            command: command.to_string(),
        });

        let rules = self.rules.lock().unwrap();
        if let Some(rule) = rules
            .iter()
            .find(|r| r.host == host && r.matches(command))
        {
            return CommandOutput {
                exit_code: Some(rule.exit_code),
                stdout: String::new(),
                stderr: rule.stderr.clone(),
            };
        }

        let exit_code = if command.contains("sudo reboot") {
            SSH_CONNECTION_FAILED
        } else {
            0
        };
        CommandOutput {
            exit_code: Some(exit_code),
            ..CommandOutput::default()
        }
    }
}

impl Transport for FakeTransport {
    fn run_remote<'a>(
        &'a self,
        connection: &'a Connection,
        script: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<CommandOutput>> {
        Box::pin(async move { Ok(self.answer(&connection.host, CallKind::Remote, script)) })
    }

    fn run_local<'a>(&'a self, command: &'a str) -> BoxFuture<'a, anyhow::Result<CommandOutput>> {
        // rsync destinations look like '<user>@<host>:<path>/'.
        let host = command
            .rsplit('@')
            .next()
            .and_then(|rest| rest.split(':').next())
            .unwrap_or_default()
            .to_string();
        Box::pin(async move { Ok(self.answer(&host, CallKind::Local, command)) })
    }
}
