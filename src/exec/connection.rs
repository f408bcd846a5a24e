// src/exec/connection.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::exec::shell::{export_preamble, quote};

const BODY_FUNCTION: &str = "fleetdag_task";

/// How to reach one instance, plus the environment exported into every
/// remote command for it. Shared read-only by all tasks of the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub instance: String,
    pub host: String,
    pub user: String,
    pub key_path: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl Connection {
    /// `user@host`
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Options passed to every `ssh` invocation, before the destination.
    pub fn ssh_options(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_path.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ConnectTimeout=30".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=30".to_string(),
        ]
    }

    /// The ssh command line as one string, for `rsync -e`.
    pub fn ssh_command_line(&self) -> String {
        let mut parts = vec!["ssh".to_string()];
        parts.extend(self.ssh_options().iter().map(|opt| quote(opt)));
        parts.join(" ")
    }

    /// Prefix `body` with the exported environment map.
    ///
    /// The script itself arrives on `bash -s` stdin, so the body runs as a
    /// function with stdin from `/dev/null`. A command that reads stdin
    /// cannot swallow the lines after it.
    pub fn with_environment(&self, body: &str) -> String {
        let mut script = export_preamble(&self.env);
        script.push_str(BODY_FUNCTION);
        // Leading `:` keeps an empty or comment-only body valid.
        script.push_str("() {\n:\n");
        script.push_str(body);
        if !body.ends_with('\n') {
            script.push('\n');
        }
        script.push_str("}\n");
        script.push_str(BODY_FUNCTION);
        script.push_str(" </dev/null\n");
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let mut env = BTreeMap::new();
        env.insert("DATA_PATH".to_string(), "/mnt/data".to_string());
        Connection {
            instance: "a".to_string(),
            host: "10.0.0.1".to_string(),
            user: "ubuntu".to_string(),
            key_path: PathBuf::from("/keys/id"),
            env,
        }
    }

    #[test]
    fn environment_precedes_body() {
        let script = conn().with_environment("echo \"$DATA_PATH\"");
        assert_eq!(
            script,
            "export DATA_PATH='/mnt/data'\n\
             fleetdag_task() {\n:\necho \"$DATA_PATH\"\n}\n\
             fleetdag_task </dev/null\n"
        );
    }

    #[test]
    fn ssh_command_line_quotes_options() {
        let c = conn();
        assert_eq!(c.destination(), "ubuntu@10.0.0.1");
        assert!(c.ssh_command_line().starts_with("ssh '-i' '/keys/id' '-o' 'BatchMode=yes'"));
    }
}
