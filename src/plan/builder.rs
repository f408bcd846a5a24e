// src/plan/builder.rs

//! Turns one validated instance into its dependency-ordered provisioning plan.
//!
//! Happy path (edges read "after"):
//!
//! ```text
//! apt-config -> base-setup -> reboot -> settle -> cleanup -> create-data-dir
//!   create-data-dir -> { write-restore-compose, copy-config } -> restore
//!   restore -> write-service-compose -> start-services
//! base-setup -> create-swap
//! ```
//!
//! Templates are rendered and environment inputs resolved here, so a missing
//! value fails the run before any host is contacted.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::config::env::{DASHBOARD_NAME, INDEXER_IMAGE, RESTORE_IMAGE, SSH_PRIVATE_KEY_PATH};
use crate::config::{ConfigSection, DependencyService, EnvSettings, Instance};
use crate::errors::Result;
use crate::exec::shell::quote;
use crate::exec::Connection;
use crate::fingerprint::FingerprintInput;
use crate::plan::assets::AssetLayout;
use crate::plan::environment::instance_environment;
use crate::plan::task::{task_id, TaskAction, TaskSpec};
use crate::plan::Plan;
use crate::template;

pub const APT_CONFIG: &str = "apt-config";
pub const BASE_SETUP: &str = "base-setup";
pub const REBOOT: &str = "reboot";
pub const SETTLE: &str = "settle";
pub const CLEANUP: &str = "cleanup";
pub const CREATE_DATA_DIR: &str = "create-data-dir";
pub const WRITE_RESTORE_COMPOSE: &str = "write-restore-compose";
pub const COPY_CONFIG: &str = "copy-config";
pub const CREATE_SWAP: &str = "create-swap";
pub const RESTORE: &str = "restore";
pub const WRITE_SERVICE_COMPOSE: &str = "write-service-compose";
pub const START_SERVICES: &str = "start-services";

pub const RESTORE_COMPOSE_FILE: &str = "restore-compose.yml";
pub const SERVICE_COMPOSE_FILE: &str = "compose.yml";

/// A plan plus the connection its tasks run against.
#[derive(Debug, Clone)]
pub struct InstancePlan {
    pub plan: Plan,
    pub connection: Connection,
}

pub struct PlanBuilder<'a> {
    settings: &'a EnvSettings,
    assets: &'a AssetLayout,
    config: &'a ConfigSection,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(settings: &'a EnvSettings, assets: &'a AssetLayout, config: &'a ConfigSection) -> Self {
        Self {
            settings,
            assets,
            config,
        }
    }

    pub fn build(&self, instance: &Instance) -> Result<InstancePlan> {
        let env = instance_environment(instance, self.settings)?;
        let connection = self.connection(instance, env.clone())?;

        let name = instance.name.as_str();
        let id = |step: &str| task_id(name, step);
        let timeout = Duration::from_secs(self.config.task_timeout_secs);
        let data = instance.data_path.as_str();
        let env_params = env_params(&env);

        let restore_compose_path = format!("{data}/{RESTORE_COMPOSE_FILE}");
        let restore_compose = self.render(
            &self.assets.restore_compose_template(),
            &env,
            &[RESTORE_IMAGE],
        )?;

        let service_compose_path = format!("{data}/{SERVICE_COMPOSE_FILE}");
        let service_compose = self.render(
            &self.assets.service_compose_template(),
            &env,
            &[INDEXER_IMAGE, DASHBOARD_NAME],
        )?;

        let script = |path: PathBuf| {
            let inputs = vec![
                FingerprintInput::File(path.clone()),
                FingerprintInput::params(env_params.iter().cloned()),
            ];
            (TaskAction::RemoteScript { path }, inputs)
        };

        let mut tasks = Vec::new();

        let (action, apt_inputs) = script(self.assets.apt_config_script());
        tasks.push(TaskSpec::new(id(APT_CONFIG), action, timeout).tracked(apt_inputs.clone()));

        let (action, base_inputs) = script(self.assets.base_setup_script());
        tasks.push(
            TaskSpec::new(id(BASE_SETUP), action, timeout)
                .after([id(APT_CONFIG)])
                .tracked(base_inputs.clone()),
        );

        // Reboot only when provisioning itself changed.
        let mut provision_inputs = apt_inputs;
        provision_inputs.extend(base_inputs);
        tasks.push(
            TaskSpec::new(id(REBOOT), TaskAction::Reboot, timeout)
                .after([id(BASE_SETUP)])
                .tracked(provision_inputs.clone()),
        );

        let delay = Duration::from_secs(self.config.settle_delay_secs);
        let mut settle_inputs = provision_inputs;
        settle_inputs.push(FingerprintInput::params([SETTLE]));
        tasks.push(
            TaskSpec::new(
                id(SETTLE),
                TaskAction::Settle {
                    delay,
                    poll_interval: Duration::from_secs(self.config.reachability_poll_secs),
                },
                delay + Duration::from_secs(self.config.reachability_timeout_secs),
            )
            .after([id(REBOOT)])
            .tracked(settle_inputs),
        );

        let (action, inputs) = script(self.assets.cleanup_script());
        tasks.push(
            TaskSpec::new(id(CLEANUP), action, timeout)
                .after([id(SETTLE)])
                .tracked(inputs),
        );

        tasks.push(
            TaskSpec::new(
                id(CREATE_DATA_DIR),
                TaskAction::RemoteCommand {
                    command: format!(
                        "sudo mkdir -p {dir} && sudo chown {owner} {dir}",
                        dir = quote(data),
                        owner = quote(&instance.user),
                    ),
                },
                timeout,
            )
            .after([id(CLEANUP)])
            .tracked(vec![FingerprintInput::params([
                CREATE_DATA_DIR,
                data,
                instance.user.as_str(),
            ])]),
        );

        tasks.push(
            TaskSpec::new(
                id(WRITE_RESTORE_COMPOSE),
                TaskAction::WriteFile {
                    path: restore_compose_path.clone(),
                    contents: restore_compose.rendered.clone(),
                },
                timeout,
            )
            .after([id(CREATE_DATA_DIR)])
            .tracked(restore_compose.inputs(&restore_compose_path)),
        );

        let config_dir = self.assets.config_dir();
        let remote_config = format!("{data}/config");
        tasks.push(
            TaskSpec::new(
                id(COPY_CONFIG),
                TaskAction::SyncDir {
                    local: config_dir.clone(),
                    remote: remote_config.clone(),
                },
                timeout,
            )
            .after([id(CREATE_DATA_DIR)])
            .tracked(vec![
                FingerprintInput::Dir(config_dir),
                FingerprintInput::params([remote_config]),
            ]),
        );

        let (action, inputs) = script(self.assets.create_swap_script());
        tasks.push(
            TaskSpec::new(id(CREATE_SWAP), action, timeout)
                .after([id(BASE_SETUP)])
                .tracked(inputs),
        );

        let restore_file = quote(RESTORE_COMPOSE_FILE);
        tasks.push(
            TaskSpec::new(
                id(RESTORE),
                TaskAction::RemoteCommand {
                    command: format!(
                        "cd {dir} && docker compose -f {restore_file} run --rm restore \
                         && docker compose -f {restore_file} down",
                        dir = quote(data),
                    ),
                },
                timeout,
            )
            .after([id(CREATE_DATA_DIR), id(WRITE_RESTORE_COMPOSE), id(COPY_CONFIG)])
            .tracked(vec![FingerprintInput::params([
                RESTORE,
                data,
                restore_compose.rendered.as_str(),
            ])]),
        );

        tasks.push(
            TaskSpec::new(
                id(WRITE_SERVICE_COMPOSE),
                TaskAction::WriteFile {
                    path: service_compose_path.clone(),
                    contents: service_compose.rendered.clone(),
                },
                timeout,
            )
            .after([id(RESTORE)])
            .tracked(service_compose.inputs(&service_compose_path)),
        );

        // Runs on every invocation so a compose edit always reaches the stack.
        // No `bitcoind` block means the instance runs its own node.
        let deploys_node = instance
            .bitcoind
            .as_ref()
            .is_none_or(DependencyService::is_local);
        let profile = if deploys_node {
            " --profile bitcoind"
        } else {
            ""
        };
        let compose = format!("docker compose -f {}{profile}", quote(SERVICE_COMPOSE_FILE));
        tasks.push(
            TaskSpec::new(
                id(START_SERVICES),
                TaskAction::RemoteCommand {
                    command: format!(
                        "cd {dir} && {compose} pull && {compose} up -d --remove-orphans",
                        dir = quote(data),
                    ),
                },
                timeout,
            )
            .after([id(WRITE_SERVICE_COMPOSE)]),
        );

        let plan = Plan::new(name, instance.host.as_str(), tasks)?;
        debug!(instance = %name, tasks = plan.tasks.len(), "built provisioning plan");

        Ok(InstancePlan { plan, connection })
    }

    fn connection(&self, instance: &Instance, env: BTreeMap<String, String>) -> Result<Connection> {
        let key_path = match &instance.key_path {
            Some(path) => path.clone(),
            None => PathBuf::from(self.settings.require(SSH_PRIVATE_KEY_PATH)?),
        };
        Ok(Connection {
            instance: instance.name.clone(),
            host: instance.host.clone(),
            user: instance.user.clone(),
            key_path,
            env,
        })
    }

    /// Render a template against the instance environment plus the named
    /// run-level variables. Only placeholders the template uses are supplied.
    fn render(
        &self,
        path: &std::path::Path,
        env: &BTreeMap<String, String>,
        required: &[&str],
    ) -> Result<RenderedTemplate> {
        let source = self.assets.read_template(path)?;

        let mut available: BTreeMap<&str, String> = env
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        for key in required {
            available.insert(*key, self.settings.require(key)?.to_string());
        }

        let values: Vec<(&str, String)> = template::placeholders(&source)
            .iter()
            .filter_map(|name| {
                available
                    .get_key_value(name.as_str())
                    .map(|(k, v)| (*k, v.clone()))
            })
            .collect();

        let rendered = template::render(&source, &values)?;
        Ok(RenderedTemplate {
            template: path.to_path_buf(),
            values: values
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect(),
            rendered,
        })
    }
}

struct RenderedTemplate {
    template: PathBuf,
    /// `KEY=value` for every substituted placeholder.
    values: Vec<String>,
    rendered: String,
}

impl RenderedTemplate {
    fn inputs(&self, remote_path: &str) -> Vec<FingerprintInput> {
        let mut params = vec![remote_path.to_string()];
        params.extend(self.values.iter().cloned());
        vec![
            FingerprintInput::File(self.template.clone()),
            FingerprintInput::Params(params),
        ]
    }
}

fn env_params(env: &BTreeMap<String, String>) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{k}={v}")).collect()
}
