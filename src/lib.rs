// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fingerprint;
pub mod logging;
pub mod plan;
pub mod template;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{discover_override_path, load_and_validate, EnvSettings, FleetConfig, Instance};
use crate::engine::{run_fleet, RunReport};
use crate::errors::{FleetdagError, Result};
use crate::exec::{SshTransport, TaskExecutor, Transport};
use crate::fingerprint::open_store;
use crate::plan::{AssetLayout, InstancePlan, PlanBuilder};

/// Everything a run needs besides the environment and the transport.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: PathBuf,
    pub override_path: Option<PathBuf>,
    pub assets: PathBuf,
    /// Restrict the run to these instances. Empty means all.
    pub only: Vec<String>,
    pub dry_run: bool,
}

impl From<&CliArgs> for RunOptions {
    fn from(args: &CliArgs) -> Self {
        Self {
            config: args.config.clone(),
            override_path: args.override_path.clone(),
            assets: args.assets.clone(),
            only: args.only.clone(),
            dry_run: args.dry_run,
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// Reads the process environment, drives every selected instance over ssh
/// and prints the per-instance summary.
pub async fn run(args: CliArgs) -> anyhow::Result<RunReport> {
    let options = RunOptions::from(&args);
    let settings = EnvSettings::from_env();
    let transport: Arc<dyn Transport> = Arc::new(SshTransport::new());

    let report = run_with(&options, &settings, transport).await?;
    if !options.dry_run {
        print!("{report}");
    }
    Ok(report)
}

/// Load, validate, plan and execute.
///
/// Every plan is built before any host is contacted, so configuration,
/// environment and template errors abort the whole run up front.
pub async fn run_with(
    options: &RunOptions,
    settings: &EnvSettings,
    transport: Arc<dyn Transport>,
) -> Result<RunReport> {
    let override_path = options
        .override_path
        .clone()
        .or_else(|| discover_override_path(&options.config));
    let cfg = load_and_validate(&options.config, override_path.as_deref())?;
    let selected = select_instances(&cfg, &options.only)?;

    let assets = AssetLayout::new(&options.assets);
    let plans = build_plans(&cfg, &selected, settings, &assets)?;

    if options.dry_run {
        print_dry_run(&cfg, &plans);
        return Ok(RunReport::default());
    }

    let active: Vec<String> = plans
        .iter()
        .flat_map(|p| p.plan.task_ids().map(str::to_string))
        .collect();

    let root = config_root_dir(&options.config);
    let store = open_store(cfg.config.signature_storage_mode, &root);
    let executor = Arc::new(TaskExecutor::new(transport, Arc::clone(&store)));

    info!(instances = plans.len(), "starting fleet run");
    let instances = run_fleet(plans, executor).await;

    // A partial run must not forget signatures of instances it skipped.
    if options.only.is_empty() {
        let ids: Vec<&str> = active.iter().map(String::as_str).collect();
        match store.lock() {
            Ok(mut guard) => {
                if let Err(err) = guard.prune(&ids) {
                    warn!(error = %err, "failed to prune signature store");
                }
            }
            Err(_) => warn!("signature store lock poisoned; not pruning"),
        }
    }

    Ok(RunReport { instances })
}

/// Instances named by `--only`, in declaration order. Unknown names are a
/// configuration error.
pub fn select_instances<'a>(cfg: &'a FleetConfig, only: &[String]) -> Result<Vec<&'a Instance>> {
    if only.is_empty() {
        return Ok(cfg.instances.iter().collect());
    }
    for name in only {
        if cfg.instance(name).is_none() {
            return Err(FleetdagError::config(
                "cli",
                format!("--only names unknown instance '{name}'"),
            ));
        }
    }
    Ok(cfg
        .instances
        .iter()
        .filter(|i| only.iter().any(|n| n == &i.name))
        .collect())
}

pub fn build_plans(
    cfg: &FleetConfig,
    instances: &[&Instance],
    settings: &EnvSettings,
    assets: &AssetLayout,
) -> Result<Vec<InstancePlan>> {
    let builder = PlanBuilder::new(settings, assets, &cfg.config);
    instances
        .iter()
        .map(|instance| builder.build(instance))
        .collect()
}

/// Directory the signature store lives under.
///
/// - If the config path has a non-empty parent (e.g. "fleet/Fleet.toml"),
///   that directory is used.
/// - A bare filename like "Fleet.toml" falls back to the current directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_dry_run(cfg: &FleetConfig, plans: &[InstancePlan]) {
    println!("fleetdag dry-run");
    println!(
        "  config.signature_storage_mode = {:?}",
        cfg.config.signature_storage_mode
    );
    println!("  config.task_timeout_secs = {}", cfg.config.task_timeout_secs);
    println!("  config.settle_delay_secs = {}", cfg.config.settle_delay_secs);
    println!();

    for p in plans {
        print!("{}", p.plan.describe());
        for (key, value) in &p.connection.env {
            let shown = if key.contains("PASSWORD") { "***" } else { value.as_str() };
            println!("      env {key}={shown}");
        }
        println!();
    }

    debug!("dry-run complete (no execution)");
}
