//! Release workflow entry point
//!
//! Turns CLI arguments plus the configuration file into one orchestrator run
//! against the repository on disk. Kept free of clap so the workflow can be
//! driven programmatically.

use crate::config::{load_config, Config};
use crate::error::Result;
use crate::git::timeout::StageTimeouts;
use crate::git::{Git2Gateway, RepositoryGateway, TimedGateway};
use crate::release::{ReleaseOptions, ReleaseOrchestrator, RunReport};
use std::path::PathBuf;
use tracing::debug;

/// Arguments for the release workflow
///
/// Mirrors the CLI Args but in a format suitable for orchestration logic.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseWorkflowArgs {
    /// Path to custom config file
    pub config_path: Option<PathBuf>,

    /// Repository to release (discovered upwards from here)
    pub repo_path: PathBuf,

    /// Overrides `branch` from the config file
    pub branch: Option<String>,

    /// Overrides `remote` from the config file
    pub remote: Option<String>,

    /// Stop after computing the plan
    pub dry_run: bool,
}

impl Default for ReleaseWorkflowArgs {
    fn default() -> Self {
        ReleaseWorkflowArgs {
            config_path: None,
            repo_path: PathBuf::from("."),
            branch: None,
            remote: None,
            dry_run: false,
        }
    }
}

/// Apply command-line overrides on top of a loaded configuration.
pub fn apply_overrides(mut config: Config, args: &ReleaseWorkflowArgs) -> Result<Config> {
    if let Some(branch) = &args.branch {
        config.branch = branch.clone();
    }
    if let Some(remote) = &args.remote {
        config.remote = remote.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Load the configuration the workflow will run with.
pub fn resolve_config(args: &ReleaseWorkflowArgs) -> Result<Config> {
    let config = load_config(args.config_path.as_deref())?;
    apply_overrides(config, args)
}

/// Run the orchestrator over any gateway.
pub fn run_with_gateway<G: RepositoryGateway + ?Sized>(
    gateway: &G,
    config: &Config,
    dry_run: bool,
) -> Result<RunReport> {
    let orchestrator = ReleaseOrchestrator::new(gateway, config)?
        .with_options(ReleaseOptions::default().with_dry_run(dry_run));
    Ok(orchestrator.run())
}

/// Main release workflow
///
/// 1. Load configuration and apply overrides
/// 2. Open the repository and bound every gateway call by its stage timeout
/// 3. Run the orchestrator once
///
/// Errors are setup failures only; everything that happens during the run is
/// in the returned report.
pub fn run_release_workflow(args: &ReleaseWorkflowArgs) -> Result<RunReport> {
    let config = resolve_config(args)?;
    debug!(branch = %config.branch, remote = %config.remote, "configuration loaded");

    let gateway = Git2Gateway::open(&args.repo_path, config.remote.clone())?;
    let timed = TimedGateway::new(gateway, StageTimeouts::from(&config.timeouts))?;

    run_with_gateway(&timed, &config, args.dry_run)
}
