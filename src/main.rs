use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use git_release::cli::orchestration::{run_release_workflow, ReleaseWorkflowArgs};
use git_release::ui;

/// Exit status for configuration and startup errors.
const EXIT_SETUP_ERROR: i32 = 2;

#[derive(clap::Parser)]
#[command(
    name = "git-release",
    version,
    about = "Compute the next semantic version from conventional commits and publish the release"
)]
struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, default_value = ".", help = "Path inside the repository to release")]
    repo: PathBuf,

    #[arg(short, long, help = "Branch to release (overrides config)")]
    branch: Option<String>,

    #[arg(short, long, help = "Remote to fetch from and push to (overrides config)")]
    remote: Option<String>,

    #[arg(long, help = "Compute the release plan without publishing anything")]
    dry_run: bool,

    #[arg(long, help = "Print the run report as JSON")]
    json: bool,

    #[arg(short, long, help = "Enable debug logging")]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let workflow_args = ReleaseWorkflowArgs {
        config_path: args.config,
        repo_path: args.repo,
        branch: args.branch,
        remote: args.remote,
        dry_run: args.dry_run,
    };

    let report = match run_release_workflow(&workflow_args)
        .with_context(|| format!("Cannot start release in {}", workflow_args.repo_path.display()))
    {
        Ok(report) => report,
        Err(e) => {
            ui::display_error(&format!("{:#}", e));
            std::process::exit(EXIT_SETUP_ERROR);
        }
    };

    ui::display_report(&report, args.json).context("Cannot print report")?;

    if !report.is_success() {
        std::process::exit(report.exit_code());
    }
    Ok(())
}
