//! Pure formatting functions for UI output.
//!
//! `render_*` functions build strings and are what the tests exercise;
//! `display_*` functions print them. Styling goes through `console`, which
//! drops colors automatically when the stream is not a terminal.

use crate::analyzer::ReleasePlan;
use crate::boundary::BoundaryWarning;
use crate::error::Result;
use crate::release::{RunOutcome, RunReport};
use console::style;
use std::fmt::Write;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Display a boundary warning to the user.
pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Version change, tag and the number of entries per changelog group.
pub fn render_plan(plan: &ReleasePlan) -> String {
    let mut out = String::new();

    match &plan.previous {
        Some(previous) => {
            let _ = writeln!(out, "{}", style("Release plan:").bold());
            let _ = writeln!(out, "  From: {}", style(previous).red());
            let _ = writeln!(out, "  To:   {} ({})", style(&plan.next).green(), plan.bump);
        }
        None => {
            let _ = writeln!(out, "{}", style("Initial release:").bold());
            let _ = writeln!(out, "  Version: {}", style(&plan.next).green());
        }
    }
    let _ = writeln!(out, "  Tag:    {}", style(&plan.tag).cyan());
    let _ = writeln!(out, "  Target: {}", crate::domain::commit::short_hash(&plan.target));
    let _ = writeln!(out, "  Commits: {}", plan.commits.len());

    for group in &plan.groups {
        let _ = writeln!(out, "    {:?}: {}", group.kind, group.entries.len());
    }

    out
}

/// One-line summary of how the run ended.
pub fn render_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Released { version, tag, commit } => format!(
            "{} Released {} as {} (artifacts in {})",
            style("✓").green(),
            version,
            tag,
            crate::domain::commit::short_hash(commit)
        ),
        RunOutcome::NoRelease { reason } => {
            format!("{} No release ({})", style("✓").green(), reason.as_str())
        }
        RunOutcome::DryRun { version, tag } => format!(
            "{} Dry run: would release {} as {}",
            style("→").yellow(),
            version,
            tag
        ),
        RunOutcome::PartialSuccess { tag, failure, .. } => format!(
            "{} Released {} but the branch was not updated: {} [{}]",
            style("⚠").yellow(),
            tag,
            failure.message,
            failure.reason
        ),
        RunOutcome::Failed { failure } => format!(
            "{} Failed in {}: {} [{}]",
            style("ERROR:").red().bold(),
            failure.stage,
            failure.message,
            failure.reason
        ),
    }
}

/// Full human-readable report: state path, plan, changelog preview, outcome.
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();

    let path: Vec<&str> = report.states.iter().map(|s| s.as_str()).collect();
    let _ = writeln!(
        out,
        "{} {}",
        style(format!("Branch '{}':", report.branch)).bold(),
        path.join(" → ")
    );

    if let Some(plan) = &report.plan {
        out.push('\n');
        out.push_str(&render_plan(plan));
    }

    if report.dry_run {
        if let Some(section) = &report.changelog {
            let _ = writeln!(out, "\n{}", style("Changelog preview:").bold());
            for line in section.lines() {
                let _ = writeln!(out, "  {}", line);
            }
        }
    }

    let _ = writeln!(out, "\n{}", render_outcome(&report.outcome));
    out
}

/// Report as pretty-printed JSON.
pub fn report_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Print warnings to stderr and the report to stdout.
pub fn display_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report_json(report)?);
        return Ok(());
    }

    for warning in &report.warnings {
        display_boundary_warning(warning);
    }
    print!("{}", render_report(report));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::git::MockGateway;
    use crate::release::{ReleaseOptions, ReleaseOrchestrator};
    use console::strip_ansi_codes;

    fn dry_run_report() -> RunReport {
        let mock = MockGateway::new("main").with_commits(&["feat: a", "fix(io): b"]);
        mock.tag_head("v1.2.3");
        mock.add_commit("feat: c");
        ReleaseOrchestrator::new(&mock, &Config::default())
            .unwrap()
            .with_options(ReleaseOptions::default().with_dry_run(true))
            .run()
    }

    #[test]
    fn test_render_plan_shows_versions() {
        let report = dry_run_report();
        let text = strip_ansi_codes(&render_plan(report.plan.as_ref().unwrap())).to_string();
        assert!(text.contains("From: 1.2.3"));
        assert!(text.contains("To:   1.3.0 (minor)"));
        assert!(text.contains("Tag:    v1.3.0"));
    }

    #[test]
    fn test_render_report_dry_run() {
        let report = dry_run_report();
        let text = strip_ansi_codes(&render_report(&report)).to_string();
        assert!(text.contains("IDLE → FETCHING"));
        assert!(text.contains("Changelog preview:"));
        assert!(text.contains("Dry run: would release 1.3.0 as v1.3.0"));
    }

    #[test]
    fn test_report_json_shape() {
        let report = dry_run_report();
        let value: serde_json::Value = serde_json::from_str(&report_json(&report).unwrap()).unwrap();
        assert_eq!(value["outcome"]["status"], "dry_run");
        assert_eq!(value["plan"]["next"], "1.3.0");
        assert_eq!(value["states"][0], "IDLE");
    }
}
