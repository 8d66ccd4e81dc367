//! Release orchestrator.
//!
//! Drives one release run through the state machine: fetch history, classify,
//! resolve the next version, prepare the changelog and version file, publish
//! the release notes and the tag, then commit the artifacts back to the branch.
//!
//! Nothing outside the process changes before `PUBLISHING`. Inside it the tag
//! is written last, so a run that fails before the tag exists is repeated in
//! full by the next one. A failure in `COMMITTING` leaves the published
//! release in place and is reported as a partial success.

use crate::analyzer::{group_entries, ReleasePlan, Resolution, VersionResolver};
use crate::boundary::BoundaryWarning;
use crate::changelog::ChangelogBuilder;
use crate::config::{ArtifactsConfig, Config};
use crate::domain::{Classifier, CommitRecord, TagFormat, Version};
use crate::error::{ReleaseError, Result};
use crate::git::{ArtifactSet, ReleaseRecord, RepositoryGateway, TagRef};
use crate::release::state::{ReleaseState, StateMachine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Exit status for `DONE`, `NO_RELEASE` and dry runs.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status for a failed run.
pub const EXIT_FAILED: i32 = 1;
/// Exit status when the release was published but the artifact push failed.
pub const EXIT_PARTIAL_SUCCESS: i32 = 3;

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Stop after `PREPARING`.
    pub dry_run: bool,
    /// Release date written to the changelog. Sampled at run start when unset.
    pub released_at: Option<DateTime<Utc>>,
}

impl ReleaseOptions {
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_released_at(mut self, released_at: DateTime<Utc>) -> Self {
        self.released_at = Some(released_at);
        self
    }
}

/// Why a run ended in `NO_RELEASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoReleaseReason {
    /// No commit since the last release warrants a version bump
    NoQualifyingChanges,
    /// The computed version is already tagged at the same commit
    AlreadyReleased,
}

impl NoReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoReleaseReason::NoQualifyingChanges => "no_qualifying_changes",
            NoReleaseReason::AlreadyReleased => "already_released",
        }
    }
}

/// The stage a run failed in and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub stage: ReleaseState,
    pub reason: String,
    pub message: String,
    /// Whether a fresh run from `IDLE` is safe
    pub retryable: bool,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Released {
        version: Version,
        tag: String,
        /// Commit carrying the updated artifacts
        commit: String,
    },
    NoRelease {
        reason: NoReleaseReason,
    },
    DryRun {
        version: Version,
        tag: String,
    },
    /// The release exists but the branch lacks its artifacts
    PartialSuccess {
        version: Version,
        tag: String,
        failure: Failure,
    },
    Failed {
        failure: Failure,
    },
}

/// Everything a run produced, in a form fit for display and JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub branch: String,
    pub dry_run: bool,
    /// Every state visited, starting at `IDLE`
    pub states: Vec<ReleaseState>,
    pub plan: Option<ReleasePlan>,
    /// Changelog section rendered for the plan
    pub changelog: Option<String>,
    /// Files the release commit writes
    pub artifacts: Vec<PathBuf>,
    pub warnings: Vec<BoundaryWarning>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn final_state(&self) -> ReleaseState {
        self.states.last().copied().unwrap_or(ReleaseState::Idle)
    }

    /// Machine-readable reason for anything other than a plain release.
    pub fn reason_code(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Released { .. } | RunOutcome::DryRun { .. } => None,
            RunOutcome::NoRelease { reason } => Some(reason.as_str()),
            RunOutcome::PartialSuccess { failure, .. } | RunOutcome::Failed { failure } => {
                Some(failure.reason.as_str())
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            RunOutcome::Released { .. } | RunOutcome::NoRelease { .. } | RunOutcome::DryRun { .. } => {
                EXIT_SUCCESS
            }
            RunOutcome::PartialSuccess { .. } => EXIT_PARTIAL_SUCCESS,
            RunOutcome::Failed { .. } => EXIT_FAILED,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == EXIT_SUCCESS
    }
}

/// Artifacts computed in `PREPARING`. Held in memory until `COMMITTING`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PreparedRelease {
    section: String,
    files: ArtifactSet,
    commit_message: String,
}

/// Last release reachable from the branch.
#[derive(Debug, Clone)]
struct Baseline {
    tag: String,
    version: Version,
}

struct History {
    head: String,
    baseline: Option<Baseline>,
    commits: Vec<CommitRecord>,
}

#[derive(Default)]
struct Run {
    machine: StateMachine,
    plan: Option<ReleasePlan>,
    prepared: Option<PreparedRelease>,
    warnings: Vec<BoundaryWarning>,
}

impl Run {
    fn warn(&mut self, warning: BoundaryWarning) {
        warn!(%warning, "release boundary");
        self.warnings.push(warning);
    }
}

/// Runs releases for one branch against a [RepositoryGateway].
pub struct ReleaseOrchestrator<'a, G: RepositoryGateway + ?Sized> {
    gateway: &'a G,
    branch: String,
    tag_format: TagFormat,
    classifier: Classifier,
    resolver: VersionResolver,
    changelog: ChangelogBuilder,
    changelog_path: PathBuf,
    artifacts: ArtifactsConfig,
    registry_publish: bool,
    options: ReleaseOptions,
}

impl<'a, G: RepositoryGateway + ?Sized> ReleaseOrchestrator<'a, G> {
    /// Build an orchestrator from a validated configuration.
    pub fn new(gateway: &'a G, config: &Config) -> Result<Self> {
        config.validate()?;

        Ok(ReleaseOrchestrator {
            gateway,
            branch: config.branch.clone(),
            tag_format: config.tag_format()?,
            classifier: Classifier::new(config.types.clone()),
            resolver: VersionResolver::new(config.initial_version()?),
            changelog: ChangelogBuilder::new(config.changelog.title.clone()),
            changelog_path: config.changelog.path.clone(),
            artifacts: config.artifacts.clone(),
            registry_publish: config.registry_publish,
            options: ReleaseOptions::default(),
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: ReleaseOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute one run. Never panics on gateway failures; every failure is
    /// captured in the returned report.
    pub fn run(&self) -> RunReport {
        let released_at = self.options.released_at.unwrap_or_else(Utc::now);
        let mut run = Run::default();

        info!(branch = %self.branch, dry_run = self.options.dry_run, "release run started");
        if self.registry_publish {
            run.warn(BoundaryWarning::RegistryPublishDelegated);
        }

        let outcome = match self.drive(&mut run, released_at) {
            Ok(outcome) => outcome,
            Err(err) => self.fail(&mut run, err),
        };

        let artifacts = run
            .prepared
            .as_ref()
            .map(|p| p.files.keys().cloned().collect())
            .unwrap_or_default();

        RunReport {
            branch: self.branch.clone(),
            dry_run: self.options.dry_run,
            states: run.machine.into_history(),
            plan: run.plan,
            changelog: run.prepared.map(|p| p.section),
            artifacts,
            warnings: run.warnings,
            outcome,
        }
    }

    fn drive(&self, run: &mut Run, released_at: DateTime<Utc>) -> Result<RunOutcome> {
        run.machine.advance(ReleaseState::Fetching)?;
        let history = self
            .fetch_history(run)
            .map_err(ReleaseError::history_unavailable)?;

        run.machine.advance(ReleaseState::Classifying)?;
        let entries = self.classifier.classify_all(&history.commits);
        debug!(entries = entries.len(), "commits classified");

        run.machine.advance(ReleaseState::Resolving)?;
        let previous = history.baseline.as_ref().map(|b| &b.version);
        let (next, bump) = match self.resolver.resolve(previous, &entries)? {
            Resolution::NoReleaseDue => {
                info!(commits = entries.len(), "no release due");
                run.machine.advance(ReleaseState::NoRelease)?;
                return Ok(RunOutcome::NoRelease {
                    reason: NoReleaseReason::NoQualifyingChanges,
                });
            }
            Resolution::Release { version, bump } => (version, bump),
        };

        let plan = ReleasePlan {
            previous: previous.cloned(),
            tag: self.tag_format.format(&next),
            next,
            bump,
            target: history.head,
            groups: group_entries(&entries),
            commits: history.commits.iter().map(|c| c.hash.clone()).collect(),
        };
        info!(
            previous = ?plan.previous.as_ref().map(ToString::to_string),
            next = %plan.next,
            bump = %plan.bump,
            tag = %plan.tag,
            "release planned"
        );

        run.machine.advance(ReleaseState::Preparing)?;
        run.plan = Some(plan.clone());
        let prepared = self.prepare(&plan, released_at)?;
        run.prepared = Some(prepared.clone());

        // Idempotency guard: the computed tag may exist outside fetched history
        let existing = self
            .gateway
            .tag_target(&plan.tag)
            .map_err(ReleaseError::publish_failure)?;
        if let Some(existing) = existing {
            return self.already_released(run, &plan, existing);
        }

        if self.options.dry_run {
            info!(tag = %plan.tag, "dry run, stopping before publish");
            return Ok(RunOutcome::DryRun {
                version: plan.next.clone(),
                tag: plan.tag.clone(),
            });
        }

        run.machine.advance(ReleaseState::Publishing)?;
        let record = ReleaseRecord {
            version: plan.next.clone(),
            tag: plan.tag.clone(),
            target: plan.target.clone(),
            created_at: released_at,
            notes: prepared.section.clone(),
            commits: plan.commits.clone(),
        };

        // Notes first: they are keyed by tag and overwritten on a rerun. The
        // tag is the commit point and goes last.
        self.gateway
            .publish_release(&record)
            .map_err(ReleaseError::publish_failure)?;
        info!(tag = %record.tag, "release notes published");

        match self.gateway.create_tag(&record) {
            Ok(()) => info!(tag = %record.tag, target = %record.target, "tag created"),
            Err(ReleaseError::TagConflict { target, .. }) => {
                return self.already_released(run, &plan, target);
            }
            Err(err) => return Err(ReleaseError::tag_push_failure(err)),
        }

        run.machine.advance(ReleaseState::Committing)?;
        let commit = self
            .gateway
            .push_artifacts(&self.branch, &prepared.files, &prepared.commit_message)
            .map_err(ReleaseError::artifact_push_failure)?;
        info!(%commit, files = prepared.files.len(), "artifacts pushed");

        run.machine.advance(ReleaseState::Done)?;
        Ok(RunOutcome::Released {
            version: record.version,
            tag: record.tag,
            commit,
        })
    }

    fn fail(&self, run: &mut Run, err: ReleaseError) -> RunOutcome {
        let stage = run.machine.fail();
        let failure = Failure {
            stage,
            reason: err.reason_code().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable() && stage != ReleaseState::Committing,
        };
        error!(stage = %stage, reason = %failure.reason, error = %err, "release run failed");

        match (stage, &run.plan) {
            (ReleaseState::Committing, Some(plan)) => RunOutcome::PartialSuccess {
                version: plan.next.clone(),
                tag: plan.tag.clone(),
                failure,
            },
            _ => RunOutcome::Failed { failure },
        }
    }

    /// The tag for the computed version exists. Same commit means this run
    /// repeats an earlier one; anything else is a collision.
    fn already_released(&self, run: &mut Run, plan: &ReleasePlan, existing: String) -> Result<RunOutcome> {
        if existing != plan.target {
            return Err(ReleaseError::VersionCollision {
                tag: plan.tag.clone(),
                expected: plan.target.clone(),
                actual: existing,
            });
        }

        info!(tag = %plan.tag, "version already released at this commit");
        run.machine.advance(ReleaseState::NoRelease)?;
        Ok(RunOutcome::NoRelease {
            reason: NoReleaseReason::AlreadyReleased,
        })
    }

    fn fetch_history(&self, run: &mut Run) -> Result<History> {
        self.gateway.fetch(&self.branch)?;
        let head = self.gateway.branch_head(&self.branch)?;
        let tags = self.gateway.list_tags(&self.branch)?;
        let baseline = self.latest_release(&tags, run);

        let since = baseline.as_ref().map(|b| b.tag.as_str());
        let commits = self.gateway.list_commits_since(&self.branch, since)?;

        match &baseline {
            Some(baseline) => {
                debug!(tag = %baseline.tag, version = %baseline.version, commits = commits.len(), "history fetched");
                if commits.is_empty() {
                    run.warn(BoundaryWarning::NoNewCommits {
                        latest_tag: baseline.tag.clone(),
                        current_commit_hash: head.clone(),
                    });
                }
                if baseline.version.is_prerelease() {
                    run.warn(BoundaryWarning::PrereleaseBaseline {
                        tag: baseline.tag.clone(),
                    });
                }
            }
            None => info!(commits = commits.len(), "no previous release on branch"),
        }

        Ok(History {
            head,
            baseline,
            commits,
        })
    }

    /// Highest version among tags that follow the tag format.
    fn latest_release(&self, tags: &[TagRef], run: &mut Run) -> Option<Baseline> {
        let mut latest: Option<Baseline> = None;

        for tag in tags {
            if !self.tag_format.matches(&tag.name) {
                debug!(tag = %tag.name, pattern = self.tag_format.pattern(), "tag skipped");
                continue;
            }

            let Some(version) = self.tag_format.parse(&tag.name) else {
                run.warn(BoundaryWarning::UnparsableTag {
                    tag: tag.name.clone(),
                    reason: "version part is not valid SemVer".to_string(),
                });
                continue;
            };

            if latest.as_ref().map_or(true, |l| version > l.version) {
                latest = Some(Baseline {
                    tag: tag.name.clone(),
                    version,
                });
            }
        }

        latest
    }

    fn prepare(&self, plan: &ReleasePlan, released_at: DateTime<Utc>) -> Result<PreparedRelease> {
        let read = |path: &Path| {
            self.gateway
                .read_file(&self.branch, path)
                .map_err(ReleaseError::history_unavailable)
        };

        let mut files = ArtifactSet::new();
        for asset in &self.artifacts.assets {
            let content = read(asset.as_path())?.ok_or_else(|| {
                ReleaseError::config(format!("Artifact '{}' does not exist", asset.display()))
            })?;
            files.insert(asset.clone(), content);
        }

        let prior = read(self.changelog_path.as_path())?;
        let rendered = self
            .changelog
            .build(&plan.next, released_at, &plan.groups, prior.as_deref());

        files.insert(self.changelog_path.clone(), rendered.document);
        files.insert(self.artifacts.version_file.clone(), format!("{}\n", plan.next));

        Ok(PreparedRelease {
            section: rendered.section,
            files,
            commit_message: self.artifacts.commit_message_for(&plan.next),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::MockGateway;

    fn report(mock: &MockGateway) -> RunReport {
        ReleaseOrchestrator::new(mock, &Config::default())
            .unwrap()
            .run()
    }

    #[test]
    fn test_highest_matching_tag_is_baseline() {
        let mock = MockGateway::new("main").with_commits(&["feat: a"]);
        mock.tag_head("v1.2.0");
        mock.add_commit("fix: b");
        mock.tag_head("v1.10.0");
        mock.add_commit("fix: c");
        mock.tag_head("nightly");

        let report = report(&mock);
        let plan = report.plan.unwrap();
        assert_eq!(plan.previous, Some(Version::new(1, 10, 0)));
        assert_eq!(plan.next, Version::new(1, 10, 1));
    }

    #[test]
    fn test_unparsable_tag_is_warned() {
        let mock = MockGateway::new("main").with_commits(&["fix: a"]);
        mock.tag_head("v1.0.0-");

        let report = report(&mock);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, BoundaryWarning::UnparsableTag { tag, .. } if tag == "v1.0.0-")));
        assert_eq!(report.plan.unwrap().next, Version::new(1, 0, 0));
    }

    #[test]
    fn test_registry_publish_is_reported() {
        let mock = MockGateway::new("main").with_commits(&["chore: a"]);
        let config = Config {
            registry_publish: true,
            ..Config::default()
        };
        let report = ReleaseOrchestrator::new(&mock, &config).unwrap().run();
        assert_eq!(report.warnings, vec![BoundaryWarning::RegistryPublishDelegated]);
    }

    #[test]
    fn test_missing_asset_fails_before_publish() {
        let mock = MockGateway::new("main").with_commits(&["fix: a"]);
        let mut config = Config::default();
        config.artifacts.assets = vec![PathBuf::from("Cargo.toml")];

        let report = ReleaseOrchestrator::new(&mock, &config).unwrap().run();
        assert_eq!(report.exit_code(), EXIT_FAILED);
        assert_eq!(report.reason_code(), Some("config_invalid"));
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn test_assets_are_committed() {
        let mock = MockGateway::new("main").with_commits(&["fix: a"]);
        mock.set_file("Cargo.toml", "[package]\nversion = \"1.0.0\"\n");
        let mut config = Config::default();
        config.artifacts.assets = vec![PathBuf::from("Cargo.toml")];

        let report = ReleaseOrchestrator::new(&mock, &config).unwrap().run();
        assert!(report.is_success());
        assert_eq!(
            report.artifacts,
            vec![
                PathBuf::from("CHANGELOG.md"),
                PathBuf::from("Cargo.toml"),
                PathBuf::from("VERSION")
            ]
        );
    }
}
