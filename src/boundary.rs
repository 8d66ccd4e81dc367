use crate::domain::commit::short_hash;
use serde::Serialize;
use std::fmt;

/// Non-fatal conditions met while looking at release history.
/// They never change the outcome of a run but are reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundaryWarning {
    /// No new commits since the latest release tag
    NoNewCommits {
        latest_tag: String,
        current_commit_hash: String,
    },
    /// Tag follows the tag format but its version part is not valid SemVer
    UnparsableTag { tag: String, reason: String },
    /// The latest release is a pre-release; the next version is computed from its core
    PrereleaseBaseline { tag: String },
    /// Registry publishing was requested but is left to other tooling
    RegistryPublishDelegated,
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::NoNewCommits {
                latest_tag,
                current_commit_hash,
            } => write!(
                f,
                "No new commits since tag '{}' (current: {})",
                latest_tag,
                short_hash(current_commit_hash)
            ),
            BoundaryWarning::UnparsableTag { tag, reason } => {
                write!(f, "Cannot parse tag '{}': {}", tag, reason)
            }
            BoundaryWarning::PrereleaseBaseline { tag } => write!(
                f,
                "Latest release '{}' is a pre-release; bumping from its release core",
                tag
            ),
            BoundaryWarning::RegistryPublishDelegated => write!(
                f,
                "registry_publish is enabled but package publishing is not performed by git-release"
            ),
        }
    }
}
