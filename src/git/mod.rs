//! Repository gateway abstraction layer
//!
//! This module provides a trait-based abstraction over the version-control and
//! hosting operations a release needs, allowing for multiple implementations
//! including real Git repositories and mock implementations for testing.
//!
//! # Overview
//!
//! The primary abstraction is the [RepositoryGateway] trait. The concrete
//! implementations include:
//!
//! - [repository::Git2Gateway]: A real implementation using the `git2` crate
//! - [mock::MockGateway]: An in-memory implementation for testing
//! - [timeout::TimedGateway]: Wraps any gateway and bounds each call in time
//!
//! # Usage
//!
//! The orchestrator depends on the [RepositoryGateway] trait only.
//!
//! ```rust
//! # use git_release::git::RepositoryGateway;
//! # fn example<G: RepositoryGateway>(gateway: &G) -> git_release::Result<()> {
//! let head = gateway.branch_head("main")?;
//! let commits = gateway.list_commits_since("main", None)?;
//! println!("{} commits up to {}", commits.len(), head);
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;
pub mod timeout;

pub use mock::MockGateway;
pub use repository::Git2Gateway;
pub use timeout::TimedGateway;

use crate::domain::{CommitRecord, Version};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A tag visible from the release branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRef {
    pub name: String,
    /// Commit the tag resolves to
    pub target: String,
}

/// A published release. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRecord {
    pub version: Version,
    pub tag: String,
    pub target: String,
    pub created_at: DateTime<Utc>,
    pub notes: String,
    /// Hashes of every commit the release includes
    pub commits: Vec<String>,
}

/// Files to commit, keyed by repository-relative path.
pub type ArtifactSet = BTreeMap<PathBuf, String>;

/// Repository and hosting operations consumed by the release orchestrator.
///
/// ## Thread Safety
///
/// All implementors must be `Send + Sync` so calls can be bounded by a
/// timeout on a worker thread.
///
/// ## Error Handling
///
/// Methods return [crate::error::Result<T>]. Implementations map underlying
/// errors (like `git2::Error`) to [crate::error::ReleaseError] variants; the
/// orchestrator then maps each failure onto its stage's taxonomy entry.
pub trait RepositoryGateway: Send + Sync {
    /// Bring local history and tags up to date with the remote. Gateways
    /// without a remote side keep the default no-op.
    fn fetch(&self, _branch: &str) -> Result<()> {
        Ok(())
    }

    /// Commit at the tip of `branch`.
    fn branch_head(&self, branch: &str) -> Result<String>;

    /// Tags whose target is reachable from the tip of `branch`.
    fn list_tags(&self, branch: &str) -> Result<Vec<TagRef>>;

    /// Commits on `branch` after `since_tag` (or the whole history when
    /// `None`), oldest first.
    ///
    /// # Errors
    /// [crate::error::ReleaseError::HistoryUnavailable] when history cannot be enumerated.
    fn list_commits_since(&self, branch: &str, since_tag: Option<&str>) -> Result<Vec<CommitRecord>>;

    /// Commit a tag points at, `None` if the tag does not exist anywhere the
    /// gateway can see (including the remote tag store).
    fn tag_target(&self, tag: &str) -> Result<Option<String>>;

    /// Whether a tag exists.
    fn tag_exists(&self, tag: &str) -> Result<bool> {
        Ok(self.tag_target(tag)?.is_some())
    }

    /// Create `record.tag` at `record.target` and make it visible remotely.
    /// This is the commit point of a release.
    ///
    /// # Errors
    /// [crate::error::ReleaseError::TagConflict] when the tag already exists.
    fn create_tag(&self, record: &ReleaseRecord) -> Result<()>;

    /// Publish the hosted release notes for `record.tag`. Called before the
    /// tag exists; publishing the same tag again replaces the notes.
    fn publish_release(&self, record: &ReleaseRecord) -> Result<()>;

    /// Commit `files` on top of `branch` and push. Returns the new commit.
    fn push_artifacts(&self, branch: &str, files: &ArtifactSet, message: &str) -> Result<String>;

    /// Read a file as committed at the tip of `branch`, `None` when absent.
    fn read_file(&self, branch: &str, path: &std::path::Path) -> Result<Option<String>>;
}
