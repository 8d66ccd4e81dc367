use crate::domain::CommitRecord;
use crate::error::{ReleaseError, Result};
use crate::git::{ArtifactSet, ReleaseRecord, RepositoryGateway, TagRef};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Gateway operations that can be made to fail or stall in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Fetch,
    BranchHead,
    ListTags,
    ListCommits,
    TagTarget,
    CreateTag,
    PublishRelease,
    PushArtifacts,
    ReadFile,
}

/// A pushed release commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPush {
    pub branch: String,
    pub files: ArtifactSet,
    pub message: String,
}

#[derive(Debug, Default)]
struct MockState {
    commits: Vec<CommitRecord>,
    /// Tags visible in fetched history
    tags: BTreeMap<String, String>,
    /// Tags only the remote tag store knows about
    remote_tags: BTreeMap<String, String>,
    files: BTreeMap<PathBuf, String>,
    releases: Vec<ReleaseRecord>,
    created_tags: Vec<String>,
    pushes: Vec<ArtifactPush>,
    failures: HashMap<MockOperation, String>,
    delays: HashMap<MockOperation, Duration>,
}

/// Mock repository for testing without actual git operations
#[derive(Debug, Default)]
pub struct MockGateway {
    branch: String,
    state: Mutex<MockState>,
}

impl MockGateway {
    /// Create a new empty mock repository whose single branch is `branch`
    pub fn new(branch: impl Into<String>) -> Self {
        MockGateway {
            branch: branch.into(),
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Append a commit to the branch and return its hash
    pub fn add_commit(&self, message: impl Into<String>) -> String {
        let mut state = self.state();
        let index = state.commits.len();
        // Sequence number first so short hashes stay distinct
        let hash = format!("{:07x}{:0>33}", index + 1, "");
        let timestamp = Self::base_time() + ChronoDuration::minutes(index as i64);
        state
            .commits
            .push(CommitRecord::new(hash.clone(), timestamp, message));
        hash
    }

    /// Builder form of [Self::add_commit]
    pub fn with_commits(self, messages: &[&str]) -> Self {
        for message in messages {
            self.add_commit(*message);
        }
        self
    }

    /// Add a tag pointing to a commit in history
    pub fn add_tag(&self, name: impl Into<String>, target: impl Into<String>) {
        self.state().tags.insert(name.into(), target.into());
    }

    /// Tag the current branch tip
    pub fn tag_head(&self, name: impl Into<String>) {
        let mut state = self.state();
        if let Some(head) = state.commits.last().map(|c| c.hash.clone()) {
            state.tags.insert(name.into(), head);
        }
    }

    /// Add a tag that exists remotely but is not part of the fetched history
    pub fn add_remote_tag(&self, name: impl Into<String>, target: impl Into<String>) {
        self.state().remote_tags.insert(name.into(), target.into());
    }

    pub fn set_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.state().files.insert(path.into(), content.into());
    }

    /// Make every call to `operation` fail with a remote error
    pub fn fail_on(&self, operation: MockOperation, message: impl Into<String>) {
        self.state().failures.insert(operation, message.into());
    }

    /// Undo [Self::fail_on] for `operation`
    pub fn recover(&self, operation: MockOperation) {
        self.state().failures.remove(&operation);
    }

    /// Make every call to `operation` sleep before answering
    pub fn delay_on(&self, operation: MockOperation, delay: Duration) {
        self.state().delays.insert(operation, delay);
    }

    pub fn head(&self) -> Option<String> {
        self.state().commits.last().map(|c| c.hash.clone())
    }

    pub fn releases(&self) -> Vec<ReleaseRecord> {
        self.state().releases.clone()
    }

    pub fn created_tags(&self) -> Vec<String> {
        self.state().created_tags.clone()
    }

    pub fn pushes(&self) -> Vec<ArtifactPush> {
        self.state().pushes.clone()
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state().files.get(path.as_ref()).cloned()
    }

    /// Number of calls that changed external state
    pub fn write_count(&self) -> usize {
        let state = self.state();
        state.created_tags.len() + state.releases.len() + state.pushes.len()
    }

    /// Apply configured delay, then configured failure, for `operation`.
    fn enter(&self, operation: MockOperation) -> Result<()> {
        let (delay, failure) = {
            let state = self.state();
            (
                state.delays.get(&operation).copied(),
                state.failures.get(&operation).cloned(),
            )
        };

        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        match failure {
            Some(message) => Err(ReleaseError::remote(message)),
            None => Ok(()),
        }
    }

    fn check_branch(&self, branch: &str) -> Result<()> {
        if branch == self.branch {
            Ok(())
        } else {
            Err(ReleaseError::remote(format!("Branch not found: {}", branch)))
        }
    }
}

impl RepositoryGateway for MockGateway {
    fn fetch(&self, branch: &str) -> Result<()> {
        self.enter(MockOperation::Fetch)?;
        self.check_branch(branch)
    }

    fn branch_head(&self, branch: &str) -> Result<String> {
        self.enter(MockOperation::BranchHead)?;
        self.check_branch(branch)?;
        self.head()
            .ok_or_else(|| ReleaseError::remote(format!("Branch '{}' has no commits", branch)))
    }

    fn list_tags(&self, branch: &str) -> Result<Vec<TagRef>> {
        self.enter(MockOperation::ListTags)?;
        self.check_branch(branch)?;
        let state = self.state();
        Ok(state
            .tags
            .iter()
            .filter(|(_, target)| state.commits.iter().any(|c| &c.hash == *target))
            .map(|(name, target)| TagRef {
                name: name.clone(),
                target: target.clone(),
            })
            .collect())
    }

    fn list_commits_since(&self, branch: &str, since_tag: Option<&str>) -> Result<Vec<CommitRecord>> {
        self.enter(MockOperation::ListCommits)
            .map_err(ReleaseError::history_unavailable)?;
        self.check_branch(branch)
            .map_err(ReleaseError::history_unavailable)?;

        let state = self.state();
        let start = match since_tag {
            None => 0,
            Some(tag) => {
                let target = state.tags.get(tag).ok_or_else(|| {
                    ReleaseError::HistoryUnavailable(format!("Tag not found: {}", tag))
                })?;
                let position = state
                    .commits
                    .iter()
                    .position(|c| &c.hash == target)
                    .ok_or_else(|| {
                        ReleaseError::HistoryUnavailable(format!(
                            "Tag {} is not on branch {}",
                            tag, branch
                        ))
                    })?;
                position + 1
            }
        };

        Ok(state.commits[start..].to_vec())
    }

    fn tag_target(&self, tag: &str) -> Result<Option<String>> {
        self.enter(MockOperation::TagTarget)?;
        let state = self.state();
        Ok(state
            .tags
            .get(tag)
            .or_else(|| state.remote_tags.get(tag))
            .cloned())
    }

    fn create_tag(&self, record: &ReleaseRecord) -> Result<()> {
        self.enter(MockOperation::CreateTag)?;
        let mut state = self.state();

        if let Some(existing) = state
            .tags
            .get(&record.tag)
            .or_else(|| state.remote_tags.get(&record.tag))
        {
            return Err(ReleaseError::TagConflict {
                tag: record.tag.clone(),
                target: existing.clone(),
            });
        }

        state.tags.insert(record.tag.clone(), record.target.clone());
        state.created_tags.push(record.tag.clone());
        Ok(())
    }

    fn publish_release(&self, record: &ReleaseRecord) -> Result<()> {
        self.enter(MockOperation::PublishRelease)?;
        let mut state = self.state();
        state.releases.retain(|r| r.tag != record.tag);
        state.releases.push(record.clone());
        Ok(())
    }

    fn push_artifacts(&self, branch: &str, files: &ArtifactSet, message: &str) -> Result<String> {
        self.enter(MockOperation::PushArtifacts)?;
        self.check_branch(branch)?;

        {
            let mut state = self.state();
            for (path, content) in files {
                state.files.insert(path.clone(), content.clone());
            }
            state.pushes.push(ArtifactPush {
                branch: branch.to_string(),
                files: files.clone(),
                message: message.to_string(),
            });
        }

        Ok(self.add_commit(message))
    }

    fn read_file(&self, branch: &str, path: &Path) -> Result<Option<String>> {
        self.enter(MockOperation::ReadFile)?;
        self.check_branch(branch)?;
        Ok(self.file(path))
    }
}
