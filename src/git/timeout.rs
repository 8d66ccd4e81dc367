//! Per-call time limits for gateway operations.
//!
//! Each call runs on tokio's blocking pool and the caller waits at most the
//! configured duration. A call that overruns is abandoned, not cancelled: the
//! blocking task finishes in the background and its result is dropped. An
//! abandoned `create_tag` can therefore still push the tag after the run has
//! failed, which is why the orchestrator reports that case as
//! `publish_indeterminate` rather than as a retryable failure.

use crate::config::TimeoutsConfig;
use crate::domain::CommitRecord;
use crate::error::{ReleaseError, Result};
use crate::git::{ArtifactSet, ReleaseRecord, RepositoryGateway, TagRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

/// Time limits grouped by pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    /// Reads: history, tags, files
    pub history: Duration,
    /// Tag creation and release publication
    pub publish: Duration,
    /// Artifact commit and push
    pub push: Duration,
}

impl From<&TimeoutsConfig> for StageTimeouts {
    fn from(config: &TimeoutsConfig) -> Self {
        StageTimeouts {
            history: config.history(),
            publish: config.publish(),
            push: config.push(),
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        StageTimeouts::from(&TimeoutsConfig::default())
    }
}

/// Gateway wrapper that bounds every call in time.
pub struct TimedGateway<G> {
    inner: Arc<G>,
    timeouts: StageTimeouts,
    /// Taken on drop so abandoned calls do not hold up shutdown
    runtime: Option<Runtime>,
}

impl<G: RepositoryGateway + 'static> TimedGateway<G> {
    pub fn new(inner: G, timeouts: StageTimeouts) -> Result<Self> {
        TimedGateway::from_arc(Arc::new(inner), timeouts)
    }

    /// Wrap a shared gateway; the caller keeps its own handle.
    pub fn from_arc(inner: Arc<G>, timeouts: StageTimeouts) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .thread_name("gateway-call")
            .build()?;

        Ok(TimedGateway {
            inner,
            timeouts,
            runtime: Some(runtime),
        })
    }

    fn call<T, F>(&self, operation: &'static str, limit: Duration, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&G) -> Result<T> + Send + 'static,
    {
        let runtime = self.runtime.as_ref().ok_or_else(|| {
            ReleaseError::remote(format!("gateway call '{}' after shutdown", operation))
        })?;
        let inner = Arc::clone(&self.inner);

        runtime.block_on(async move {
            let task = tokio::task::spawn_blocking(move || f(&inner));

            match tokio::time::timeout(limit, task).await {
                Ok(Ok(result)) => {
                    debug!(operation, "gateway call finished");
                    result
                }
                Ok(Err(join_error)) => Err(ReleaseError::remote(format!(
                    "gateway call '{}' ended without a result: {}",
                    operation, join_error
                ))),
                Err(_) => {
                    warn!(operation, seconds = limit.as_secs(), "gateway call timed out");
                    Err(ReleaseError::Timeout {
                        operation: operation.to_string(),
                        seconds: limit.as_secs(),
                    })
                }
            }
        })
    }
}

impl<G> Drop for TimedGateway<G> {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl<G: RepositoryGateway + 'static> RepositoryGateway for TimedGateway<G> {
    fn fetch(&self, branch: &str) -> Result<()> {
        let branch = branch.to_string();
        self.call("fetch", self.timeouts.history, move |g| g.fetch(&branch))
    }

    fn branch_head(&self, branch: &str) -> Result<String> {
        let branch = branch.to_string();
        self.call("branch_head", self.timeouts.history, move |g| {
            g.branch_head(&branch)
        })
    }

    fn list_tags(&self, branch: &str) -> Result<Vec<TagRef>> {
        let branch = branch.to_string();
        self.call("list_tags", self.timeouts.history, move |g| {
            g.list_tags(&branch)
        })
    }

    fn list_commits_since(&self, branch: &str, since_tag: Option<&str>) -> Result<Vec<CommitRecord>> {
        let branch = branch.to_string();
        let since_tag = since_tag.map(str::to_string);
        self.call("list_commits_since", self.timeouts.history, move |g| {
            g.list_commits_since(&branch, since_tag.as_deref())
        })
    }

    fn tag_target(&self, tag: &str) -> Result<Option<String>> {
        let tag = tag.to_string();
        self.call("tag_target", self.timeouts.history, move |g| g.tag_target(&tag))
    }

    fn create_tag(&self, record: &ReleaseRecord) -> Result<()> {
        let record = record.clone();
        self.call("create_tag", self.timeouts.publish, move |g| {
            g.create_tag(&record)
        })
    }

    fn publish_release(&self, record: &ReleaseRecord) -> Result<()> {
        let record = record.clone();
        self.call("publish_release", self.timeouts.publish, move |g| {
            g.publish_release(&record)
        })
    }

    fn push_artifacts(&self, branch: &str, files: &ArtifactSet, message: &str) -> Result<String> {
        let branch = branch.to_string();
        let files = files.clone();
        let message = message.to_string();
        self.call("push_artifacts", self.timeouts.push, move |g| {
            g.push_artifacts(&branch, &files, &message)
        })
    }

    fn read_file(&self, branch: &str, path: &Path) -> Result<Option<String>> {
        let branch = branch.to_string();
        let path: PathBuf = path.to_path_buf();
        self.call("read_file", self.timeouts.history, move |g| {
            g.read_file(&branch, &path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::{MockGateway, MockOperation};

    fn short() -> StageTimeouts {
        StageTimeouts {
            history: Duration::from_millis(200),
            publish: Duration::from_millis(200),
            push: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_fast_call_passes_through() {
        let mock = MockGateway::new("main").with_commits(&["feat: a", "fix: b"]);
        let timed = TimedGateway::new(mock, short()).unwrap();
        let commits = timed.list_commits_since("main", None).unwrap();
        assert_eq!(commits.len(), 2);
    }

    #[test]
    fn test_slow_call_times_out() {
        let mock = Arc::new(MockGateway::new("main").with_commits(&["feat: a"]));
        mock.delay_on(MockOperation::PushArtifacts, Duration::from_secs(2));
        let timed = TimedGateway::from_arc(Arc::clone(&mock), short()).unwrap();

        let err = timed
            .push_artifacts("main", &ArtifactSet::new(), "chore(release): 1.0.0")
            .unwrap_err();
        assert_eq!(err.reason_code(), "timeout");
    }

    #[test]
    fn test_abandoned_call_does_not_block_drop() {
        let mock = Arc::new(MockGateway::new("main").with_commits(&["feat: a"]));
        mock.delay_on(MockOperation::CreateTag, Duration::from_secs(5));
        let timed = TimedGateway::from_arc(Arc::clone(&mock), short()).unwrap();

        let started = std::time::Instant::now();
        let head = mock.head().unwrap();
        let record = ReleaseRecord {
            version: crate::domain::Version::new(1, 0, 0),
            tag: "v1.0.0".to_string(),
            target: head,
            created_at: chrono::Utc::now(),
            notes: String::new(),
            commits: vec![],
        };
        let err = timed.create_tag(&record).unwrap_err();
        drop(timed);

        assert_eq!(err.reason_code(), "timeout");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_errors_are_forwarded() {
        let mock = MockGateway::new("main").with_commits(&["feat: a"]);
        mock.fail_on(MockOperation::ListCommits, "auth required");
        let timed = TimedGateway::new(mock, short()).unwrap();
        let err = timed.list_commits_since("main", None).unwrap_err();
        assert_eq!(err.reason_code(), "history_unavailable");
    }
}
