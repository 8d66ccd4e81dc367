use thiserror::Error;

/// Unified error type for git-release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version parsing error: {0}")]
    Version(String),

    #[error("Tag error: {0}")]
    Tag(String),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Commit history unavailable: {0}")]
    HistoryUnavailable(String),

    #[error("Tag '{tag}' already exists at {target}")]
    TagConflict { tag: String, target: String },

    #[error("Version collision: tag '{tag}' points at {actual}, expected {expected}")]
    VersionCollision {
        tag: String,
        expected: String,
        actual: String,
    },

    #[error("Release publication failed: {0}")]
    PublishFailure(String),

    #[error("Tag push outcome unknown: {0}")]
    PublishIndeterminate(String),

    #[error("Artifact push failed: {0}")]
    ArtifactPushFailure(String),

    #[error("Operation '{operation}' timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Convenience type alias for Results in git-release
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        ReleaseError::Version(msg.into())
    }

    /// Create a tag error with context
    pub fn tag(msg: impl Into<String>) -> Self {
        ReleaseError::Tag(msg.into())
    }

    /// Create a remote error with context
    pub fn remote(msg: impl Into<String>) -> Self {
        ReleaseError::Remote(msg.into())
    }

    /// Wrap a history enumeration failure. Already-classified errors pass through.
    pub fn history_unavailable(err: ReleaseError) -> Self {
        match err {
            e @ ReleaseError::HistoryUnavailable(_) => e,
            other => ReleaseError::HistoryUnavailable(other.to_string()),
        }
    }

    /// Wrap a failure at or before the commit point.
    pub fn publish_failure(err: ReleaseError) -> Self {
        match err {
            e @ (ReleaseError::PublishFailure(_)
            | ReleaseError::PublishIndeterminate(_)
            | ReleaseError::VersionCollision { .. }) => e,
            other => ReleaseError::PublishFailure(other.to_string()),
        }
    }

    /// Wrap a failure of the tag push, the last write before the release is
    /// visible. A timed-out push may still land, so its outcome is unknown.
    pub fn tag_push_failure(err: ReleaseError) -> Self {
        match err {
            ReleaseError::Timeout { operation, seconds } => ReleaseError::PublishIndeterminate(
                format!("'{}' did not answer within {}s; the tag may exist on the remote", operation, seconds),
            ),
            other => ReleaseError::publish_failure(other),
        }
    }

    /// Wrap a failure after the release became visible.
    pub fn artifact_push_failure(err: ReleaseError) -> Self {
        match err {
            e @ ReleaseError::ArtifactPushFailure(_) => e,
            other => ReleaseError::ArtifactPushFailure(other.to_string()),
        }
    }

    /// Stable machine-readable code for reports and CI logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ReleaseError::Git(_) => "git_error",
            ReleaseError::Config(_) => "config_invalid",
            ReleaseError::Version(_) => "version_invalid",
            ReleaseError::Tag(_) => "tag_error",
            ReleaseError::Remote(_) => "remote_error",
            ReleaseError::Io(_) => "io_error",
            ReleaseError::Serialization(_) => "serialization_error",
            ReleaseError::HistoryUnavailable(_) => "history_unavailable",
            ReleaseError::TagConflict { .. } => "tag_conflict",
            ReleaseError::VersionCollision { .. } => "version_collision",
            ReleaseError::PublishFailure(_) => "publish_failure",
            ReleaseError::PublishIndeterminate(_) => "publish_indeterminate",
            ReleaseError::ArtifactPushFailure(_) => "artifact_push_failure",
            ReleaseError::Timeout { .. } => "timeout",
            ReleaseError::InvalidTransition { .. } => "invalid_transition",
        }
    }

    /// Whether rerunning from scratch is safe. A collision or a tag push of
    /// unknown outcome needs a human.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ReleaseError::VersionCollision { .. } | ReleaseError::PublishIndeterminate(_)
        )
    }
}

impl From<toml::de::Error> for ReleaseError {
    fn from(err: toml::de::Error) -> Self {
        ReleaseError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReleaseError::config("test config issue");
        assert_eq!(err.to_string(), "Configuration error: test config issue");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReleaseError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
        assert_eq!(err.reason_code(), "io_error");
    }

    #[test]
    fn test_history_unavailable_wraps_once() {
        let err = ReleaseError::history_unavailable(ReleaseError::remote("connection reset"));
        assert_eq!(err.reason_code(), "history_unavailable");
        assert!(err.to_string().contains("connection reset"));

        let again = ReleaseError::history_unavailable(err);
        assert_eq!(
            again.to_string(),
            "Commit history unavailable: Remote operation failed: connection reset"
        );
    }

    #[test]
    fn test_publish_failure_keeps_collision() {
        let collision = ReleaseError::VersionCollision {
            tag: "v1.3.0".to_string(),
            expected: "aaa".to_string(),
            actual: "bbb".to_string(),
        };
        let err = ReleaseError::publish_failure(collision);
        assert_eq!(err.reason_code(), "version_collision");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_maps_to_stage_failure() {
        let timeout = ReleaseError::Timeout {
            operation: "push_artifacts".to_string(),
            seconds: 5,
        };
        let err = ReleaseError::artifact_push_failure(timeout);
        assert_eq!(err.reason_code(), "artifact_push_failure");
        assert!(err.to_string().contains("timed out after 5s"));
    }

    #[test]
    fn test_tag_push_timeout_is_indeterminate() {
        let timeout = ReleaseError::Timeout {
            operation: "create_tag".to_string(),
            seconds: 60,
        };
        let err = ReleaseError::tag_push_failure(timeout);
        assert_eq!(err.reason_code(), "publish_indeterminate");
        assert!(!err.is_retryable());

        let rejected = ReleaseError::tag_push_failure(ReleaseError::remote("403"));
        assert_eq!(rejected.reason_code(), "publish_failure");
        assert!(rejected.is_retryable());
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let error_pairs = vec![
            (ReleaseError::config("x"), "Configuration error"),
            (ReleaseError::version("x"), "Version parsing error"),
            (ReleaseError::tag("x"), "Tag error"),
            (ReleaseError::remote("x"), "Remote operation failed"),
            (
                ReleaseError::PublishFailure("x".to_string()),
                "Release publication failed",
            ),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }

    #[test]
    fn test_toml_error_is_config() {
        let parse: std::result::Result<toml::Value, toml::de::Error> = toml::from_str("a = [");
        let err: ReleaseError = parse.unwrap_err().into();
        assert_eq!(err.reason_code(), "config_invalid");
    }
}
