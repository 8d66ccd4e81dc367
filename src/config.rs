use crate::domain::{default_severity_table, SeverityTable, TagFormat, Version};
use crate::error::{ReleaseError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "gitrelease.toml";

/// Represents the complete configuration for git-release.
///
/// Contains the release branch, the commit-type severity table, tag naming,
/// changelog and artifact locations, and per-stage timeouts.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_tag_format")]
    pub tag_format: String,

    #[serde(default = "default_initial_version")]
    pub initial_version: String,

    /// Package registry publishing is delegated to other tooling
    #[serde(default)]
    pub registry_publish: bool,

    #[serde(default = "default_severity_table")]
    pub types: SeverityTable,

    #[serde(default)]
    pub changelog: ChangelogConfig,

    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_tag_format() -> String {
    "v{version}".to_string()
}

fn default_initial_version() -> String {
    "1.0.0".to_string()
}

/// Changelog file settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChangelogConfig {
    #[serde(default = "default_changelog_path")]
    pub path: PathBuf,

    /// Heading written at the top of a new changelog
    #[serde(default = "default_changelog_title")]
    pub title: String,
}

fn default_changelog_path() -> PathBuf {
    PathBuf::from("CHANGELOG.md")
}

fn default_changelog_title() -> String {
    "# Changelog".to_string()
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        ChangelogConfig {
            path: default_changelog_path(),
            title: default_changelog_title(),
        }
    }
}

/// Files committed back to the branch after a release.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ArtifactsConfig {
    /// File holding the bare version string
    #[serde(default = "default_version_file")]
    pub version_file: PathBuf,

    /// Extra working-tree files to include in the release commit
    #[serde(default)]
    pub assets: Vec<PathBuf>,

    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

fn default_version_file() -> PathBuf {
    PathBuf::from("VERSION")
}

fn default_commit_message() -> String {
    "chore(release): {version} [skip ci]".to_string()
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        ArtifactsConfig {
            version_file: default_version_file(),
            assets: Vec::new(),
            commit_message: default_commit_message(),
        }
    }
}

impl ArtifactsConfig {
    pub fn commit_message_for(&self, version: &Version) -> String {
        self.commit_message
            .replace("{version}", &version.to_string())
    }
}

/// Per-stage timeouts for repository gateway calls, in seconds.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TimeoutsConfig {
    #[serde(default = "default_history_secs")]
    pub history_secs: u64,

    #[serde(default = "default_publish_secs")]
    pub publish_secs: u64,

    #[serde(default = "default_push_secs")]
    pub push_secs: u64,
}

fn default_history_secs() -> u64 {
    60
}

fn default_publish_secs() -> u64 {
    60
}

fn default_push_secs() -> u64 {
    120
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        TimeoutsConfig {
            history_secs: default_history_secs(),
            publish_secs: default_publish_secs(),
            push_secs: default_push_secs(),
        }
    }
}

impl TimeoutsConfig {
    pub fn history(&self) -> Duration {
        Duration::from_secs(self.history_secs)
    }

    pub fn publish(&self) -> Duration {
        Duration::from_secs(self.publish_secs)
    }

    pub fn push(&self) -> Duration {
        Duration::from_secs(self.push_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            branch: default_branch(),
            remote: default_remote(),
            tag_format: default_tag_format(),
            initial_version: default_initial_version(),
            registry_publish: false,
            types: default_severity_table(),
            changelog: ChangelogConfig::default(),
            artifacts: ArtifactsConfig::default(),
            timeouts: TimeoutsConfig::default(),
        }
    }
}

impl Config {
    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.branch.trim().is_empty() {
            return Err(ReleaseError::config("branch must not be empty"));
        }
        if self.remote.trim().is_empty() {
            return Err(ReleaseError::config("remote must not be empty"));
        }

        self.tag_format()?;
        self.initial_version()?;

        if self.changelog.path == self.artifacts.version_file {
            return Err(ReleaseError::config(
                "changelog.path and artifacts.version_file must differ",
            ));
        }

        if self.timeouts.history_secs == 0
            || self.timeouts.publish_secs == 0
            || self.timeouts.push_secs == 0
        {
            return Err(ReleaseError::config("timeouts must be at least one second"));
        }

        Ok(())
    }

    pub fn tag_format(&self) -> Result<TagFormat> {
        TagFormat::new(self.tag_format.as_str())
            .map_err(|e| ReleaseError::config(e.to_string()))
    }

    pub fn initial_version(&self) -> Result<Version> {
        Version::parse(&self.initial_version)
            .map_err(|e| ReleaseError::config(format!("initial_version: {}", e)))
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `gitrelease.toml` in current directory
/// 3. `.gitrelease.toml` in user config directory
/// 4. Default configuration if no file found
///
/// The result is validated before it is returned.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let local = Path::new(CONFIG_FILE_NAME);

    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path).map_err(|e| {
            ReleaseError::config(format!("Cannot read {}: {}", path.display(), e))
        })?
    } else if local.exists() {
        fs::read_to_string(local)?
    } else if let Some(user_path) = dirs::config_dir().map(|d| d.join(format!(".{}", CONFIG_FILE_NAME))) {
        if user_path.exists() {
            fs::read_to_string(user_path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    let config = parse_config(&config_str)?;
    Ok(config)
}

/// Parse and validate a TOML document.
pub fn parse_config(source: &str) -> Result<Config> {
    let config: Config = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
}
