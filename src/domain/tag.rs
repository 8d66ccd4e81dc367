use super::version::Version;
use crate::error::{ReleaseError, Result};
use regex::Regex;

const PLACEHOLDER: &str = "{version}";

/// Tag naming pattern (e.g., "v{version}", "release-{version}")
#[derive(Debug, Clone)]
pub struct TagFormat {
    pattern: String,
    matcher: Regex,
}

impl TagFormat {
    /// Create a tag format. The pattern must contain `{version}` exactly once.
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();

        if pattern.matches(PLACEHOLDER).count() != 1 {
            return Err(ReleaseError::tag(format!(
                "Tag format '{}' must contain the {} placeholder exactly once",
                pattern, PLACEHOLDER
            )));
        }

        // Escape everything, then let {version} capture any SemVer-looking text
        let escaped = regex::escape(&pattern);
        let regex_pattern = escaped.replace(r"\{version\}", r"(?P<version>\d+\.\d+\.\d+(?:[-+][0-9A-Za-z.+-]*)?)");
        let matcher = Regex::new(&format!("^{}$", regex_pattern))
            .map_err(|e| ReleaseError::tag(format!("Invalid tag format '{}': {}", pattern, e)))?;

        Ok(TagFormat { pattern, matcher })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Format a version according to pattern.
    /// Example: pattern="v{version}", version="1.2.3" -> "v1.2.3"
    pub fn format(&self, version: &Version) -> String {
        self.pattern.replace(PLACEHOLDER, &version.to_string())
    }

    pub fn matches(&self, tag: &str) -> bool {
        self.matcher.is_match(tag)
    }

    /// Extract the version from a tag name. `None` when the tag does not follow
    /// this format or its version part is not valid SemVer.
    pub fn parse(&self, tag: &str) -> Option<Version> {
        let captures = self.matcher.captures(tag)?;
        Version::parse(&captures["version"]).ok()
    }
}

impl Default for TagFormat {
    fn default() -> Self {
        TagFormat {
            pattern: "v{version}".to_string(),
            matcher: Regex::new(r"^v(?P<version>\d+\.\d+\.\d+(?:[-+][0-9A-Za-z.+-]*)?)$")
                .expect("default tag pattern is valid"),
        }
    }
}
