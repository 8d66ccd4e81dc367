use crate::error::{ReleaseError, Result};
use semver::{BuildMetadata, Prerelease};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Semantic version representation.
///
/// Ordering follows SemVer precedence: major, minor, patch, then pre-release.
/// Build metadata is carried for display but never takes part in comparison,
/// so `1.0.0+a` and `1.0.0+b` are equal.
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Prerelease,
    pub build: BuildMetadata,
}

impl Version {
    /// Create a new stable version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            pre: Prerelease::EMPTY,
            build: BuildMetadata::EMPTY,
        }
    }

    /// Parse a bare version string (e.g., "1.2.3", "1.2.3-rc.1+build.5").
    /// A leading 'v' or 'V' is tolerated.
    pub fn parse(input: &str) -> Result<Self> {
        let clean = input.trim().trim_start_matches(['v', 'V']);

        let parsed = semver::Version::parse(clean).map_err(|e| {
            ReleaseError::version(format!("Invalid version '{}': {}", input, e))
        })?;

        Ok(Version {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            pre: parsed.pre,
            build: parsed.build,
        })
    }

    /// Apply a bump: the bumped component increments, every lower one resets to
    /// zero. Pre-release and build metadata are dropped.
    ///
    /// `BumpKind::None` returns the version unchanged. Fails when the bumped
    /// component is already `u64::MAX`.
    pub fn bump(&self, kind: BumpKind) -> Result<Self> {
        let next = |component: u64| {
            component.checked_add(1).ok_or_else(|| {
                ReleaseError::version(format!("Cannot apply {} bump to {}: component overflow", kind, self))
            })
        };

        Ok(match kind {
            BumpKind::Major => Version::new(next(self.major)?, 0, 0),
            BumpKind::Minor => Version::new(self.major, next(self.minor)?, 0),
            BumpKind::Patch => Version::new(self.major, self.minor, next(self.patch)?),
            BumpKind::None => self.clone(),
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            // semver::Prerelease already sorts the empty pre-release last
            .then_with(|| self.pre.cmp(&other.pre))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre)?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Version bump decision, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    #[default]
    None,
    Patch,
    Minor,
    Major,
}

impl BumpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BumpKind::None => "none",
            BumpKind::Patch => "patch",
            BumpKind::Minor => "minor",
            BumpKind::Major => "major",
        }
    }

    pub fn is_release(&self) -> bool {
        *self != BumpKind::None
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
