use crate::domain::{BumpKind, ChangeEntry, ChangeType, Version};
use crate::error::Result;
use serde::Serialize;

/// Outcome of folding a batch of entries into a version decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// Nothing in the batch warrants a release
    NoReleaseDue,
    Release { version: Version, bump: BumpKind },
}

impl Resolution {
    pub fn bump(&self) -> BumpKind {
        match self {
            Resolution::NoReleaseDue => BumpKind::None,
            Resolution::Release { bump, .. } => *bump,
        }
    }

    pub fn version(&self) -> Option<&Version> {
        match self {
            Resolution::NoReleaseDue => None,
            Resolution::Release { version, .. } => Some(version),
        }
    }
}

/// Folds classified commits into the next version.
///
/// Holds no state between calls: the previous version is always passed in.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    initial_version: Version,
}

impl VersionResolver {
    /// Create a resolver that starts first releases at `initial_version`
    pub fn new(initial_version: Version) -> Self {
        VersionResolver { initial_version }
    }

    /// Highest severity present in the batch.
    pub fn bump_kind(entries: &[ChangeEntry]) -> BumpKind {
        entries
            .iter()
            .map(|e| e.bump)
            .max()
            .unwrap_or(BumpKind::None)
    }

    /// Decide the next version from the previous release (if any) and the
    /// entries since it. Only a version that cannot grow any further fails.
    pub fn resolve(&self, previous: Option<&Version>, entries: &[ChangeEntry]) -> Result<Resolution> {
        let bump = Self::bump_kind(entries);

        if !bump.is_release() {
            return Ok(Resolution::NoReleaseDue);
        }

        let version = match previous {
            Some(previous) => previous.bump(bump)?,
            None => self.initial_version.clone(),
        };

        Ok(Resolution::Release { version, bump })
    }
}

impl Default for VersionResolver {
    fn default() -> Self {
        VersionResolver::new(Version::new(1, 0, 0))
    }
}

/// Entries of one section in changelog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryGroup {
    pub kind: ChangeType,
    pub entries: Vec<ChangeEntry>,
}

/// Group entries by kind, keeping commit order inside each group. Breaking
/// entries go to the `Breaking` group whatever their declared kind.
pub fn group_entries(entries: &[ChangeEntry]) -> Vec<EntryGroup> {
    let mut groups: Vec<EntryGroup> = Vec::new();

    for entry in entries {
        let kind = if entry.breaking {
            ChangeType::Breaking
        } else {
            entry.kind
        };

        match groups.iter_mut().find(|g| g.kind == kind) {
            Some(group) => group.entries.push(entry.clone()),
            None => groups.push(EntryGroup {
                kind,
                entries: vec![entry.clone()],
            }),
        }
    }

    groups.sort_by_key(|g| g.kind);
    groups
}

/// A computed release decision. Recomputed every run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleasePlan {
    /// `None` when the branch has never been released
    pub previous: Option<Version>,
    pub next: Version,
    pub bump: BumpKind,
    pub tag: String,
    /// Commit the release tag points at
    pub target: String,
    pub groups: Vec<EntryGroup>,
    /// Every commit hash in the release, oldest first
    pub commits: Vec<String>,
}
