//! Analysis engine for determining version bumps from commits

pub mod version_resolver;

pub use version_resolver::{group_entries, EntryGroup, ReleasePlan, Resolution, VersionResolver};
