//! Domain logic - pure business rules independent of git operations

pub mod commit;
pub mod tag;
pub mod version;

pub use commit::{
    classify_message, default_severity_table, ChangeEntry, ChangeType, Classifier, CommitRecord,
    SeverityTable,
};
pub use tag::TagFormat;
pub use version::{BumpKind, Version};
