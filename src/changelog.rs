//! Changelog rendering.
//!
//! A release section lists breaking changes, features and bug fixes, one line
//! per commit. New sections go on top of the existing document; existing text
//! is carried over byte for byte.

use crate::analyzer::EntryGroup;
use crate::domain::{ChangeEntry, ChangeType, Version};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Section heading for a change kind, `None` for kinds left out of the changelog.
fn section_title(kind: ChangeType) -> Option<&'static str> {
    match kind {
        ChangeType::Breaking => Some("Breaking Changes"),
        ChangeType::Feature => Some("Features"),
        ChangeType::Fix => Some("Bug Fixes"),
        ChangeType::Chore | ChangeType::Docs | ChangeType::Other => None,
    }
}

/// Result of a build: the new section alone and the full updated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChangelog {
    pub section: String,
    pub document: String,
}

/// Generator for changelog sections.
#[derive(Debug, Clone)]
pub struct ChangelogBuilder {
    title: String,
}

impl ChangelogBuilder {
    /// `title` heads a freshly created document (e.g. "# Changelog").
    pub fn new(title: impl Into<String>) -> Self {
        ChangelogBuilder {
            title: title.into(),
        }
    }

    /// Render the section for `version` and place it above `prior`.
    ///
    /// `released_at` is the only time-dependent input; identical arguments
    /// always produce identical output.
    pub fn build(
        &self,
        version: &Version,
        released_at: DateTime<Utc>,
        groups: &[EntryGroup],
        prior: Option<&str>,
    ) -> RenderedChangelog {
        let section = render_section(version, released_at, groups);
        let document = self.prepend(&section, prior);
        RenderedChangelog { section, document }
    }

    /// Insert `section` at the top of `prior`. When `prior` opens with a
    /// top-level `# ` heading the section goes right below that heading block.
    pub fn prepend(&self, section: &str, prior: Option<&str>) -> String {
        let prior = prior.unwrap_or("");

        if prior.trim().is_empty() {
            let mut document = String::new();
            if !self.title.is_empty() {
                document.push_str(&self.title);
                document.push_str("\n\n");
            }
            document.push_str(section);
            return document;
        }

        let split = find_insertion_point(prior);
        let (head, tail) = prior.split_at(split);

        let mut document = String::with_capacity(prior.len() + section.len() + 2);
        document.push_str(head);
        if !head.is_empty() && !head.ends_with("\n\n") {
            document.push_str(if head.ends_with('\n') { "\n" } else { "\n\n" });
        }
        document.push_str(section);
        if !section.ends_with("\n\n") {
            document.push('\n');
        }
        document.push_str(tail);
        document
    }
}

impl Default for ChangelogBuilder {
    fn default() -> Self {
        ChangelogBuilder::new("# Changelog")
    }
}

/// Byte offset where a new section belongs: after a leading `# ` title and the
/// paragraph lines that follow it, before the first `## ` heading. Zero when
/// the document does not start with a title.
fn find_insertion_point(content: &str) -> usize {
    if !content.starts_with("# ") {
        return 0;
    }

    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if offset > 0 && line.starts_with("## ") {
            return offset;
        }
        offset += line.len();
    }
    offset
}

/// Render one release section.
pub fn render_section(version: &Version, released_at: DateTime<Utc>, groups: &[EntryGroup]) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "## {} ({})\n",
        version,
        released_at.format("%Y-%m-%d")
    );

    let mut wrote_any = false;
    for group in groups {
        let Some(title) = section_title(group.kind) else {
            continue;
        };
        if group.entries.is_empty() {
            continue;
        }

        let _ = writeln!(output, "### {}\n", title);
        for entry in &group.entries {
            output.push_str(&format_entry(entry));
        }
        output.push('\n');
        wrote_any = true;
    }

    if !wrote_any {
        output.push_str("No notable changes.\n\n");
    }

    output
}

/// Format a single entry as a Markdown list item.
fn format_entry(entry: &ChangeEntry) -> String {
    let text = match (&entry.breaking_note, entry.breaking) {
        (Some(note), true) if !note.is_empty() => note.as_str(),
        _ => entry.description.as_str(),
    };

    match &entry.scope {
        Some(scope) => format!("* **{}:** {} ({})\n", scope, text, entry.short_commit()),
        None => format!("* {} ({})\n", text, entry.short_commit()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::group_entries;
    use crate::domain::{classify_message, default_severity_table};
    use chrono::TimeZone;

    fn groups(messages: &[&str]) -> Vec<EntryGroup> {
        let table = default_severity_table();
        let entries: Vec<ChangeEntry> = messages
            .iter()
            .enumerate()
            .map(|(i, m)| classify_message(m, &format!("{:07}deadbeef", i), &table))
            .collect();
        group_entries(&entries)
    }

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_section_order_and_format() {
        let section = render_section(
            &Version::new(2, 0, 0),
            date(),
            &groups(&["fix(io): close handle", "feat: add flag", "feat!: drop v1"]),
        );

        assert_eq!(
            section,
            "## 2.0.0 (2024-05-17)\n\n\
             ### Breaking Changes\n\n\
             * drop v1 (0000002)\n\n\
             ### Features\n\n\
             * add flag (0000001)\n\n\
             ### Bug Fixes\n\n\
             * **io:** close handle (0000000)\n\n"
        );
    }

    #[test]
    fn test_other_types_are_omitted() {
        let section = render_section(
            &Version::new(1, 0, 1),
            date(),
            &groups(&["chore: deps", "docs: readme", "fix: crash"]),
        );
        assert!(!section.contains("deps"));
        assert!(!section.contains("readme"));
        assert!(section.contains("* crash (0000002)"));
    }

    #[test]
    fn test_breaking_note_is_rendered() {
        let section = render_section(
            &Version::new(3, 0, 0),
            date(),
            &groups(&["feat: new config\n\nBREAKING CHANGE: old keys removed"]),
        );
        assert!(section.contains("* old keys removed (0000000)"));
        assert!(!section.contains("### Features"));
    }

    #[test]
    fn test_new_document_gets_title() {
        let builder = ChangelogBuilder::default();
        let rendered = builder.build(&Version::new(1, 0, 0), date(), &groups(&["fix: x"]), None);
        assert!(rendered.document.starts_with("# Changelog\n\n## 1.0.0 (2024-05-17)"));
        assert!(rendered.document.ends_with(&rendered.section));
    }

    #[test]
    fn test_second_build_precedes_first() {
        let builder = ChangelogBuilder::default();
        let first = builder.build(&Version::new(1, 0, 0), date(), &groups(&["fix: x"]), None);
        let second = builder.build(
            &Version::new(1, 1, 0),
            date(),
            &groups(&["feat: y"]),
            Some(&first.document),
        );

        let new_at = second.document.find("## 1.1.0").unwrap();
        let old_at = second.document.find("## 1.0.0").unwrap();
        assert!(new_at < old_at);
        assert!(second.document.ends_with(&first.section));
        assert_eq!(second.document.matches("# Changelog").count(), 1);
    }

    #[test]
    fn test_prior_without_title_is_kept_verbatim() {
        let builder = ChangelogBuilder::default();
        let prior = "Some handwritten notes\n\n## 0.9.0\n\n- legacy\n";
        let document = builder.prepend("## 1.0.0 (2024-05-17)\n\n", Some(prior));
        assert!(document.starts_with("## 1.0.0"));
        assert!(document.ends_with(prior));
    }

    #[test]
    fn test_title_with_intro_paragraph() {
        let builder = ChangelogBuilder::default();
        let prior = "# Changelog\nAll notable changes.\n\n## 1.0.0 (2024-01-01)\n\n* a (abc1234)\n";
        let document = builder.prepend("## 1.1.0 (2024-05-17)\n\n", Some(prior));
        assert_eq!(
            document,
            "# Changelog\nAll notable changes.\n\n## 1.1.0 (2024-05-17)\n\n## 1.0.0 (2024-01-01)\n\n* a (abc1234)\n"
        );
    }

    #[test]
    fn test_title_without_trailing_newline() {
        let builder = ChangelogBuilder::default();
        let document = builder.prepend("## 1.0.0 (2024-05-17)\n\n", Some("# Changelog"));
        assert_eq!(document, "# Changelog\n\n## 1.0.0 (2024-05-17)\n\n");

        let document = builder.prepend("## 1.0.0 (2024-05-17)\n\n", Some("# Changelog\n"));
        assert_eq!(document, "# Changelog\n\n## 1.0.0 (2024-05-17)\n\n");
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = ChangelogBuilder::default();
        let g = groups(&["feat: a", "fix: b"]);
        let one = builder.build(&Version::new(1, 2, 0), date(), &g, Some("# Changelog\n"));
        let two = builder.build(&Version::new(1, 2, 0), date(), &g, Some("# Changelog\n"));
        assert_eq!(one, two);
    }

    #[test]
    fn test_empty_section_placeholder() {
        let section = render_section(&Version::new(1, 0, 0), date(), &[]);
        assert!(section.contains("No notable changes."));
    }
}
