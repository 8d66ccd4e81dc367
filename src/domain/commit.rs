use super::version::BumpKind;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `type(scope)!: description`, scope and `!` optional.
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<type>[A-Za-z][A-Za-z0-9_-]*)(?:\((?P<scope>[^()]*)\))?(?P<bang>!)?:\s*(?P<desc>.*)$")
        .expect("header pattern is valid")
});

/// Footer tokens are case-sensitive and must be followed by a colon.
static BREAKING_FOOTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^BREAKING[ -]CHANGE:\s*(?P<note>.*)$").expect("footer pattern is valid")
});

/// A commit as listed by the repository gateway. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    /// Full commit identifier
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    /// Raw message, header first
    pub message: String,
}

impl CommitRecord {
    pub fn new(hash: impl Into<String>, timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        CommitRecord {
            hash: hash.into(),
            timestamp,
            message: message.into(),
        }
    }
}

pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(7) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}

/// Declared kind of a change, derived from the header type.
///
/// Declaration order is changelog section order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Breaking,
    Feature,
    Fix,
    Chore,
    Docs,
    Other,
}

impl ChangeType {
    /// Map a header type token to its kind. Unknown tokens are `Other`.
    /// `Breaking` is never declared by a token; only the `!` marker or a
    /// footer puts an entry in that group.
    pub fn from_token(token: &str) -> Self {
        match token {
            "feat" | "feature" => ChangeType::Feature,
            "fix" => ChangeType::Fix,
            "chore" => ChangeType::Chore,
            "docs" => ChangeType::Docs,
            _ => ChangeType::Other,
        }
    }
}

/// Parsed representation of a conventional commit message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub kind: ChangeType,
    /// Header type token as written, lowercased (e.g. "perf")
    pub raw_type: String,
    pub scope: Option<String>,
    pub description: String,
    pub breaking: bool,
    /// Text of the first breaking-change footer, if any
    pub breaking_note: Option<String>,
    /// Severity according to the configured table
    pub bump: BumpKind,
    /// Hash of the source commit; lookup key only
    pub commit: String,
}

impl ChangeEntry {
    pub fn short_commit(&self) -> &str {
        short_hash(&self.commit)
    }
}

/// Mapping from header type token to bump kind.
pub type SeverityTable = BTreeMap<String, BumpKind>;

pub fn default_severity_table() -> SeverityTable {
    let mut table = BTreeMap::new();
    table.insert("feat".to_string(), BumpKind::Minor);
    table.insert("fix".to_string(), BumpKind::Patch);
    table.insert("perf".to_string(), BumpKind::Patch);
    table
}

/// Classifies commit messages against a fixed severity table.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: SeverityTable,
}

impl Classifier {
    pub fn new(table: SeverityTable) -> Self {
        Classifier { table }
    }

    pub fn classify(&self, commit: &CommitRecord) -> ChangeEntry {
        classify_message(&commit.message, &commit.hash, &self.table)
    }

    pub fn classify_all(&self, commits: &[CommitRecord]) -> Vec<ChangeEntry> {
        commits.iter().map(|c| self.classify(c)).collect()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier::new(default_severity_table())
    }
}

/// Classify one commit message. Total over all inputs: a message that does not
/// follow the header grammar becomes an `Other` entry with no bump.
///
/// Supports formats:
/// - type(scope)!: description
/// - type(scope): description
/// - type!: description
/// - type: description
/// - non-conventional text
pub fn classify_message(message: &str, commit: &str, table: &SeverityTable) -> ChangeEntry {
    let mut lines = message.lines();
    let header = lines.next().unwrap_or("").trim_end();

    let breaking_note = find_breaking_footer(message);

    let Some(captures) = HEADER_RE.captures(header) else {
        return ChangeEntry {
            kind: ChangeType::Other,
            raw_type: String::new(),
            scope: None,
            description: header.trim().to_string(),
            breaking: breaking_note.is_some(),
            breaking_note: breaking_note.clone(),
            bump: if breaking_note.is_some() {
                BumpKind::Major
            } else {
                BumpKind::None
            },
            commit: commit.to_string(),
        };
    };

    let raw_type = captures["type"].to_ascii_lowercase();
    let scope = captures
        .name("scope")
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());
    let has_bang = captures.name("bang").is_some();
    let description = captures["desc"].trim().to_string();

    let breaking = has_bang || breaking_note.is_some();
    let bump = if breaking {
        BumpKind::Major
    } else {
        table.get(&raw_type).copied().unwrap_or(BumpKind::None)
    };

    ChangeEntry {
        kind: ChangeType::from_token(&raw_type),
        raw_type,
        scope,
        description,
        breaking,
        breaking_note,
        bump,
        commit: commit.to_string(),
    }
}

/// Returns the note of the first breaking-change footer. Footers only count
/// after the header, so a header reading "BREAKING CHANGE: x" is not a footer.
fn find_breaking_footer(message: &str) -> Option<String> {
    message
        .lines()
        .skip(1)
        .map(str::trim_end)
        .find_map(|line| BREAKING_FOOTER_RE.captures(line))
        .map(|c| c["note"].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(message: &str) -> ChangeEntry {
        classify_message(message, "0123456789abcdef", &default_severity_table())
    }

    #[test]
    fn test_parse_with_scope() {
        let entry = classify("feat(auth): add login");
        assert_eq!(entry.kind, ChangeType::Feature);
        assert_eq!(entry.scope, Some("auth".to_string()));
        assert_eq!(entry.description, "add login");
        assert_eq!(entry.bump, BumpKind::Minor);
        assert!(!entry.breaking);
    }

    #[test]
    fn test_parse_with_breaking_marker() {
        let entry = classify("feat(auth)!: redesign login");
        assert_eq!(entry.kind, ChangeType::Feature);
        assert!(entry.breaking);
        assert_eq!(entry.bump, BumpKind::Major);
    }

    #[test]
    fn test_parse_breaking_without_scope() {
        let entry = classify("chore!: drop node 14");
        assert_eq!(entry.kind, ChangeType::Chore);
        assert_eq!(entry.scope, None);
        assert!(entry.breaking);
        assert_eq!(entry.bump, BumpKind::Major);
    }

    #[test]
    fn test_parse_non_conventional() {
        let entry = classify("Random commit message");
        assert_eq!(entry.kind, ChangeType::Other);
        assert_eq!(entry.description, "Random commit message");
        assert_eq!(entry.bump, BumpKind::None);
        assert!(!entry.breaking);
    }

    #[test]
    fn test_parse_breaking_change_footer() {
        let entry = classify("fix: something\n\nBREAKING CHANGE: config moved");
        assert!(entry.breaking);
        assert_eq!(entry.breaking_note.as_deref(), Some("config moved"));
        assert_eq!(entry.kind, ChangeType::Fix);
    }

    #[test]
    fn test_hyphenated_footer_token() {
        let entry = classify("docs: readme\n\nBREAKING-CHANGE: urls changed");
        assert!(entry.breaking);
        assert_eq!(entry.bump, BumpKind::Major);
    }

    #[test]
    fn test_footer_token_is_case_sensitive() {
        let entry = classify("fix: a\n\nbreaking change: nope\nBreaking Change: nope");
        assert!(!entry.breaking);
        assert_eq!(entry.bump, BumpKind::Patch);
    }

    #[test]
    fn test_breaking_type_token_is_not_breaking() {
        let entry = classify("breaking: drop v1 api");
        assert_eq!(entry.kind, ChangeType::Other);
        assert!(!entry.breaking);
        assert_eq!(entry.bump, BumpKind::None);
    }

    #[test]
    fn test_footer_token_requires_colon() {
        let entry = classify("fix: a\n\nBREAKING CHANGE without colon");
        assert!(!entry.breaking);
    }

    #[test]
    fn test_first_breaking_footer_wins() {
        let entry = classify("feat: a\n\nBREAKING CHANGE: first\nBREAKING CHANGE: second");
        assert_eq!(entry.breaking_note.as_deref(), Some("first"));
    }

    #[test]
    fn test_breaking_footer_on_malformed_header() {
        let entry = classify("update things\n\nBREAKING CHANGE: removed flag");
        assert_eq!(entry.kind, ChangeType::Other);
        assert!(entry.breaking);
        assert_eq!(entry.bump, BumpKind::Major);
    }

    #[test]
    fn test_unknown_type_has_no_bump() {
        let entry = classify("wip: half done");
        assert_eq!(entry.kind, ChangeType::Other);
        assert_eq!(entry.raw_type, "wip");
        assert_eq!(entry.bump, BumpKind::None);
    }

    #[test]
    fn test_table_drives_severity() {
        let mut table = default_severity_table();
        table.insert("docs".to_string(), BumpKind::Patch);
        let entry = classify_message("docs: typo", "abc", &table);
        assert_eq!(entry.kind, ChangeType::Docs);
        assert_eq!(entry.bump, BumpKind::Patch);
    }

    #[test]
    fn test_uppercase_type_is_normalised() {
        let entry = classify("Fix: crash on start");
        assert_eq!(entry.raw_type, "fix");
        assert_eq!(entry.bump, BumpKind::Patch);
    }

    #[test]
    fn test_classification_is_total() {
        let inputs = [
            "",
            "\n\n",
            ":",
            "feat",
            "feat(",
            "feat(scope: x",
            "(scope): x",
            "!: x",
            "ünïcödé: 🚀",
            "fix:",
            "\r\n",
        ];
        for input in inputs {
            let entry = classify(input);
            assert_eq!(entry.commit, "0123456789abcdef");
        }
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456");
        assert_eq!(short_hash("abc"), "abc");
        let entry = classify("fix: a");
        assert_eq!(entry.short_commit(), "0123456");
    }

    #[test]
    fn test_crlf_messages() {
        let entry = classify("feat(api): add endpoint\r\n\r\nBREAKING CHANGE: v1 removed\r\n");
        assert_eq!(entry.description, "add endpoint");
        assert_eq!(entry.breaking_note.as_deref(), Some("v1 removed"));
    }
}
