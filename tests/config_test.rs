// tests/config_test.rs
use git_release::config::{load_config, parse_config, Config};
use git_release::domain::{classify_message, BumpKind, Version};
use serial_test::serial;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn test_load_default_config() {
    let config = Config::default();
    assert_eq!(config.branch, "main");
    assert_eq!(config.remote, "origin");
    assert_eq!(config.tag_format, "v{version}");
    assert_eq!(config.initial_version().unwrap(), Version::new(1, 0, 0));
    assert!(!config.registry_publish);
    assert_eq!(config.changelog.path, PathBuf::from("CHANGELOG.md"));
    assert_eq!(config.artifacts.version_file, PathBuf::from("VERSION"));
    assert!(config.artifacts.assets.is_empty());
}

fn severity(config: &Config, commit_type: &str) -> BumpKind {
    classify_message(&format!("{}: x", commit_type), "0000000", &config.types).bump
}

#[test]
fn test_default_severity_table() {
    let config = Config::default();
    assert_eq!(severity(&config, "feat"), BumpKind::Minor);
    assert_eq!(severity(&config, "fix"), BumpKind::Patch);
    assert_eq!(severity(&config, "perf"), BumpKind::Patch);
    assert_eq!(severity(&config, "docs"), BumpKind::None);
    assert_eq!(severity(&config, "unknown"), BumpKind::None);
}

#[test]
fn test_load_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let toml_content = r#"
branch = "develop"

[types]
feat = "minor"
fix = "patch"
build = "patch"
"#;
    temp_file.write_all(toml_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = load_config(Some(temp_file.path())).unwrap();
    assert_eq!(config.branch, "develop");
    assert_eq!(severity(&config, "build"), BumpKind::Patch);
    // Keys not in the file keep their defaults
    assert_eq!(config.remote, "origin");
    assert_eq!(config.timeouts.push(), Duration::from_secs(120));
}

#[test]
fn test_full_fixture() {
    let config = load_config(Some(fixture("full_config.toml").as_path()))
        .expect("Failed to load test config");

    assert_eq!(config.branch, "release");
    assert_eq!(config.remote, "upstream");
    assert_eq!(
        config.tag_format().unwrap().format(&Version::new(2, 0, 0)),
        "release-2.0.0"
    );
    assert_eq!(config.initial_version().unwrap(), Version::new(0, 1, 0));
    assert!(config.registry_publish);
    assert_eq!(severity(&config, "refactor"), BumpKind::Patch);
    assert_eq!(severity(&config, "revert"), BumpKind::None);
    assert_eq!(config.changelog.path, PathBuf::from("docs/CHANGES.md"));
    assert_eq!(config.changelog.title, "# Release history");
    assert_eq!(config.artifacts.version_file, PathBuf::from("version.txt"));
    assert_eq!(
        config.artifacts.assets,
        vec![PathBuf::from("Cargo.toml"), PathBuf::from("package.json")]
    );
    assert_eq!(
        config.artifacts.commit_message_for(&Version::new(0, 2, 0)),
        "release: 0.2.0"
    );
    assert_eq!(config.timeouts.history(), Duration::from_secs(30));
    assert_eq!(config.timeouts.publish(), Duration::from_secs(45));
    assert_eq!(config.timeouts.push(), Duration::from_secs(90));
}

#[test]
fn test_invalid_fixture_is_rejected() {
    let err = load_config(Some(fixture("invalid_tag_format.toml").as_path())).unwrap_err();
    assert_eq!(err.reason_code(), "config_invalid");
    assert!(err.to_string().contains("{version}"));
}

#[test]
fn test_missing_explicit_path_is_an_error() {
    let err = load_config(Some(fixture("does_not_exist.toml").as_path())).unwrap_err();
    assert_eq!(err.reason_code(), "config_invalid");
}

#[test]
fn test_malformed_toml_is_config_error() {
    let err = parse_config("branch = [").unwrap_err();
    assert_eq!(err.reason_code(), "config_invalid");
}

#[test]
fn test_same_path_for_changelog_and_version_file() {
    let err = parse_config("[changelog]\npath = \"VERSION\"\n").unwrap_err();
    assert!(err.to_string().contains("must differ"));
}

#[test]
#[serial]
fn test_local_config_file_is_picked_up() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("gitrelease.toml"), "branch = \"trunk\"\n").unwrap();

    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let result = load_config(None);
    std::env::set_current_dir(original).unwrap();

    assert_eq!(result.unwrap().branch, "trunk");
}
