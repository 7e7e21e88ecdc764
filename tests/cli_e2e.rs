//! End-to-end CLI tests for the animedl binary.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

use std::path::Path;

use animedl_core::{HostKind, NavigationPattern, NavigationStep, Outcome, PatternStore, SiteTemplate};
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn toml_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}

/// Command isolated from the user's config and data directories.
fn animedl(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("animedl").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(home: &TempDir, contents: &str) {
    let dir = home.path().join("config").join("animedl");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), contents).unwrap();
}

#[test]
fn test_cli_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    animedl(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("patterns"));
}

#[test]
fn test_cli_classify_prints_host_kinds() {
    let home = TempDir::new().unwrap();
    animedl(&home)
        .args([
            "classify",
            "https://www.mediafire.com/file/abc123/ep01.mp4/file",
            "https://notmediafire.com/file/abc123/ep01.mp4",
            "https://www.4shared.com/video/Ab12Cd/ep01.html",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "mediafire\thttps://www.mediafire.com/file/abc123/ep01.mp4/file",
        ))
        .stdout(predicate::str::contains(
            "unknown\thttps://notmediafire.com/file/abc123/ep01.mp4",
        ))
        .stdout(predicate::str::contains(
            "four_shared\thttps://www.4shared.com/video/Ab12Cd/ep01.html",
        ));
}

#[test]
fn test_cli_patterns_lists_learned_patterns() {
    let home = TempDir::new().unwrap();
    let store_path = home.path().join("patterns.json");
    let site = SiteTemplate::parse("https://witanime.test/episode/{show}-episode-{episode}/").unwrap();
    let mut store = PatternStore::new();
    store.record(
        site.id(),
        &NavigationPattern::new(
            vec![NavigationStep::CollectLinks {
                selector: ".download-servers a".to_string(),
            }],
            HostKind::MediaFire,
        ),
        Outcome::Success,
    );
    store.save(&store_path).unwrap();
    write_config(
        &home,
        &format!(
            "pattern_store = \"{}\"\n\n[sites.witanime]\nurl_template = \"https://witanime.test/episode/{{show}}-episode-{{episode}}/\"\n",
            toml_path(&store_path)
        ),
    );

    animedl(&home)
        .args(["patterns", "--site", "witanime"])
        .assert()
        .success()
        .stdout(predicate::str::contains(site.id().as_str()))
        .stdout(predicate::str::contains("collect(.download-servers a) -> mediafire"));
}

#[test]
fn test_cli_patterns_with_empty_store_prints_nothing() {
    let home = TempDir::new().unwrap();
    animedl(&home)
        .arg("patterns")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_cli_rejects_out_of_range_config() {
    let home = TempDir::new().unwrap();
    write_config(&home, "read_timeout_secs = 0\n");
    animedl(&home)
        .args(["classify", "https://www.mediafire.com/file/abc123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config value for `read_timeout_secs`"));
}

#[test]
fn test_cli_explicit_missing_config_fails() {
    let home = TempDir::new().unwrap();
    animedl(&home)
        .args(["--config"])
        .arg(home.path().join("nope.toml"))
        .args(["classify", "https://www.mediafire.com/file/abc123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_cli_resolve_unknown_site_fails() {
    let home = TempDir::new().unwrap();
    animedl(&home)
        .args(["resolve", "--site", "nowhere", "--show", "one-piece", "-e", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown site 'nowhere'"));
}

#[test]
fn test_cli_resolve_unreachable_site_exits_with_failure() {
    let home = TempDir::new().unwrap();
    write_config(
        &home,
        &format!(
            "pattern_store = \"{}\"\npage_timeout_secs = 5\nconnect_timeout_secs = 2\n",
            toml_path(&home.path().join("patterns.json"))
        ),
    );
    animedl(&home)
        .args([
            "-q",
            "resolve",
            "--site",
            "http://127.0.0.1:9/episode/{show}-{episode}/",
            "--show",
            "one-piece",
            "--episode",
            "1",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no download links found"));
}
