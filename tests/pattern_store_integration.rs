//! Pattern store persistence through the public API.

use animedl_core::{
    HostKind, NavigationPattern, NavigationStep, Outcome, PatternStore, ResolveError,
    SiteTemplate,
};

fn site() -> SiteTemplate {
    SiteTemplate::parse("https://witanime.test/episode/{show}-episode-{episode}/").unwrap()
}

fn pattern(selector: &str, kind: HostKind) -> NavigationPattern {
    NavigationPattern::new(
        vec![
            NavigationStep::FollowText {
                needle: "تحميل".to_string(),
            },
            NavigationStep::CollectLinks {
                selector: selector.to_string(),
            },
        ],
        kind,
    )
}

#[test]
fn test_save_load_save_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");

    let mut store = PatternStore::new();
    store.record(site().id(), &pattern(".quality-list a", HostKind::MediaFire), Outcome::Success);
    store.record(site().id(), &pattern(".server-list a", HostKind::GoogleDrive), Outcome::Success);
    store.record(site().id(), &pattern(".quality-list a", HostKind::MediaFire), Outcome::Failure);
    store.save(&first).unwrap();

    PatternStore::try_load(&first).unwrap().save(&second).unwrap();
    let a = std::fs::read(&first).unwrap();
    let b = std::fs::read(&second).unwrap();
    assert_eq!(a, b);

    let reloaded = PatternStore::try_load(&second).unwrap();
    assert_eq!(reloaded.lookup(site().id()), store.lookup(site().id()));
}

#[test]
fn test_store_file_is_readable_json_with_arabic_needles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("patterns.json");
    let mut store = PatternStore::new();
    store.record(site().id(), &pattern(".quality-list a", HostKind::MediaFire), Outcome::Success);
    store.save(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let records = &json["sites"][site().id().as_str()];
    assert_eq!(records[0]["pattern"]["host_kind"], "mediafire");
    assert_eq!(records[0]["pattern"]["steps"][0]["needle"], "تحميل");
    assert_eq!(records[0]["confidence"], 60);
}

#[test]
fn test_corrupted_store_loads_empty_but_try_load_reports_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patterns.json");
    std::fs::write(&path, "{\"version\": 1, \"sites\": {").unwrap();

    assert!(PatternStore::load(&path).is_empty());
    assert!(matches!(
        PatternStore::try_load(&path),
        Err(ResolveError::StoreCorrupted { .. })
    ));
}

#[test]
fn test_sites_are_isolated() {
    let other = SiteTemplate::parse("https://anime4up.test/episode/{show}/{episode}").unwrap();
    let mut store = PatternStore::new();
    store.record(site().id(), &pattern(".quality-list a", HostKind::MediaFire), Outcome::Success);

    assert!(store.lookup(other.id()).is_empty());
    store.record(other.id(), &pattern(".quality-list a", HostKind::MediaFire), Outcome::Failure);
    assert_eq!(store.lookup(site().id()).len(), 1);
    assert_eq!(store.sites().count(), 1);
}
