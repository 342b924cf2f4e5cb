mod common;

use clearcut_license::{LicenseCache, LicenseError};
use common::sample_record;
use pretty_assertions::assert_eq;
use std::fs;

fn cache_in(dir: &tempfile::TempDir) -> LicenseCache {
    LicenseCache::new(dir.path().join("license-rgb.json"))
}

#[test]
fn write_then_read_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let record = sample_record();

    let mut cache = cache_in(&dir);
    cache.write(&record).unwrap();
    assert_eq!(cache.read(), Some(record.clone()));

    // A fresh store over the same path sees the same record.
    let mut reopened = cache_in(&dir);
    assert_eq!(reopened.read(), Some(record));
}

#[test]
fn read_missing_file_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = cache_in(&dir);
    assert_eq!(cache.read(), None);
}

#[test]
fn read_malformed_file_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("license-rgb.json");
    fs::write(&path, "{not json at all").unwrap();

    let mut cache = LicenseCache::new(path);
    assert_eq!(cache.read(), None);
}

#[test]
fn read_incomplete_record_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("license-rgb.json");
    let mut record = sample_record();
    record.device_id = String::new();
    fs::write(&path, serde_json::to_string(&record).unwrap()).unwrap();

    let mut cache = LicenseCache::new(path);
    assert_eq!(cache.read(), None);
}

#[test]
fn write_leaves_no_temp_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = cache_in(&dir);
    cache.write(&sample_record()).unwrap();

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec!["license-rgb.json"]);
}

#[test]
fn stale_temp_file_does_not_shadow_record() {
    // An interrupted earlier write leaves a temp file behind; the complete
    // record must still be the one that is read, and the next write must
    // still land atomically.
    let dir = tempfile::tempdir().unwrap();
    let record = sample_record();

    let mut cache = cache_in(&dir);
    cache.write(&record).unwrap();
    fs::write(dir.path().join("license-rgb.json.tmp"), "garbage from a crash").unwrap();

    let mut reopened = cache_in(&dir);
    assert_eq!(reopened.read(), Some(record.clone()));

    let mut updated = record;
    updated.timestamp = "2026-03-15 10:00:00".to_string();
    reopened.write(&updated).unwrap();
    assert_eq!(reopened.read(), Some(updated));
}

#[test]
fn read_is_memoized_until_write() {
    let dir = tempfile::tempdir().unwrap();
    let record = sample_record();

    let mut cache = cache_in(&dir);
    cache.write(&record).unwrap();
    assert_eq!(cache.read(), Some(record.clone()));

    // The file is gone, but the in-process copy survives until the next
    // successful write.
    fs::remove_file(cache.path()).unwrap();
    assert_eq!(cache.read(), Some(record.clone()));

    let mut updated = record;
    updated.label = "RGB-2".to_string();
    cache.write(&updated).unwrap();
    assert_eq!(cache.read(), Some(updated));
}

#[test]
fn write_failure_surfaces_and_preserves_nothing_partial() {
    // Pointing the cache at a directory makes the final rename fail after
    // the temp write; the error is LocalWrite and no torn record exists.
    let dir = tempfile::tempdir().unwrap();
    let mut cache = LicenseCache::new(dir.path());

    let err = cache.write(&sample_record()).unwrap_err();
    assert!(matches!(err, LicenseError::LocalWrite(_)), "got {err:?}");

    let mut reread = LicenseCache::new(dir.path());
    assert_eq!(reread.read(), None);
}

#[test]
fn persisted_schema_uses_device_id_field() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = cache_in(&dir);
    cache.write(&sample_record()).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(cache.path()).unwrap()).unwrap();
    assert!(raw.get("device_id").is_some());
    assert!(raw.get("key").is_some());
    assert!(raw.get("label").is_some());
    assert!(raw.get("timestamp").is_some());
}

#[test]
fn record_equality_is_field_wise() {
    let a = sample_record();
    let mut b = a.clone();
    assert_eq!(a, b);
    b.timestamp.push('!');
    assert_ne!(a, b);
}
