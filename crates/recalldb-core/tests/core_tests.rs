use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use tempfile::TempDir;

use recalldb_core::cache::{CacheKey, CacheStore, DeterministicCache, DiskCache};
use recalldb_core::config::{resolve_with_base, Config, Settings};
use recalldb_core::error::Error;

fn config_from(toml: &str) -> Config {
    Config::from_figment(Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml)))
}

#[test]
fn settings_merge_over_defaults() {
    let config = config_from(
        r#"
        [search]
        k = 3
        retry_unparseable = true

        [metadata]
        entity_kind = "product"
        "#,
    );
    let settings = config.settings().expect("settings");
    assert_eq!(settings.search.k, 3);
    assert!(settings.search.retry_unparseable);
    assert_eq!(settings.metadata.entity_kind, "product");
    // untouched sections keep defaults
    assert_eq!(settings.collection.name, "documents");
    assert_eq!(settings.collection.batch_size, 100);
    assert_eq!(config.get::<usize>("search.concurrency").expect("get"), 4);
}

#[test]
fn zero_limits_are_rejected() {
    let settings = config_from("[ingest]\nconcurrency = 0\n").settings().expect("settings");
    match settings.validate() {
        Err(Error::InvalidConfig(msg)) => assert!(msg.contains("ingest.concurrency")),
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = Path::new("/srv/recalldb");
    assert_eq!(resolve_with_base(base, "cache"), base.join("cache"));
    assert_eq!(resolve_with_base(base, "/abs/cache"), Path::new("/abs/cache"));
}

#[tokio::test]
async fn disk_cache_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let key = CacheKey::derive("extract_entity_name", &("model", "some text")).unwrap();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        // a fresh handle each round, as a new process would have
        let cache = DeterministicCache::on_disk(tmp.path());
        let value: String = cache
            .get_or_compute(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>("Falcon".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value, "Falcon");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "second run must hit the persisted entry");

    let entry = tmp.path().join("extract_entity_name").join(format!("{}.json", key.digest()));
    assert!(entry.exists(), "entry is laid out by operation and digest");
}

#[test]
fn disk_cache_clear_removes_entries() {
    let tmp = TempDir::new().unwrap();
    let store = DiskCache::new(tmp.path());
    store.put(&CacheKey::derive("a", &1).unwrap(), b"1").unwrap();
    store.put(&CacheKey::derive("b", &2).unwrap(), b"2").unwrap();

    assert_eq!(store.clear().unwrap(), 2);
    assert!(store.get(&CacheKey::derive("a", &1).unwrap()).unwrap().is_none());
    assert_eq!(store.clear().unwrap(), 0);
}
