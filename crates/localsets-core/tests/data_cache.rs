mod common;

use std::sync::Arc;

use common::{format, Fixture, MockFetcher};
use localsets_core::{LoadSource, LocalStore, Record};
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    Record::from_value(value).unwrap()
}

#[tokio::test]
async fn bundled_snapshot_serves_lookups_on_empty_cache() {
    let fx = Fixture::new();
    let f = format("gen9randombattle");
    fx.write_bundled(f, r#"{"pikachu": {"level": 50}}"#);

    let cache = fx.open(&[f], Arc::new(MockFetcher::new())).await;

    assert_eq!(cache.load_source(f), Some(LoadSource::Bundled));
    assert_eq!(cache.get("Pikachu", Some(f)), Some(record(json!({"level": 50}))));
    assert_eq!(cache.get("PIKACHU ", Some(f)), Some(record(json!({"level": 50}))));
}

#[tokio::test]
async fn corrupt_cache_falls_back_without_error() {
    let fx = Fixture::new();
    let with_bundle = format("gen9randombattle");
    let without_bundle = format("gen8randombattle");
    fx.write_cached(with_bundle, "invalid json");
    fx.write_cached(without_bundle, "{\"truncated\": {");
    fx.write_bundled(with_bundle, r#"{"mew": {"level": 85}}"#);

    let cache = fx.open(&[with_bundle, without_bundle], Arc::new(MockFetcher::new())).await;

    assert_eq!(cache.load_source(with_bundle), Some(LoadSource::Bundled));
    assert_eq!(cache.list(with_bundle), vec!["mew".to_string()]);
    assert_eq!(cache.load_source(without_bundle), Some(LoadSource::Empty));
    assert!(cache.list(without_bundle).is_empty());
    assert_eq!(cache.list_formats(), vec![with_bundle, without_bundle]);
}

#[tokio::test]
async fn user_cache_takes_precedence_over_bundled() {
    let fx = Fixture::new();
    let f = format("gen9randombattle");
    fx.write_cached(f, r#"{"pikachu": {"level": 92}}"#);
    fx.write_bundled(f, r#"{"pikachu": {"level": 50}, "raichu": {"level": 88}}"#);

    let cache = fx.open(&[f], Arc::new(MockFetcher::new())).await;

    assert_eq!(cache.load_source(f), Some(LoadSource::Cache));
    assert_eq!(cache.get("pikachu", Some(f)), Some(record(json!({"level": 92}))));
    assert!(cache.get("raichu", Some(f)).is_none());
}

#[tokio::test]
async fn list_matches_persisted_dataset() {
    let fx = Fixture::new();
    let f = format("gen3randombattle");
    fx.write_cached(
        f,
        r#"{"swampert": {"level": 80}, "metagross": {"level": 78}, "blissey": {"level": 84}}"#,
    );

    let cache = fx.open(&[f], Arc::new(MockFetcher::new())).await;
    let persisted = LocalStore::new(fx.cache_dir()).unwrap().read_dataset(f).unwrap().unwrap();

    assert_eq!(cache.list(f).len(), persisted.len());
    assert_eq!(cache.list(f), vec!["swampert", "metagross", "blissey"]);
}

#[tokio::test]
async fn every_key_resolves_to_its_own_record() {
    let fx = Fixture::new();
    let f = format("gen9randombattle");
    fx.write_cached(
        f,
        r#"{"mrmime": {"level": 88}, "hooh": {"level": 77}, "porygon2": {"level": 82}}"#,
    );

    let cache = fx.open(&[f], Arc::new(MockFetcher::new())).await;
    let dataset = cache.dataset(f).unwrap();

    for (key, expected) in dataset.iter() {
        assert_eq!(cache.get(key, Some(f)).as_ref(), Some(expected));
    }
    assert_eq!(cache.get("Mr. Mime", Some(f)), Some(record(json!({"level": 88}))));
    assert_eq!(cache.get("Ho-Oh", Some(f)), Some(record(json!({"level": 77}))));
    assert_eq!(cache.get("Porygon-2", Some(f)), Some(record(json!({"level": 82}))));
}

#[tokio::test]
async fn canonical_key_answers_for_every_spelling() {
    let fx = Fixture::new();
    let f = format("gen9randombattle");
    fx.write_cached(f, r#"{"Ho-Oh": {"level": 1}, "hooh": {"level": 2}}"#);

    let cache = fx.open(&[f], Arc::new(MockFetcher::new())).await;

    assert_eq!(cache.get("HO OH", Some(f)), Some(record(json!({"level": 2}))));
    assert_eq!(cache.get("Ho-Oh", Some(f)), Some(record(json!({"level": 2}))));
    assert_eq!(cache.list(f), vec!["Ho-Oh", "hooh"]);
}

#[tokio::test]
async fn missing_names_and_formats_are_absent() {
    let fx = Fixture::new();
    let f = format("gen9randombattle");
    fx.write_cached(f, r#"{"pikachu": {"level": 50}}"#);

    let cache = fx.open(&[f], Arc::new(MockFetcher::new())).await;
    let not_loaded = format("gen1randombattle");

    assert!(cache.get("nonexistent", Some(f)).is_none());
    assert!(cache.get("pikachu", Some(not_loaded)).is_none());
    assert!(cache.list(not_loaded).is_empty());
    assert!(cache.stats("pikachu", not_loaded).is_none());
    assert!(cache.stats_summary(not_loaded).is_none());
}

#[tokio::test]
async fn lookup_without_format_prefers_recent_generations() {
    let fx = Fixture::new();
    let gen7 = format("gen7randombattle");
    let gen9 = format("gen9randombattle");
    let gen1 = format("gen1randombattle");
    fx.write_cached(gen1, r#"{"mew": {"level": 1}, "onix": {"level": 1}}"#);
    fx.write_cached(gen7, r#"{"mew": {"level": 7}, "pikachu": {"level": 7}}"#);
    fx.write_cached(gen9, r#"{"pikachu": {"level": 9}}"#);

    let cache = fx.open(&[gen1, gen7, gen9], Arc::new(MockFetcher::new())).await;

    assert_eq!(cache.get("pikachu", None), Some(record(json!({"level": 9}))));
    assert_eq!(cache.get("mew", None), Some(record(json!({"level": 7}))));
    // Not in any preferred format: the first loaded format is used
    assert_eq!(cache.get("onix", None), Some(record(json!({"level": 1}))));
    assert!(cache.get("missingno", None).is_none());
}

#[tokio::test]
async fn lookup_without_format_on_empty_cache() {
    let fx = Fixture::new();
    let cache = fx.open(&[], Arc::new(MockFetcher::new())).await;
    assert!(cache.list_formats().is_empty());
    assert!(cache.get("pikachu", None).is_none());
}

#[tokio::test]
async fn initialize_loads_additional_formats_once() {
    let fx = Fixture::new();
    let gen9 = format("gen9randombattle");
    let ou = format("gen9ou");
    fx.write_cached(gen9, r#"{"pikachu": {"level": 50}}"#);
    fx.write_cached(ou, r#"{"Great Tusk": {"Rapid Spin": {"item": "Booster Energy"}}}"#);

    let cache = fx.open(&[gen9], Arc::new(MockFetcher::new())).await;
    cache.initialize(&[ou, gen9]);
    cache.initialize(&[ou]);

    assert_eq!(cache.list_formats(), vec![gen9, ou]);
    let sets = cache.get("greattusk", Some(ou)).unwrap();
    assert_eq!(sets.get("Rapid Spin").unwrap()["item"], json!("Booster Energy"));
}

#[tokio::test]
async fn search_groups_hits_by_source() {
    let fx = Fixture::new();
    let ou = format("gen9ou");
    let gen9 = format("gen9randombattle");
    let gen8 = format("gen8randombattle");
    fx.write_cached(ou, r#"{"Pikachu": {"Special Attacker": {"item": "Light Ball"}}}"#);
    fx.write_cached(gen9, r#"{"pikachu": {"level": 92}}"#);
    fx.write_cached(gen8, r#"{"raichu": {"level": 88}}"#);

    let cache = fx.open(&[ou, gen9, gen8], Arc::new(MockFetcher::new())).await;
    let hits = cache.search("Pikachu");

    let formats: Vec<_> = hits.iter().map(|h| h.format).collect();
    assert_eq!(formats, vec![gen9, ou]);
    assert_eq!(hits[0].record, record(json!({"level": 92})));
}

#[tokio::test]
async fn describe_cache_reports_counts() {
    let fx = Fixture::new();
    let gen9 = format("gen9randombattle");
    let gen8 = format("gen8randombattle");
    fx.write_cached(gen9, r#"{"a": {}, "b": {}, "c": {}}"#);
    fx.write_bundled(gen8, r#"{"d": {}}"#);

    let cache = fx.open(&[gen9, gen8], Arc::new(MockFetcher::new())).await;
    let info = cache.describe_cache();

    assert_eq!(info.root_dir, fx.cache_dir());
    assert_eq!(info.loaded_formats, vec![gen9, gen8]);
    assert_eq!(info.total_records, 4);
    assert_eq!(info.format_counts[0].count, 3);
    assert_eq!(info.format_counts[1].source, LoadSource::Bundled);
    assert!(info.last_refresh.is_none());
    assert_eq!(info.last_refresh_display(), "never");

    let format_info = cache.format_info(gen8);
    assert_eq!(format_info.record_count, Some(1));
    assert_eq!(cache.format_info(format("gen1randombattle")).record_count, None);
}

#[tokio::test]
async fn stats_queries() {
    let fx = Fixture::new();
    let f = format("gen9randombattle");
    fx.write_cached(
        f,
        r#"{
            "blissey": {"level": 88, "stats": {"items": {"Leftovers": 0.6, "Heavy-Duty Boots": 0.4}, "moves": {"Soft-Boiled": 1.0}}},
            "chansey": {"level": 90, "stats": {"items": {"Eviolite": 1.0}}},
            "ditto": {"level": 100}
        }"#,
    );

    let cache = fx.open(&[f], Arc::new(MockFetcher::new())).await;

    let stats = cache.stats("Blissey", f).unwrap();
    assert_eq!(stats.probabilities("items")[0], ("Leftovers".to_string(), 0.6));
    assert!(cache.stats("ditto", f).is_none());

    let all = cache.format_stats(f);
    let keys: Vec<&str> = all.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["blissey", "chansey"]);

    let summary = cache.stats_summary(f).unwrap();
    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.records_with_stats, 2);
    assert_eq!(summary.field_coverage.get("items"), Some(&2));
    assert_eq!(summary.field_coverage.get("moves"), Some(&1));
}

#[tokio::test]
async fn metadata_prefers_persisted_over_bundled() {
    let fx = Fixture::new();
    let f = format("gen9randombattle");
    let bundled_meta = fx.tmp.path().join("metadata");
    std::fs::create_dir_all(&bundled_meta).unwrap();
    std::fs::write(bundled_meta.join("gen9randombattle_metadata.json"), r#"{"sha": "bundled"}"#).unwrap();

    let cache = fx.open(&[f], Arc::new(MockFetcher::new())).await;
    assert_eq!(cache.metadata(f), Some(json!({"sha": "bundled"})));

    std::fs::write(fx.cache_dir().join("gen9randombattle_metadata.json"), r#"{"sha": "fresh"}"#).unwrap();
    assert_eq!(cache.metadata(f), Some(json!({"sha": "fresh"})));
    assert!(cache.metadata(format("gen1randombattle")).is_none());
}
