//! Hot reload of the overrides file into a running engine.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use env_config_sync::codec::{Outcome, Request};
use env_config_sync::config::{load_overrides, OverridesWatcher};
use env_config_sync::engine::spawn_overrides_reloader;
use env_config_sync::{ConfigValue, Shutdown, SyncEngine};

mod common;
use common::{key, speed_schema};

fn read_speed(engine: &SyncEngine, raw_key: &str) -> Option<f64> {
    let key = key(raw_key);
    let request = Request::get(key.namespace(), BTreeSet::from([key.clone()]));
    match engine.process(request).outcome {
        Outcome::Ok { snapshot } => snapshot.get(&key).and_then(ConfigValue::as_f64),
        _ => None,
    }
}

async fn wait_for_speed(engine: &SyncEngine, raw_key: &str, expected: f64) -> bool {
    for _ in 0..100 {
        if read_speed(engine, raw_key) == Some(expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_overrides_file_edits_are_reapplied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overrides.toml");
    std::fs::write(&path, "[speed]\nmax = 6.0\n").unwrap();

    let schema = speed_schema();
    let engine = Arc::new(SyncEngine::new(Arc::clone(&schema)));
    engine
        .apply_overrides(&load_overrides(&path, &schema).unwrap())
        .unwrap();
    assert_eq!(read_speed(&engine, "speed.max"), Some(6.0));

    let shutdown = Shutdown::new();
    let (watcher, updates) = OverridesWatcher::new(&path, Arc::clone(&schema));
    let _watcher = watcher.run().unwrap();
    let reloader = spawn_overrides_reloader(Arc::clone(&engine), updates, shutdown.clone());

    std::fs::write(&path, "[speed]\nmax = 9.0\n").unwrap();
    assert!(wait_for_speed(&engine, "speed.max", 9.0).await, "edit was not applied");

    // Wrong type: skipped, the store keeps its values.
    std::fs::write(&path, "[speed]\nmax = \"fast\"\n").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(read_speed(&engine, "speed.max"), Some(9.0));

    // Later edits still get through.
    std::fs::write(&path, "[speed]\nmin = 1.5\n").unwrap();
    assert!(wait_for_speed(&engine, "speed.min", 1.5).await, "watcher stopped after a bad edit");
    assert_eq!(read_speed(&engine, "speed.max"), Some(9.0));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), reloader)
        .await
        .expect("reloader did not stop")
        .unwrap();
}
