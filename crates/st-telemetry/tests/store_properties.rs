//! Ordering, round-trip and concurrency properties of the telemetry store.

use chrono::Utc;
use proptest::prelude::*;
use st_telemetry::{StoreError, TelemetryRecord, TelemetryStore};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn record(n: usize) -> TelemetryRecord {
    TelemetryRecord {
        client_address: format!("203.0.113.{}", n % 250),
        isp_info: r#"{"processedString":"203.0.113.9 - Example ISP","rawIspInfo":{"ip":"203.0.113.9"}}"#
            .to_string(),
        extra: format!("extra-{n}"),
        user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
        language: "en-US,en;q=0.9".to_string(),
        download: format!("{n}.5"),
        upload: "56.7".to_string(),
        ping: "10".to_string(),
        jitter: "1.5".to_string(),
        log: String::new(),
        ..TelemetryRecord::default()
    }
}

// ── Round trip ──────────────────────────────────────────────────────────

#[test]
fn saved_record_round_trips_through_get_by_id() {
    let dir = TempDir::new().unwrap();
    let store = TelemetryStore::open(dir.path().join("speedtest.db")).unwrap();

    let started = Utc::now();
    let original = record(7);
    let mut to_save = original.clone();
    let id = store.save(&mut to_save).unwrap();

    let fetched = store.get_by_id(id.as_str()).unwrap();
    assert_eq!(fetched.id, id);
    assert_eq!(fetched.client_address, original.client_address);
    assert_eq!(fetched.isp_info, original.isp_info);
    assert_eq!(fetched.extra, original.extra);
    assert_eq!(fetched.user_agent, original.user_agent);
    assert_eq!(fetched.language, original.language);
    assert_eq!(fetched.download, original.download);
    assert_eq!(fetched.upload, original.upload);
    assert_eq!(fetched.ping, original.ping);
    assert_eq!(fetched.jitter, original.jitter);
    assert_eq!(fetched.log, original.log);
    assert!(fetched.timestamp >= started, "timestamp must be server-assigned");
    assert_eq!(fetched, to_save);
}

#[test]
fn get_all_is_oldest_first() {
    let store = TelemetryStore::open_in_memory().unwrap();
    let ids: Vec<_> = (0..5)
        .map(|n| store.save(&mut record(n)).unwrap())
        .collect();

    let all = store.get_all().unwrap();
    let fetched: Vec<_> = all.iter().map(|r| r.id.clone()).collect();
    assert_eq!(fetched, ids);
}

#[test]
fn missing_bucket_is_reported_on_file_store() {
    let dir = TempDir::new().unwrap();
    let store = TelemetryStore::open(dir.path().join("fresh.db")).unwrap();
    assert!(matches!(store.get_last_n(3), Err(StoreError::BucketMissing)));
}

// ── Concurrency ─────────────────────────────────────────────────────────

#[test]
fn concurrent_writers_produce_unique_ordered_keys() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(TelemetryStore::open(dir.path().join("speedtest.db")).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..25 {
                    store.save(&mut record(t * 100 + n)).unwrap();
                }
            })
        })
        .collect();

    // Readers run alongside the writers and must always see a coherent prefix.
    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for _ in 0..50 {
                match store.get_last_n(10) {
                    Ok(records) => {
                        for pair in records.windows(2) {
                            assert!(pair[0].id > pair[1].id);
                        }
                    }
                    Err(StoreError::BucketMissing) => {}
                    Err(e) => panic!("unexpected read error: {e}"),
                }
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    let all = store.get_all().unwrap();
    assert_eq!(all.len(), 100);
    for pair in all.windows(2) {
        assert!(pair[0].id < pair[1].id);
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

// ── Last-N ordering ─────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Newest first, strictly decreasing, length = min(k, total).
    #[test]
    fn last_n_is_newest_first(total in 1usize..30, k in 0usize..40) {
        let store = TelemetryStore::open_in_memory().unwrap();
        let ids: Vec<_> = (0..total)
            .map(|n| store.save(&mut record(n)).unwrap())
            .collect();

        let last = store.get_last_n(k).unwrap();
        prop_assert_eq!(last.len(), k.min(total));

        for (offset, rec) in last.iter().enumerate() {
            prop_assert_eq!(&rec.id, &ids[total - 1 - offset]);
        }
        for pair in last.windows(2) {
            prop_assert!(pair[0].id > pair[1].id);
        }
    }
}
