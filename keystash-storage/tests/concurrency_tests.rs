//! Multi-threaded tests for the cache and the change listener.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use keystash_storage::{CacheEngine, CacheLookup, InMemoryBackingStore, SettingsCache, Value};
use keystash_test_utils::{read, write, RecordingFixture};

const THREADS: usize = 8;

#[test]
fn test_concurrent_writes_and_reads_through_facade() {
    let fixture = RecordingFixture::new();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&fixture.cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..200usize {
                    let key = format!("key-{}", i % 10);
                    if (i + t) % 2 == 0 {
                        write(&cache, &key, Value::from(format!("value-{t}-{i}")));
                    } else {
                        let _ = cache.string(&key);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker thread panicked");
    }

    // Every own write raised the counter exactly once
    assert_eq!(fixture.cache.pending_writes(), fixture.store.persists());
}

#[test]
fn test_concurrent_writes_to_one_key_are_linearizable() {
    const ITERATIONS: i64 = 300;
    let engine = Arc::new(CacheEngine::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS as i64)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..ITERATIONS {
                    engine.set(Some(Value::Integer(t * ITERATIONS + i)), "shared");
                }
                t * ITERATIONS + ITERATIONS - 1
            })
        })
        .collect();
    let finals: Vec<i64> = handles
        .into_iter()
        .map(|h| h.join().expect("writer thread panicked"))
        .collect();

    match engine.get("shared") {
        CacheLookup::Hit(Some(Value::Integer(n))) => assert!(finals.contains(&n)),
        other => panic!("unexpected lookup: {:?}", other),
    }
}

#[test]
fn test_reader_counts_match_its_gets() {
    let engine = Arc::new(CacheEngine::new());
    engine.set(Some(Value::Bool(true)), "present");

    let reader = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let mut gets = 0u64;
            for i in 0..1_000 {
                if i % 3 == 0 {
                    engine.get("absent");
                } else {
                    engine.get("present");
                }
                gets += 1;
            }
            gets
        })
    };
    let gets = reader.join().expect("reader thread panicked");

    let stats = engine.statistics();
    assert_eq!(stats.hits + stats.misses, gets);
}

#[test]
fn test_concurrent_invalidation_and_writes() {
    let fixture = RecordingFixture::new();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&fixture.cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..100usize {
                    match (t + i) % 4 {
                        0 => cache.invalidate_cache(),
                        1 => cache.invalidate_key("k"),
                        2 => write(&cache, "k", Value::Integer(i as i64)),
                        _ => {
                            let _ = read(&cache, "k");
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker thread panicked");
    }

    // Whatever is cached now must agree with the store after a refresh
    fixture.cache.invalidate_cache();
    assert_eq!(read(&fixture.cache, "k"), fixture.store.peek("k"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_listener_settles_pending_writes() {
    let store = Arc::new(InMemoryBackingStore::default());
    let (cache, listener) = SettingsCache::with_defaults(Arc::clone(&store));
    let _handle = listener.spawn();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            tokio::task::spawn_blocking(move || {
                for i in 0..50i64 {
                    cache.set(&format!("k{t}"), i);
                }
            })
        })
        .collect();
    for w in writers {
        w.await.expect("writer task panicked");
    }

    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        while cache.pending_writes() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(settled.is_ok(), "pending writes never settled");

    for t in 0..4 {
        assert_eq!(cache.integer(&format!("k{t}")), 49);
    }
}
