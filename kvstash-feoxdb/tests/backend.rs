//! Contract tests for the FeOxDB backend.

use std::sync::Barrier;
use std::thread::{self, sleep};
use std::time::Duration;

use bytes::Bytes;
use kvstash_backend::{Backend, CacheError, HotCache, ExecutionContext, Operation};
use kvstash_core::modifier;
use kvstash_feoxdb::FeOxDbBackend;
use tempfile::TempDir;

fn raw(value: &'static str) -> Bytes {
    Bytes::from_static(value.as_bytes())
}

#[test]
fn test_set_get_delete() {
    let backend = FeOxDbBackend::in_memory().unwrap();
    assert!(backend.set("k", raw("v"), None).unwrap());
    assert_eq!(backend.get("k").unwrap(), Some(raw("v")));
    assert!(backend.delete("k").unwrap());
    assert!(!backend.delete("k").unwrap());
    assert_eq!(backend.get("k").unwrap(), None);
}

#[test]
fn test_persistent_store() {
    let dir = TempDir::new().unwrap();
    let backend = FeOxDbBackend::builder()
        .path(dir.path())
        .max_file_size(16 * 1024 * 1024)
        .build()
        .unwrap();

    backend.set("k", raw("on disk"), None).unwrap();
    backend.sync().unwrap();
    assert_eq!(backend.get("k").unwrap(), Some(raw("on disk")));
}

#[test]
fn test_ttl_expires() {
    let backend = FeOxDbBackend::in_memory().unwrap();
    backend.set("k", raw("v"), Some(Duration::from_millis(50))).unwrap();
    sleep(Duration::from_millis(100));
    assert_eq!(backend.get("k").unwrap(), None);
    assert!(backend.add("k", raw("again"), None).unwrap());
}

#[test]
fn test_add_only_when_absent() {
    let backend = FeOxDbBackend::in_memory().unwrap();
    assert!(backend.add("k", raw("first"), None).unwrap());
    assert!(!backend.add("k", raw("second"), None).unwrap());
    assert_eq!(backend.get("k").unwrap(), Some(raw("first")));
}

#[test]
fn test_increment_seeds_from_zero() {
    let backend = FeOxDbBackend::in_memory().unwrap();
    assert_eq!(backend.increment("n", 2).unwrap(), 2);
    assert_eq!(backend.increment("n", 5).unwrap(), 7);
    assert_eq!(backend.get("n").unwrap(), Some(raw("7")));
    assert!(matches!(
        backend.increment("n", 0),
        Err(CacheError::InvalidArgument(_))
    ));

    backend.set("text", raw("abc"), None).unwrap();
    assert!(matches!(
        backend.increment("text", 1),
        Err(CacheError::Internal(_))
    ));
}

#[test]
fn test_batch_and_atomic_are_unsupported() {
    let backend = FeOxDbBackend::in_memory().unwrap();
    let keys = vec!["a".to_owned()];

    let err = backend.mget(&keys).unwrap_err();
    assert!(matches!(
        err,
        CacheError::Unsupported {
            operation: Operation::Mget,
            ..
        }
    ));
    assert!(backend.mset(&[("a".to_owned(), raw("1"))], None).unwrap_err().is_unsupported());
    assert!(backend.mdelete(&keys).unwrap_err().is_unsupported());
    assert!(
        backend
            .create("a", modifier(|_| Some(raw("1"))), None)
            .unwrap_err()
            .is_unsupported()
    );
    assert!(
        backend
            .update("a", modifier(|_| Some(raw("1"))), None)
            .unwrap_err()
            .is_unsupported()
    );
    assert_eq!(backend.get("a").unwrap(), None);
}

#[test]
fn test_flush_removes_keys_from_earlier_process() {
    let dir = TempDir::new().unwrap();
    let open = || {
        FeOxDbBackend::builder()
            .path(dir.path())
            .max_file_size(16 * 1024 * 1024)
            .build()
            .unwrap()
    };

    let first = open();
    first.set("old:a", raw("1"), None).unwrap();
    first.set("old:b", raw("2"), None).unwrap();
    first.sync().unwrap();
    drop(first);

    let reopened = open();
    assert_eq!(reopened.get("old:a").unwrap(), Some(raw("1")));
    reopened.set("new", raw("3"), None).unwrap();

    assert!(reopened.flush().unwrap());

    assert_eq!(reopened.get("old:a").unwrap(), None);
    assert_eq!(reopened.get("old:b").unwrap(), None);
    assert_eq!(reopened.get("new").unwrap(), None);
}

#[test]
fn test_concurrent_sets_on_one_key() {
    let backend = FeOxDbBackend::in_memory().unwrap();
    let barrier = Barrier::new(8);

    thread::scope(|scope| {
        for worker in 0..8 {
            let backend = &backend;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                for round in 0..50 {
                    let value = format!("{worker}:{round}");
                    assert!(backend.set("shared", value.into(), None).unwrap());
                }
            });
        }
    });

    let last = backend.get("shared").unwrap().unwrap();
    let last = std::str::from_utf8(&last).unwrap();
    assert!(last.ends_with(":49"), "unexpected final value {last}");
}

#[test]
fn test_set_during_increments_is_not_lost() {
    let backend = FeOxDbBackend::in_memory().unwrap();
    let barrier = Barrier::new(5);

    thread::scope(|scope| {
        for _ in 0..4 {
            let backend = &backend;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    backend.increment("n", 1).unwrap();
                }
            });
        }
        scope.spawn(|| {
            barrier.wait();
            backend.set("n", raw("1000000"), None).unwrap();
        });
    });

    // Every increment lands either before the set (and is overwritten) or
    // after it (and is counted).
    let value: i64 = std::str::from_utf8(&backend.get("n").unwrap().unwrap())
        .unwrap()
        .parse()
        .unwrap();
    assert!((1_000_000..=1_000_400).contains(&value), "value {value}");
}

#[test]
fn test_concurrent_increments_are_counted() {
    let backend = FeOxDbBackend::in_memory().unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..100 {
                    backend.increment("n", 1).unwrap();
                }
            });
        }
    });

    assert_eq!(backend.get("n").unwrap(), Some(raw("400")));
}

#[test]
fn test_flush_removes_written_keys() {
    let backend = FeOxDbBackend::in_memory().unwrap();
    backend.set("a", raw("1"), None).unwrap();
    backend.increment("b", 1).unwrap();

    assert!(backend.flush().unwrap());

    assert_eq!(backend.get("a").unwrap(), None);
    assert_eq!(backend.get("b").unwrap(), None);
}

#[test]
fn test_hot_cache_batches_fail_over_single_key_backend() {
    let backend = FeOxDbBackend::in_memory().unwrap();
    let hot = HotCache::new(backend, ExecutionContext::Request).unwrap();
    hot.set("k", raw("v"), None).unwrap();

    assert_eq!(hot.get("k").unwrap(), Some(raw("v")));
    assert!(hot.mget(&["x".to_owned()]).unwrap_err().is_unsupported());
}
