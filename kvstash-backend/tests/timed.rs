//! Tests for the timing decorator's metrics.

#![cfg(feature = "metrics")]

mod common;

use common::{CountingBackend, ErrorBackend, raw};
use kvstash_backend::{Backend, CacheError, ExecutionContext, HotCache, Timed};
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use metrics_util::{CompositeKey, MetricKind};

type SnapshotEntry = (
    CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
);

fn has_labels(key: &CompositeKey, provider: &str, operation: &str) -> bool {
    let mut provider_ok = false;
    let mut operation_ok = false;
    for label in key.key().labels() {
        match label.key() {
            "provider" => provider_ok = label.value() == provider,
            "operation" => operation_ok = label.value() == operation,
            _ => {}
        }
    }
    provider_ok && operation_ok
}

/// Find a counter by name and labels.
fn find_counter(entries: &[SnapshotEntry], name: &str, provider: &str, operation: &str) -> Option<u64> {
    entries.iter().find_map(|(key, _, _, value)| match value {
        DebugValue::Counter(v)
            if key.kind() == MetricKind::Counter
                && key.key().name() == name
                && has_labels(key, provider, operation) =>
        {
            Some(*v)
        }
        _ => None,
    })
}

/// Find a histogram by name and labels, return sample count.
fn histogram_count(entries: &[SnapshotEntry], name: &str, provider: &str, operation: &str) -> usize {
    entries
        .iter()
        .find_map(|(key, _, _, value)| match value {
            DebugValue::Histogram(v)
                if key.kind() == MetricKind::Histogram
                    && key.key().name() == name
                    && has_labels(key, provider, operation) =>
            {
                Some(v.len())
            }
            _ => None,
        })
        .unwrap_or(0)
}

#[test]
fn test_operations_are_timed_per_operation() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let backend = Timed::new(CountingBackend::new());

    metrics::with_local_recorder(&recorder, || {
        backend.set("k", raw("v"), None).unwrap();
        backend.get("k").unwrap();
        backend.get("missing").unwrap();
        backend.increment("n", 1).unwrap();
    });

    let entries = snapshotter.snapshot().into_vec();
    assert_eq!(
        find_counter(&entries, "kvstash_backend_operation_total", "counting", "get"),
        Some(2)
    );
    assert_eq!(
        find_counter(&entries, "kvstash_backend_operation_total", "counting", "set"),
        Some(1)
    );
    assert_eq!(
        histogram_count(
            &entries,
            "kvstash_backend_operation_duration_seconds",
            "counting",
            "increment"
        ),
        1
    );
}

#[test]
fn test_errors_pass_through_and_are_timed() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let backend = Timed::with_provider(ErrorBackend, "primary");

    let result = metrics::with_local_recorder(&recorder, || backend.get("k"));

    assert!(matches!(result, Err(CacheError::Connection(_))));
    let entries = snapshotter.snapshot().into_vec();
    assert_eq!(
        histogram_count(&entries, "kvstash_backend_operation_duration_seconds", "primary", "get"),
        1
    );
}

#[test]
fn test_results_are_unchanged() {
    let inner = CountingBackend::new();
    let backend = Timed::new(inner.clone());

    assert!(backend.add("k", raw("v"), None).unwrap());
    assert!(!backend.add("k", raw("w"), None).unwrap());
    assert_eq!(inner.peek("k"), Some(raw("v")));
    assert_eq!(backend.label().as_str(), "timed.counting");
    assert_eq!(backend.provider().as_str(), "counting");
}

#[test]
fn test_provider_names_storage_under_decorators() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let hot = HotCache::new(CountingBackend::new(), ExecutionContext::Request).unwrap();
    let backend = Timed::new(hot);

    metrics::with_local_recorder(&recorder, || {
        backend.set("k", raw("v"), None).unwrap();
    });

    assert_eq!(backend.label().as_str(), "timed.hot.counting");
    assert_eq!(backend.provider().as_str(), "counting");
    let entries = snapshotter.snapshot().into_vec();
    assert_eq!(
        find_counter(&entries, "kvstash_backend_operation_total", "counting", "set"),
        Some(1)
    );
}
