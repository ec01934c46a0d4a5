//! Operation metrics for kvstash backends.
//!
//! Enable the `metrics` feature to record them. Without it nothing is
//! recorded and [`Timer`] only carries its labels.
//!
//! ## Names
//!
//! - `kvstash_backend_operation_total` - counter, one increment per operation
//! - `kvstash_backend_operation_duration_seconds` - histogram of wall time
//!
//! Both carry the labels `provider` (by default the storage the timed chain
//! ends in) and `operation` (see [`Operation::as_str`]).

use std::time::Duration;

#[cfg(feature = "metrics")]
use std::time::Instant;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

use kvstash_core::{BackendLabel, Operation};

/// Timer started before a backend operation and stopped after it.
///
/// Holds the provider and operation labels. The start time is only captured
/// when the `metrics` feature is enabled.
#[must_use = "a timer records nothing until it is stopped"]
pub struct Timer {
    provider: BackendLabel,
    operation: Operation,
    #[cfg(feature = "metrics")]
    start: Instant,
}

impl Timer {
    /// Starts timing `operation` on `provider`.
    #[inline]
    pub fn start(provider: BackendLabel, operation: Operation) -> Self {
        Self {
            provider,
            operation,
            #[cfg(feature = "metrics")]
            start: Instant::now(),
        }
    }

    /// Elapsed duration since the timer was started.
    ///
    /// Returns `Duration::ZERO` when metrics are disabled.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        #[cfg(feature = "metrics")]
        {
            self.start.elapsed()
        }
        #[cfg(not(feature = "metrics"))]
        {
            Duration::ZERO
        }
    }

    /// Stops the timer and records the sample.
    #[inline]
    pub fn stop(self) {
        let elapsed = self.elapsed();
        record_operation(self.provider.as_str(), self.operation, elapsed);
    }
}

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for the operation counter.
    pub static ref BACKEND_OPERATION_TOTAL: &'static str = {
        metrics::describe_counter!(
            "kvstash_backend_operation_total",
            "Total number of cache operations per provider and operation."
        );
        "kvstash_backend_operation_total"
    };

    /// Metric name for the operation duration histogram.
    pub static ref BACKEND_OPERATION_DURATION: &'static str = {
        metrics::describe_histogram!(
            "kvstash_backend_operation_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of cache operations in seconds."
        );
        "kvstash_backend_operation_duration_seconds"
    };
}

/// Record one operation with its duration.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_operation(provider: &str, operation: Operation, duration: Duration) {
    metrics::counter!(
        *BACKEND_OPERATION_TOTAL,
        "provider" => provider.to_string(),
        "operation" => operation.as_str()
    )
    .increment(1);
    metrics::histogram!(
        *BACKEND_OPERATION_DURATION,
        "provider" => provider.to_string(),
        "operation" => operation.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Record one operation (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_operation(_provider: &str, _operation: Operation, _duration: Duration) {}
