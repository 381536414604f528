//! Optional metrics instrumentation for sqlvec.
//!
//! When the `observe` feature is enabled, KNN queries and vec0 mutations emit
//! counters and histograms via the [`metrics`] crate. The host application
//! installs a recorder to collect them.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

use std::time::Duration;

/// Record a completed KNN query.
///
/// - `sqlvec.knn.queries_total` – counter
/// - `sqlvec.knn.duration_seconds` – histogram of query latency
/// - `sqlvec.knn.rows_scanned_total` – counter of candidate rows visited
#[inline]
pub fn record_knn_query(duration: Duration, rows_scanned: u64, rows_returned: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("sqlvec.knn.queries_total").increment(1);
        metrics::histogram!("sqlvec.knn.duration_seconds").record(duration.as_secs_f64());
        metrics::counter!("sqlvec.knn.rows_scanned_total").increment(rows_scanned);
        metrics::histogram!("sqlvec.knn.rows_returned").record(rows_returned as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (duration, rows_scanned, rows_returned);
    }
}

/// Record a vec0 row mutation.
///
/// - `sqlvec.mutations_total` – counter with `kind` label (`insert` / `update` / `delete`)
#[inline]
pub fn record_mutation(kind: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("sqlvec.mutations_total", "kind" => kind).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = kind;
    }
}

/// Record a scalar function call that failed.
///
/// - `sqlvec.function_errors_total` – counter with `function` label
#[inline]
pub fn record_function_error(function: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("sqlvec.function_errors_total", "function" => function).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = function;
    }
}
