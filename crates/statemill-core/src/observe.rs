//! Optional metrics instrumentation for statemill.
//!
//! When the `observe` feature is enabled, key operations emit counters and
//! histograms via the [`metrics`] crate. A downstream application must
//! install a metrics recorder (e.g. `metrics-exporter-prometheus`) to
//! collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record a processed derivation batch.
///
/// - `statemill.derive.batches_total` – counter with `outcome` label
/// - `statemill.derive.batch_duration_seconds` – histogram
/// - `statemill.derive.events_total` – counter
#[inline]
pub fn record_batch(duration: std::time::Duration, events: usize, success: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if success { "ok" } else { "fail" };
        metrics::counter!("statemill.derive.batches_total", "outcome" => outcome).increment(1);
        metrics::histogram!("statemill.derive.batch_duration_seconds")
            .record(duration.as_secs_f64());
        metrics::counter!("statemill.derive.events_total").increment(events as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (duration, events, success);
    }
}

/// Record a write transaction commit.
///
/// - `statemill.txn.commits_total` – counter
/// - `statemill.txn.objects_written_total` – counter
/// - `statemill.txn.objects_deleted_total` – counter
#[inline]
pub fn record_commit(objects_written: usize, objects_deleted: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("statemill.txn.commits_total").increment(1);
        metrics::counter!("statemill.txn.objects_written_total")
            .increment(objects_written as u64);
        metrics::counter!("statemill.txn.objects_deleted_total")
            .increment(objects_deleted as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (objects_written, objects_deleted);
    }
}

/// Record a write lock acquisition wait time.
///
/// - `statemill.txn.lock_wait_seconds` – histogram
#[inline]
pub fn record_lock_wait(duration: std::time::Duration) {
    #[cfg(feature = "observe")]
    {
        metrics::histogram!("statemill.txn.lock_wait_seconds").record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = duration;
    }
}

/// Record a job exit.
///
/// - `statemill.job.exits_total` – counter with `outcome` label (`ok` / `error`)
#[inline]
pub fn record_job_exit(success: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if success { "ok" } else { "error" };
        metrics::counter!("statemill.job.exits_total", "outcome" => outcome).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = success;
    }
}
