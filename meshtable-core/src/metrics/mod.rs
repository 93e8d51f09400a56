//! Metrics collection for observability

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};

/// Initialize metrics with descriptions
pub fn init_metrics() {
    // Table metrics
    describe_counter!("table.put", "Local creations applied");
    describe_counter!("table.delete", "Local deletions applied");
    describe_counter!("table.add", "Remote creations applied");
    describe_counter!("table.remove", "Remote deletions applied");
    describe_counter!("table.rejected", "Mutations or payloads rejected by validation");
    describe_counter!("table.pruned", "Dead tombstones removed by pruning");
    describe_counter!("table.capacity_exceeded", "Mutations aborted by a capacity ceiling");
    describe_gauge!("table.entries", "Entries held, tombstones included");

    // Persistence metrics
    describe_counter!("table.persist.writes", "Snapshots written");
    describe_counter!("table.persist.failures", "Snapshot writes that failed");
    describe_histogram!("table.persist.duration_ms", "Snapshot write duration in milliseconds");

    // Sync metrics
    describe_counter!("sync.fetch_requests", "Content fetch requests sent");
    describe_counter!("sync.decrypt_failures", "Payloads dropped because they failed to decrypt");
    describe_gauge!("sync.pending", "Records waiting to be fetched");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a gauge metric
pub fn record_gauge(name: &'static str, value: f64) {
    gauge!(name).set(value);
}

/// Record a histogram metric
pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        record_histogram(self.name, self.start.elapsed().as_secs_f64() * 1000.0);
    }
}
