//! Per-table operation counters
//!
//! Every increment is mirrored to the global `metrics` recorder so a process
//! embedding several tables still gets aggregate counters.

use std::sync::atomic::{AtomicU64, Ordering};

use super::record_counter;

/// Point-in-time view of one table's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub puts: u64,
    pub deletes: u64,
    pub adds: u64,
    pub removes: u64,
    pub rejected: u64,
    pub pruned: u64,
    pub fetch_requests: u64,
}

/// Counters owned by one table
#[derive(Debug, Default)]
pub struct MetricsCollector {
    puts: AtomicU64,
    deletes: AtomicU64,
    adds: AtomicU64,
    removes: AtomicU64,
    rejected: AtomicU64,
    pruned: AtomicU64,
    fetch_requests: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_puts(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        record_counter("table.put", 1);
    }

    pub fn inc_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        record_counter("table.delete", 1);
    }

    pub fn inc_adds(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
        record_counter("table.add", 1);
    }

    pub fn inc_removes(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
        record_counter("table.remove", 1);
    }

    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        record_counter("table.rejected", 1);
    }

    pub fn add_pruned(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.pruned.fetch_add(count, Ordering::Relaxed);
        record_counter("table.pruned", count);
    }

    pub fn inc_fetch_requests(&self) {
        self.fetch_requests.fetch_add(1, Ordering::Relaxed);
        record_counter("sync.fetch_requests", 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            puts: self.puts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            adds: self.adds.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            fetch_requests: self.fetch_requests.load(Ordering::Relaxed),
        }
    }
}
