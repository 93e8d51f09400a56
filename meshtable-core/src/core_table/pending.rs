/*
    pending.rs - Pending-fetch bookkeeping

    Tracks records that peers advertised but whose content we have not fetched yet.

    - `sources`: record -> peers known to hold it
    - `queue`:   FIFO of records awaiting a fetch

    Producers are event handlers running on arbitrary threads. The consumer is
    the tick-driven fetch loop; popping takes the record's sources atomically so
    two consumers never service the same record. A record leaves both
    structures together when it is popped or superseded.

    Nothing here is persisted.
*/

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::key::{Key, PeerId};
use super::record::Record;

/// Pending-fetch queue and record-source index
#[derive(Debug, Default)]
pub struct PendingFetches {
    sources: DashMap<Record, Vec<PeerId>>,
    queue: Mutex<VecDeque<Record>>,
}

impl PendingFetches {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Record>> {
        // The queue holds plain data; a panicked holder cannot leave it half-updated
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember `source` as a holder of `record`.
    ///
    /// Returns true if the record was not pending before and got queued.
    pub fn offer(&self, record: Record, source: PeerId) -> bool {
        let mut queued = false;
        {
            let mut holders = self.sources.entry(record).or_insert_with(|| {
                queued = true;
                Vec::new()
            });
            if !holders.contains(&source) {
                holders.push(source);
            }
        }

        if queued {
            self.queue().push_back(record);
        }
        queued
    }

    /// Pop the next record and take its known sources.
    ///
    /// The source list is empty if the record was fetched or superseded while queued.
    pub fn pop(&self) -> Option<(Record, Vec<PeerId>)> {
        let record = self.queue().pop_front()?;
        let holders = self.sources.remove(&record).map(|(_, holders)| holders).unwrap_or_default();
        Some((record, holders))
    }

    /// Forget every pending record for `key` not newer than `version`
    pub fn clear_superseded(&self, key: &Key, version: u64) {
        let superseded = |record: &Record| record.key == *key && record.version <= version;
        self.sources.retain(|record, _| !superseded(record));
        self.queue().retain(|record| !superseded(record));
    }

    /// Forget every pending record in a namespace
    pub fn clear_namespace(&self, namespace: &Uuid) {
        self.sources.retain(|record, _| record.key.namespace != *namespace);
        self.queue().retain(|record| record.key.namespace != *namespace);
    }

    pub fn clear_all(&self) {
        self.sources.clear();
        self.queue().clear();
    }

    /// Whether `record` is awaiting a fetch
    pub fn is_pending(&self, record: &Record) -> bool {
        self.sources.contains_key(record)
    }

    /// Known holders of a pending record
    pub fn sources_of(&self, record: &Record) -> Vec<PeerId> {
        self.sources.get(record).map(|holders| holders.clone()).unwrap_or_default()
    }

    /// Number of queued records
    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
