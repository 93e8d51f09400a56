/*
    Reconciliation - advertise-then-fetch anti-entropy

    Responsibilities:
    `reconcile.rs` handles inbound events and drives the fetch queue.

    Flow between two peers A and B sharing a namespace:
    1. A: sync(ns)                   -> SYNC_RECORDS to the namespace
    2. B: records_in(ns)             -> PUBLISH_RECORDS to A
    3. A: queue records it lacks, remembering B as a holder
    4. A: process_pending_records()  -> SYNC_CONTENT to a random holder
    5. B: CREATE_ENTRY (or DELETE_RECORD for a tombstone) back to A
    6. A: add / remove

    A record is satisfied locally when the local entry orders at or above it:
    live entries compare by (version, checksum), tombstones by version only.
    A tombstone record for a key we never held needs no fetch either. Since
    every peer only fetches upward in that order, peers converge on the
    highest entry instead of trading entries back and forth.
*/

use rand::seq::IndexedRandom;
use std::sync::PoisonError;
use tracing::{debug, error, trace, warn};

use super::errors::TableResult;
use super::events::{Event, Target};
use super::key::{NamespaceId, PeerId};
use super::record::Record;
use super::table::ReplicatedTable;
use crate::metrics;

impl ReplicatedTable {
    /// Handle one inbound event.
    ///
    /// Malformed or undecryptable input is dropped with a log line. Only a
    /// capacity ceiling surfaces as an error.
    pub fn process(&self, event: Event) -> TableResult<()> {
        let sender = event.sender();
        if sender == self.local {
            trace!(kind = event.kind(), "Ignoring own event");
            return Ok(());
        }
        trace!(kind = event.kind(), %sender, "Processing event");

        match event {
            Event::CreateEntry { sender, record, payload } => {
                self.handle_create_entry(sender, record, payload)
            }
            Event::DeleteRecord { sender, record } => {
                self.handle_delete_record(sender, record);
                Ok(())
            }
            Event::SyncRecords { sender, namespace } => {
                self.handle_sync_records(sender, namespace);
                Ok(())
            }
            Event::PublishRecords { sender, records } => {
                self.handle_publish_records(sender, records);
                Ok(())
            }
            Event::SyncContent { sender, record } => {
                self.handle_sync_content(sender, record);
                Ok(())
            }
        }
    }

    /// Decode and handle a wire-encoded event
    pub fn process_bytes(&self, data: &[u8]) -> TableResult<()> {
        match Event::from_bytes(data) {
            Ok(event) => self.process(event),
            Err(e) => {
                warn!(error = %e, len = data.len(), "Dropping undecodable event");
                self.counters.inc_rejected();
                Ok(())
            }
        }
    }

    /// Fetch one queued record from a random holder.
    ///
    /// Returns the peer asked, or `None` if the queue was empty or the popped
    /// record no longer needs fetching.
    pub fn process_pending_records(&self) -> Option<PeerId> {
        let (record, sources) = self.pending.pop()?;
        metrics::record_gauge("sync.pending", self.pending.len() as f64);

        if self.is_satisfied(&record) {
            trace!(%record, "Pending record already satisfied");
            return None;
        }

        let source = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            *sources.choose(&mut *rng)?
        };

        debug!(%record, %source, holders = sources.len(), "Requesting content");
        self.counters.inc_fetch_requests();
        self.publisher.publish(
            Target::Peer(source),
            Event::SyncContent { sender: self.local, record },
        );
        Some(source)
    }

    /// Whether the local entry makes fetching `record` pointless
    pub fn is_satisfied(&self, record: &Record) -> bool {
        match self.peek(&record.key) {
            None => record.is_tombstone(),
            Some(local) if local.is_deleted() => local.version >= record.version,
            Some(local) => {
                (local.version, local.checksum.as_bytes())
                    >= (record.version, record.checksum.as_bytes())
            }
        }
    }

    fn handle_create_entry(
        &self,
        sender: PeerId,
        record: Record,
        payload: Option<Vec<u8>>,
    ) -> TableResult<()> {
        let Some(payload) = payload else {
            debug!(%record, %sender, "Peer has no content for record");
            return Ok(());
        };

        let content = match self.cipher.decrypt(sender, record.key.namespace, &payload) {
            Ok(content) => content,
            Err(e) => {
                warn!(%record, %sender, error = %e, "Dropping undecryptable payload");
                metrics::record_counter("sync.decrypt_failures", 1);
                return Ok(());
            }
        };

        match self.add(record, content) {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(%record, %sender, error = %e, "Remote creation aborted");
                Err(e)
            }
        }
    }

    fn handle_delete_record(&self, sender: PeerId, record: Record) {
        if !record.is_tombstone() {
            debug!(%record, %sender, "Ignoring deletion without tombstone record");
            self.counters.inc_rejected();
            return;
        }
        self.remove(&record);
    }

    fn handle_sync_records(&self, sender: PeerId, namespace: NamespaceId) {
        let records = self.records_in(&namespace);
        if records.is_empty() {
            return;
        }

        trace!(%namespace, %sender, count = records.len(), "Advertising records");
        self.publisher.publish(
            Target::Peer(sender),
            Event::PublishRecords { sender: self.local, records },
        );
    }

    fn handle_publish_records(&self, sender: PeerId, records: Vec<Record>) {
        let mut queued = 0usize;
        for record in records {
            if self.is_satisfied(&record) || self.is_from_future(record.version) {
                continue;
            }
            if self.pending.offer(record, sender) {
                queued += 1;
            }
        }

        if queued > 0 {
            debug!(%sender, queued, "Queued advertised records");
            metrics::record_gauge("sync.pending", self.pending.len() as f64);
        }
    }

    fn handle_sync_content(&self, sender: PeerId, record: Record) {
        let key = record.key;
        let reply = match self.peek(&key) {
            Some(local) if local.is_deleted() && local.version >= record.version => {
                Event::DeleteRecord { sender: self.local, record: local.record(key) }
            }
            Some(local) if local.is_extant() && local.is_valid_for(&record) => {
                match self.cipher.encrypt(self.local, key.namespace, &local) {
                    Ok(payload) => {
                        Event::CreateEntry { sender: self.local, record, payload: Some(payload) }
                    }
                    Err(e) => {
                        warn!(%record, error = %e, "Encryption failed, fetch unanswered");
                        return;
                    }
                }
            }
            _ => Event::CreateEntry { sender: self.local, record, payload: None },
        };

        self.publisher.publish(Target::Peer(sender), reply);
    }
}
