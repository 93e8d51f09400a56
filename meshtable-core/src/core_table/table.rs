/*
    ReplicatedTable - namespaced, replicated key/value engine

    Responsibilities:
    `table.rs` owns the in-memory map and every local and remote mutation of it.
    It handles: first-write-wins local creation, tombstoning deletes, remote
    adds/removes, capacity ceilings with pruning, and persistence scheduling.

    Locking rules for the nested map:
    - Writers hold a read guard on the outer shard while mutating the inner map.
    - Empty namespaces are dropped with `remove_if`, never while a guard is held.
    - The outer map is never re-entered while an outer guard is alive.
    - Publishing and listener callbacks run after every guard is released.

    Inputs:
    - local application calls (put, delete, get, ...)
    - remote changes applied by the reconciliation handlers

    Outputs:
    - announcements through the Publisher
    - snapshot writes through the persistence worker
    - listener callbacks for remote changes
*/

use dashmap::mapref::entry::Entry;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, trace, warn};

use super::content::{now_millis, Content};
use super::errors::{CapacityScope, TableError, TableResult};
use super::events::{Event, Target};
use super::key::{Key, NamespaceId, PeerId};
use super::pending::PendingFetches;
use super::persistence::{Namespaces, PersistenceHandle};
use super::record::Record;
use super::table_config::TableConfig;
use super::traits::{ContentCipher, NamespaceState, Publisher, TableListener};
use crate::adapters::{MemoryNamespaceState, NoopListener};
use crate::metrics::{self, MetricsCollector, MetricsSnapshot};

/// Point-in-time summary of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub namespaces: usize,
    pub entries: usize,
    pub tombstones: usize,
    pub pending: usize,
    pub operations: MetricsSnapshot,
}

/// Builder for [`ReplicatedTable`]
pub struct ReplicatedTableBuilder {
    local: PeerId,
    publisher: Arc<dyn Publisher>,
    cipher: Arc<dyn ContentCipher>,
    config: TableConfig,
    state: Option<Arc<dyn NamespaceState>>,
    listener: Option<Arc<dyn TableListener>>,
    rng_seed: Option<u64>,
}

impl ReplicatedTableBuilder {
    pub fn config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    /// Snapshot store (in-memory if unset)
    pub fn state(mut self, state: Arc<dyn NamespaceState>) -> Self {
        self.state = Some(state);
        self
    }

    /// Remote change listener (none if unset)
    pub fn listener(mut self, listener: Arc<dyn TableListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Seed the fetch-source RNG for reproducible runs
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Load the stored table and start the persistence worker.
    ///
    /// Must be called inside a tokio runtime. Entries that fail validation
    /// are dropped while loading.
    pub async fn build(self) -> TableResult<ReplicatedTable> {
        self.config.validate().map_err(TableError::InvalidConfig)?;

        let state = self.state.unwrap_or_else(|| Arc::new(MemoryNamespaceState::new()));
        let stored = state.read().await?;

        let namespaces = Arc::new(Namespaces::new());
        let mut dropped = 0usize;
        for (namespace, entries) in stored {
            let inner = dashmap::DashMap::with_capacity(entries.len());
            for (id, content) in entries {
                if content.is_valid() {
                    inner.insert(id, content);
                } else {
                    dropped += 1;
                }
            }
            if !inner.is_empty() {
                namespaces.insert(namespace, inner);
            }
        }
        if dropped > 0 {
            warn!(dropped, "Dropped invalid entries from stored table");
        }

        let rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let persistence =
            PersistenceHandle::spawn(namespaces.clone(), state, self.config.persist_queue_depth);

        let table = ReplicatedTable {
            local: self.local,
            config: self.config,
            namespaces,
            pending: PendingFetches::new(),
            publisher: self.publisher,
            cipher: self.cipher,
            listener: self.listener.unwrap_or_else(|| Arc::new(NoopListener)),
            persistence,
            rng: Mutex::new(rng),
            counters: MetricsCollector::new(),
        };

        info!(
            peer = %table.local,
            namespaces = table.namespace_count(),
            entries = table.len(),
            "Replicated table ready"
        );
        Ok(table)
    }
}

/// Replicated, namespaced key/value table
pub struct ReplicatedTable {
    pub(super) local: PeerId,
    pub(super) config: TableConfig,
    pub(super) namespaces: Arc<Namespaces>,
    pub(super) pending: PendingFetches,
    pub(super) publisher: Arc<dyn Publisher>,
    pub(super) cipher: Arc<dyn ContentCipher>,
    pub(super) listener: Arc<dyn TableListener>,
    pub(super) persistence: PersistenceHandle,
    pub(super) rng: Mutex<StdRng>,
    pub(super) counters: MetricsCollector,
}

impl ReplicatedTable {
    /// Start building a table for `local`
    pub fn builder(
        local: PeerId,
        publisher: Arc<dyn Publisher>,
        cipher: Arc<dyn ContentCipher>,
    ) -> ReplicatedTableBuilder {
        ReplicatedTableBuilder {
            local,
            publisher,
            cipher,
            config: TableConfig::default(),
            state: None,
            listener: None,
            rng_seed: None,
        }
    }

    pub fn local_peer(&self) -> PeerId {
        self.local
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    // === Reads ===

    /// Records for every entry, tombstones included
    pub fn records(&self) -> Vec<Record> {
        self.namespaces
            .iter()
            .flat_map(|ns| {
                let namespace = *ns.key();
                ns.value()
                    .iter()
                    .map(|e| e.value().record(Key::new(namespace, *e.key())))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Records for one namespace, tombstones included
    pub fn records_in(&self, namespace: &NamespaceId) -> Vec<Record> {
        match self.namespaces.get(namespace) {
            Some(inner) => inner
                .iter()
                .map(|e| e.value().record(Key::new(*namespace, *e.key())))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Live, valid content at `key`
    pub fn get(&self, key: &Key) -> Option<Content> {
        self.peek(key).filter(|content| content.is_extant() && content.is_valid())
    }

    /// Whatever is stored at `key`, tombstones included
    pub fn peek(&self, key: &Key) -> Option<Content> {
        let inner = self.namespaces.get(&key.namespace)?;
        let content = inner.get(&key.id)?;
        Some(content.clone())
    }

    /// Entries across all namespaces, tombstones included
    pub fn len(&self) -> usize {
        self.namespaces.iter().map(|ns| ns.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    /// Namespaces currently holding at least one entry
    pub fn namespaces(&self) -> Vec<NamespaceId> {
        self.namespaces.iter().map(|ns| *ns.key()).collect()
    }

    /// Records waiting to be fetched
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            namespaces: 0,
            entries: 0,
            tombstones: 0,
            pending: self.pending.len(),
            operations: self.counters.snapshot(),
        };
        for ns in self.namespaces.iter() {
            stats.namespaces += 1;
            for entry in ns.value().iter() {
                stats.entries += 1;
                if entry.value().is_deleted() {
                    stats.tombstones += 1;
                }
            }
        }
        stats
    }

    // === Local mutations ===

    /// Create `key` locally.
    ///
    /// Only succeeds if the key is absent or holds a tombstone. The stored
    /// version is stamped with the current time, and is always newer than the
    /// tombstone it replaces, so callers must keep the returned content rather
    /// than the one they passed in. Returns `None` if the content was invalid,
    /// stamped too far in the future, or the key already holds live content.
    pub fn put(&self, key: Key, content: Content) -> TableResult<Option<Content>> {
        if !content.is_valid() || content.is_deleted() || self.is_from_future(content.version) {
            debug!(%key, "Rejected invalid content on put");
            self.counters.inc_rejected();
            return Ok(None);
        }

        self.ensure_capacity(&key)?;

        let inner = self.namespaces.entry(key.namespace).or_default().downgrade();
        let now = now_millis();
        let stored = match inner.entry(key.id) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_extant() {
                    None
                } else {
                    let floor = slot.get().version.saturating_add(1);
                    let version = content.version.max(now).max(floor);
                    let stored = content.with_version(version);
                    slot.insert(stored.clone());
                    Some(stored)
                }
            }
            Entry::Vacant(slot) => {
                let version = content.version.max(now);
                let stored = content.with_version(version);
                slot.insert(stored.clone());
                Some(stored)
            }
        };
        drop(inner);

        let Some(stored) = stored else {
            debug!(%key, "Key already holds content, put ignored");
            return Ok(None);
        };

        self.persistence.schedule();
        self.counters.inc_puts();
        debug!(%key, version = stored.version, "Put applied");

        self.announce(key, &stored);
        self.sync(key.namespace);
        Ok(Some(stored))
    }

    /// Replace live content at `key` with a tombstone.
    ///
    /// Returns the tombstone's record, or `None` if there was nothing live.
    pub fn delete(&self, key: &Key) -> Option<Record> {
        let record = {
            let inner = self.namespaces.get(&key.namespace)?;
            let mut slot = inner.get_mut(&key.id)?;
            if slot.is_deleted() {
                return None;
            }
            let version = now_millis().max(slot.version.saturating_add(1));
            *slot = Content::tombstone(version);
            slot.record(*key)
        };

        self.pending.clear_superseded(key, record.version);
        self.persistence.schedule();
        self.counters.inc_deletes();
        debug!(%key, version = record.version, "Delete applied");

        self.publisher.publish(
            Target::Namespace(key.namespace),
            Event::DeleteRecord { sender: self.local, record },
        );
        Some(record)
    }

    /// Ask every peer in `namespace` to advertise what it holds
    pub fn sync(&self, namespace: NamespaceId) {
        trace!(%namespace, "Requesting namespace sync");
        self.publisher.publish(
            Target::Namespace(namespace),
            Event::SyncRecords { sender: self.local, namespace },
        );
    }

    // === Remote mutations ===

    /// Apply a remote creation.
    ///
    /// Overwrites whatever is stored, unless the key holds a tombstone that is
    /// not older than `record`. Returns whether the table changed.
    pub fn add(&self, record: Record, content: Content) -> TableResult<bool> {
        let key = record.key;
        if content.is_deleted() || !content.is_valid_for(&record) {
            debug!(%record, "Rejected content not matching its record");
            self.counters.inc_rejected();
            return Ok(false);
        }
        if self.is_from_future(record.version) {
            debug!(%record, "Rejected creation stamped beyond the clock skew allowance");
            self.counters.inc_rejected();
            return Ok(false);
        }

        self.ensure_capacity(&key)?;

        let inner = self.namespaces.entry(key.namespace).or_default().downgrade();
        let applied = match inner.entry(key.id) {
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                if current.is_deleted() && current.version >= record.version {
                    debug!(%record, tombstone = current.version, "Stale creation ignored");
                    false
                } else if *current == content {
                    false
                } else {
                    slot.insert(content.clone());
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(content.clone());
                true
            }
        };
        drop(inner);

        self.pending.clear_superseded(&key, record.version);
        if !applied {
            return Ok(false);
        }

        self.persistence.schedule();
        self.counters.inc_adds();
        debug!(%record, "Remote creation applied");
        self.listener.on_add(&key, &content);
        Ok(true)
    }

    /// Apply a remote deletion by dropping the key outright.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, record: &Record) -> bool {
        let key = record.key;
        let removed = match self.namespaces.get(&key.namespace) {
            Some(inner) => inner.remove(&key.id).map(|(_, content)| content),
            None => None,
        };
        self.drop_if_empty(&key.namespace);
        self.pending.clear_superseded(&key, record.version);

        let Some(removed) = removed else {
            return false;
        };

        self.persistence.schedule();
        self.counters.inc_removes();
        debug!(%record, "Remote deletion applied");
        if removed.is_extant() {
            self.listener.on_remove(&key, &removed);
        }
        true
    }

    // === Bulk removal ===

    /// Forget a namespace locally. Returns the number of entries dropped.
    pub fn remove_namespace(&self, namespace: &NamespaceId) -> usize {
        let removed = self.namespaces.remove(namespace).map_or(0, |(_, inner)| inner.len());
        self.pending.clear_namespace(namespace);
        if removed > 0 {
            self.persistence.schedule();
            info!(%namespace, entries = removed, "Namespace removed");
        }
        removed
    }

    /// Forget everything. Returns the number of entries dropped.
    pub fn remove_all(&self) -> usize {
        let removed = self.len();
        self.namespaces.clear();
        self.pending.clear_all();
        self.persistence.schedule();
        info!(entries = removed, "Table cleared");
        removed
    }

    // === Pruning ===

    /// Drop dead tombstones everywhere. Returns the number removed.
    pub fn prune(&self) -> usize {
        self.namespaces().iter().map(|ns| self.prune_namespace(ns)).sum()
    }

    /// Drop dead tombstones in one namespace. Returns the number removed.
    pub fn prune_namespace(&self, namespace: &NamespaceId) -> usize {
        let now = now_millis();
        let retention = self.config.tombstone_retention;

        let mut removed = 0usize;
        if let Some(inner) = self.namespaces.get(namespace) {
            inner.retain(|_, content| {
                let dead = content.is_dead(now, retention);
                if dead {
                    removed += 1;
                }
                !dead
            });
        }
        self.drop_if_empty(namespace);

        if removed > 0 {
            self.persistence.schedule();
            self.counters.add_pruned(removed as u64);
            debug!(%namespace, removed, "Pruned dead tombstones");
        }
        removed
    }

    /// Wait until every mutation so far has been handed to the state store
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    // === Internals ===

    /// Whether `version` lies further ahead of the local clock than the skew allowance
    pub(super) fn is_from_future(&self, version: u64) -> bool {
        let skew = u64::try_from(self.config.max_clock_skew.as_millis()).unwrap_or(u64::MAX);
        version > now_millis().saturating_add(skew)
    }

    fn drop_if_empty(&self, namespace: &NamespaceId) {
        if self.namespaces.remove_if(namespace, |_, inner| inner.is_empty()).is_some() {
            trace!(%namespace, "Dropped empty namespace");
        }
    }

    /// Make room for `key`, pruning first. Overwrites never trip a ceiling.
    fn ensure_capacity(&self, key: &Key) -> TableResult<()> {
        let namespace = key.namespace;
        let occupancy = self
            .namespaces
            .get(&namespace)
            .map(|inner| (!inner.contains_key(&key.id)).then(|| inner.len()));

        match occupancy {
            Some(None) => Ok(()),
            Some(Some(len)) if len < self.config.max_records => Ok(()),
            Some(Some(_)) => {
                self.prune_namespace(&namespace);
                let len = self.namespaces.get(&namespace).map_or(0, |inner| inner.len());
                if len < self.config.max_records {
                    return Ok(());
                }
                self.capacity_exceeded(CapacityScope::Records(namespace), self.config.max_records)
            }
            None => {
                if self.namespaces.len() < self.config.max_namespaces {
                    return Ok(());
                }
                self.prune();
                if self.namespaces.len() < self.config.max_namespaces {
                    return Ok(());
                }
                self.capacity_exceeded(CapacityScope::Namespaces, self.config.max_namespaces)
            }
        }
    }

    fn capacity_exceeded(&self, scope: CapacityScope, limit: usize) -> TableResult<()> {
        error!(%scope, limit, "Capacity exceeded after pruning");
        metrics::record_counter("table.capacity_exceeded", 1);
        Err(TableError::CapacityExceeded { scope, limit })
    }

    /// Broadcast a local creation to the namespace
    fn announce(&self, key: Key, content: &Content) {
        match self.cipher.encrypt(self.local, key.namespace, content) {
            Ok(payload) => self.publisher.publish(
                Target::Namespace(key.namespace),
                Event::CreateEntry {
                    sender: self.local,
                    record: content.record(key),
                    payload: Some(payload),
                },
            ),
            Err(e) => warn!(%key, error = %e, "Encryption failed, creation not announced"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::GroupCipher;
    use crate::test_utils::fixtures::{text_content, RecordingPublisher};
    use std::time::Duration;
    use uuid::Uuid;

    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    struct Harness {
        table: ReplicatedTable,
        publisher: Arc<RecordingPublisher>,
        namespace: NamespaceId,
    }

    async fn harness_with(config: TableConfig) -> Harness {
        let namespace = Uuid::new_v4();
        let cipher = Arc::new(GroupCipher::new().with_secret(namespace, [9u8; 32]));
        let publisher = Arc::new(RecordingPublisher::new());
        let table = ReplicatedTable::builder(PeerId::generate(), publisher.clone(), cipher)
            .config(config)
            .rng_seed(7)
            .build()
            .await
            .unwrap();
        Harness { table, publisher, namespace }
    }

    async fn harness() -> Harness {
        harness_with(TableConfig::default()).await
    }

    fn insert_raw(table: &ReplicatedTable, key: Key, content: Content) {
        table.namespaces.entry(key.namespace).or_default().insert(key.id, content);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let h = harness().await;
        let key = Key::generate(h.namespace);

        let stored = h.table.put(key, text_content("hello")).unwrap().unwrap();

        assert!(stored.version > 1);
        assert_eq!(h.table.get(&key), Some(stored));
        assert_eq!(h.table.len(), 1);
    }

    #[tokio::test]
    async fn test_put_announces_and_syncs() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        h.table.put(key, text_content("hello")).unwrap();

        let sent = h.publisher.take();
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[0],
            (Target::Namespace(ns), Event::CreateEntry { payload: Some(_), .. }) if *ns == h.namespace
        ));
        assert!(matches!(&sent[1], (_, Event::SyncRecords { .. })));
    }

    #[tokio::test]
    async fn test_put_is_first_write_wins() {
        let h = harness().await;
        let key = Key::generate(h.namespace);

        let first = h.table.put(key, text_content("A")).unwrap().unwrap();
        assert!(h.table.put(key, text_content("B")).unwrap().is_none());

        assert_eq!(h.table.get(&key), Some(first));
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_content() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        let mut content = text_content("honest");
        content.bytes = Some(b"forged".to_vec());

        assert!(h.table.put(key, content).unwrap().is_none());
        assert!(h.table.put(key, Content::tombstone(5)).unwrap().is_none());
        assert!(h.table.is_empty());
        assert!(h.publisher.take().is_empty());
        assert_eq!(h.table.stats().operations.rejected, 2);
    }

    #[tokio::test]
    async fn test_put_stores_content_at_restamped_version() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        let content = text_content("A");

        let stored = h.table.put(key, content.clone()).unwrap().unwrap();

        assert!(stored.version >= content.version);
        assert_eq!(stored.checksum, content.checksum);
        assert_eq!(stored.bytes, content.bytes);
        assert_eq!(stored.content_type, content.content_type);
        assert_eq!(h.table.get(&key), Some(content.with_version(stored.version)));
    }

    #[tokio::test]
    async fn test_put_keeps_version_ahead_of_clock() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        let ahead = now_millis() + 60_000;

        let stored = h.table.put(key, text_content("A").with_version(ahead)).unwrap().unwrap();

        assert_eq!(stored.version, ahead);
        assert_eq!(h.table.get(&key).map(|c| c.version), Some(ahead));
    }

    #[tokio::test]
    async fn test_put_rejects_version_beyond_clock_skew() {
        let h = harness_with(TableConfig::default().with_max_clock_skew(Duration::from_secs(60))).await;
        let key = Key::generate(h.namespace);
        let far = now_millis() + 10 * 60 * 1000;

        assert!(h.table.put(key, text_content("A").with_version(far)).unwrap().is_none());
        assert!(h.table.is_empty());
        assert_eq!(h.table.stats().operations.rejected, 1);
    }

    #[tokio::test]
    async fn test_delete_then_recreate() {
        let h = harness().await;
        let key = Key::generate(h.namespace);

        h.table.put(key, text_content("A")).unwrap();
        let tombstone = h.table.delete(&key).unwrap();
        assert!(tombstone.is_tombstone());
        assert!(h.table.get(&key).is_none());

        let recreated = h.table.put(key, text_content("B")).unwrap().unwrap();
        assert!(recreated.version > tombstone.version);
        assert_eq!(h.table.get(&key).unwrap().bytes, Some(b"B".to_vec()));
    }

    #[tokio::test]
    async fn test_delete_publishes_tombstone_record() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        h.table.put(key, text_content("A")).unwrap();
        h.publisher.take();

        let record = h.table.delete(&key).unwrap();

        assert_eq!(
            h.publisher.take(),
            vec![(
                Target::Namespace(h.namespace),
                Event::DeleteRecord { sender: h.table.local_peer(), record }
            )]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_or_deleted_is_noop() {
        let h = harness().await;
        let key = Key::generate(h.namespace);

        assert!(h.table.delete(&key).is_none());

        h.table.put(key, text_content("A")).unwrap();
        assert!(h.table.delete(&key).is_some());
        assert!(h.table.delete(&key).is_none());
    }

    #[tokio::test]
    async fn test_get_hides_corrupted_content() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        let mut content = text_content("fine");
        content.bytes = Some(b"rotted".to_vec());
        insert_raw(&h.table, key, content);

        assert!(h.table.get(&key).is_none());
        assert!(h.table.peek(&key).is_some());
    }

    #[tokio::test]
    async fn test_add_overwrites_live_content() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        h.table.put(key, text_content("local")).unwrap();

        let remote = text_content("remote").with_version(3);
        assert!(h.table.add(remote.record(key), remote.clone()).unwrap());
        assert_eq!(h.table.get(&key), Some(remote));
    }

    #[tokio::test]
    async fn test_add_rejects_mismatched_record() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        let content = text_content("x").with_version(10);
        let record = content.clone().with_version(11).record(key);

        assert!(!h.table.add(record, content).unwrap());
        assert!(h.table.is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        let content = text_content("x").with_version(10);

        assert!(h.table.add(content.record(key), content.clone()).unwrap());
        assert!(!h.table.add(content.record(key), content).unwrap());
        assert_eq!(h.table.stats().operations.adds, 1);
    }

    #[tokio::test]
    async fn test_add_respects_newer_tombstone() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        let original = h.table.put(key, text_content("A")).unwrap().unwrap();
        h.table.delete(&key).unwrap();

        assert!(!h.table.add(original.record(key), original).unwrap());
        assert!(h.table.get(&key).is_none());
    }

    #[tokio::test]
    async fn test_add_supersedes_older_tombstone() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        insert_raw(&h.table, key, Content::tombstone(100));

        let content = text_content("newer").with_version(200);
        assert!(h.table.add(content.record(key), content).unwrap());
        assert!(h.table.get(&key).is_some());
    }

    #[tokio::test]
    async fn test_add_rejects_version_beyond_clock_skew() {
        let h = harness().await;
        let key = Key::generate(h.namespace);

        let hostile = text_content("pinned").with_version(u64::MAX);
        assert!(!h.table.add(hostile.record(key), hostile).unwrap());
        assert!(h.table.is_empty());
        assert_eq!(h.table.stats().operations.rejected, 1);

        // A later delete still wins over the honest creation
        let honest = text_content("honest").with_version(now_millis());
        assert!(h.table.add(honest.record(key), honest.clone()).unwrap());
        let tombstone = h.table.delete(&key).unwrap();
        assert!(tombstone.version > honest.version);
        assert!(!h.table.add(honest.record(key), honest).unwrap());
        assert!(h.table.get(&key).is_none());
    }

    #[tokio::test]
    async fn test_remove_drops_key_and_empty_namespace() {
        let h = harness().await;
        let key = Key::generate(h.namespace);
        let stored = h.table.put(key, text_content("A")).unwrap().unwrap();

        assert!(h.table.remove(&Content::tombstone(stored.version + 1).record(key)));

        assert!(h.table.peek(&key).is_none());
        assert_eq!(h.table.namespace_count(), 0);
        assert!(!h.table.remove(&Content::tombstone(stored.version + 1).record(key)));
    }

    #[tokio::test]
    async fn test_remove_keeps_other_keys() {
        let h = harness().await;
        let a = Key::generate(h.namespace);
        let b = Key::generate(h.namespace);
        h.table.put(a, text_content("A")).unwrap();
        h.table.put(b, text_content("B")).unwrap();

        h.table.remove(&Content::tombstone(now_millis()).record(a));

        assert_eq!(h.table.namespace_count(), 1);
        assert!(h.table.get(&b).is_some());
    }

    #[tokio::test]
    async fn test_records_include_tombstones() {
        let h = harness().await;
        let live = Key::generate(h.namespace);
        let dead = Key::generate(h.namespace);
        h.table.put(live, text_content("A")).unwrap();
        h.table.put(dead, text_content("B")).unwrap();
        h.table.delete(&dead);

        let records = h.table.records_in(&h.namespace);
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().filter(|r| r.is_tombstone()).count(), 1);
        assert_eq!(h.table.records().len(), 2);
        assert!(h.table.records_in(&Uuid::new_v4()).is_empty());
    }

    #[tokio::test]
    async fn test_prune_removes_only_dead_tombstones() {
        let h = harness().await;
        let now = now_millis();
        let old = Key::generate(h.namespace);
        let young = Key::generate(h.namespace);
        let live = Key::generate(h.namespace);
        insert_raw(&h.table, old, Content::tombstone(now - 31 * DAY_MS));
        insert_raw(&h.table, young, Content::tombstone(now - 29 * DAY_MS));
        insert_raw(&h.table, live, text_content("ancient").with_version(1));

        assert_eq!(h.table.prune(), 1);
        assert!(h.table.peek(&old).is_none());
        assert!(h.table.peek(&young).is_some());
        assert!(h.table.get(&live).is_some());
    }

    #[tokio::test]
    async fn test_prune_uses_configured_retention() {
        let h = harness_with(TableConfig::new().with_tombstone_retention(Duration::from_secs(1))).await;
        let key = Key::generate(h.namespace);
        insert_raw(&h.table, key, Content::tombstone(now_millis() - 5_000));

        assert_eq!(h.table.prune_namespace(&h.namespace), 1);
        assert_eq!(h.table.namespace_count(), 0);
    }

    #[tokio::test]
    async fn test_record_ceiling() {
        let h = harness_with(TableConfig::new().with_max_records(2)).await;
        h.table.put(Key::generate(h.namespace), text_content("1")).unwrap();
        h.table.put(Key::generate(h.namespace), text_content("2")).unwrap();

        let result = h.table.put(Key::generate(h.namespace), text_content("3"));
        assert!(matches!(
            result,
            Err(TableError::CapacityExceeded { scope: CapacityScope::Records(ns), limit: 2 }) if ns == h.namespace
        ));
        assert!(result.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_record_ceiling_prunes_first() {
        let h = harness_with(TableConfig::new().with_max_records(2)).await;
        insert_raw(&h.table, Key::generate(h.namespace), Content::tombstone(now_millis() - 40 * DAY_MS));
        h.table.put(Key::generate(h.namespace), text_content("1")).unwrap();

        assert!(h.table.put(Key::generate(h.namespace), text_content("2")).unwrap().is_some());
        assert_eq!(h.table.len(), 2);
    }

    #[tokio::test]
    async fn test_overwrite_never_trips_ceiling() {
        let h = harness_with(TableConfig::new().with_max_records(1)).await;
        let key = Key::generate(h.namespace);
        h.table.put(key, text_content("1")).unwrap();
        h.table.delete(&key);

        assert!(h.table.put(key, text_content("2")).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_namespace_ceiling() {
        let h = harness_with(TableConfig::new().with_max_namespaces(1)).await;
        h.table.put(Key::generate(h.namespace), text_content("1")).unwrap();

        let content = text_content("2").with_version(5);
        let key = Key::generate(Uuid::new_v4());
        let result = h.table.add(content.record(key), content);
        assert!(matches!(
            result,
            Err(TableError::CapacityExceeded { scope: CapacityScope::Namespaces, limit: 1 })
        ));
    }

    #[tokio::test]
    async fn test_remove_namespace_and_all() {
        let h = harness().await;
        let other = Uuid::new_v4();
        h.table.put(Key::generate(h.namespace), text_content("1")).unwrap();
        h.table.put(Key::generate(h.namespace), text_content("2")).unwrap();
        let content = text_content("3").with_version(4);
        let key = Key::generate(other);
        h.table.add(content.record(key), content).unwrap();
        h.publisher.take();

        assert_eq!(h.table.remove_namespace(&h.namespace), 2);
        assert_eq!(h.table.namespace_count(), 1);
        assert_eq!(h.table.remove_all(), 1);
        assert!(h.table.is_empty());
        // Purely local
        assert!(h.publisher.take().is_empty());
    }

    #[tokio::test]
    async fn test_unannounced_when_cipher_lacks_key() {
        let h = harness().await;
        let key = Key::generate(Uuid::new_v4());

        assert!(h.table.put(key, text_content("secret")).unwrap().is_some());

        let sent = h.publisher.take();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].1, Event::SyncRecords { .. }));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let result = ReplicatedTable::builder(
            PeerId::generate(),
            Arc::new(RecordingPublisher::new()),
            Arc::new(GroupCipher::new()),
        )
        .config(TableConfig::new().with_max_records(0))
        .build()
        .await;

        assert!(matches!(result, Err(TableError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_build_drops_invalid_stored_entries() {
        let namespace = Uuid::new_v4();
        let good = text_content("good");
        let mut bad = text_content("bad");
        bad.bytes = Some(b"tampered".to_vec());

        let mut entries = std::collections::HashMap::new();
        entries.insert(Uuid::new_v4(), good);
        entries.insert(Uuid::new_v4(), bad);
        let mut stored = crate::core_table::traits::Table::new();
        stored.insert(namespace, entries);

        let table = ReplicatedTable::builder(
            PeerId::generate(),
            Arc::new(RecordingPublisher::new()),
            Arc::new(GroupCipher::new()),
        )
        .state(Arc::new(MemoryNamespaceState::with_table(stored)))
        .build()
        .await
        .unwrap();

        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let h = harness().await;
        let a = Key::generate(h.namespace);
        h.table.put(a, text_content("A")).unwrap();
        h.table.put(Key::generate(h.namespace), text_content("B")).unwrap();
        h.table.delete(&a);

        let stats = h.table.stats();
        assert_eq!(stats.namespaces, 1);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.tombstones, 1);
        assert_eq!(stats.operations.puts, 2);
        assert_eq!(stats.operations.deletes, 1);
    }
}
