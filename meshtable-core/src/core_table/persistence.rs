/*
    persistence.rs - Background snapshot writer

    Every table mutation marks the table dirty and drops a request into a
    bounded queue. A single writer task drains the queue, snapshots the live
    map and hands it to the NamespaceState. Callers never wait on it.

    - One writer: snapshots never race each other on disk
    - Bounded queue: a full queue already holds a request that covers the
      dirty state, so the new request is dropped
    - Shutdown: when the table goes away the channel closes and the writer
      flushes a final snapshot if anything is still dirty
*/

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use super::content::Content;
use super::key::NamespaceId;
use super::traits::{NamespaceState, Table};
use crate::metrics;

/// Live table storage shared between the engine and the writer
pub(crate) type Namespaces = DashMap<NamespaceId, DashMap<Uuid, Content>>;

/// Copy the live map into a plain snapshot
pub(crate) fn snapshot(namespaces: &Namespaces) -> Table {
    namespaces
        .iter()
        .map(|ns| {
            let entries = ns.value().iter().map(|e| (*e.key(), e.value().clone())).collect();
            (*ns.key(), entries)
        })
        .collect()
}

enum PersistCommand {
    Write,
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer
pub(crate) struct PersistenceHandle {
    tx: mpsc::Sender<PersistCommand>,
    dirty: Arc<AtomicBool>,
    _task: JoinHandle<()>,
}

impl PersistenceHandle {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub(crate) fn spawn(
        namespaces: Arc<Namespaces>,
        state: Arc<dyn NamespaceState>,
        queue_depth: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let dirty = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run_writer(rx, namespaces, state, dirty.clone()));

        PersistenceHandle { tx, dirty, _task: task }
    }

    /// Request an asynchronous write of the whole table
    pub(crate) fn schedule(&self) {
        self.dirty.store(true, Ordering::SeqCst);

        match self.tx.try_send(PersistCommand::Write) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!("Persistence queue full, write coalesced");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Persistence writer stopped, mutation not persisted");
            }
        }
    }

    /// Wait until everything scheduled so far has been written
    pub(crate) async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(PersistCommand::Flush(ack_tx)).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

async fn run_writer(
    mut rx: mpsc::Receiver<PersistCommand>,
    namespaces: Arc<Namespaces>,
    state: Arc<dyn NamespaceState>,
    dirty: Arc<AtomicBool>,
) {
    while let Some(command) = rx.recv().await {
        write_if_dirty(&namespaces, state.as_ref(), &dirty).await;

        if let PersistCommand::Flush(ack) = command {
            let _ = ack.send(());
        }
    }

    // Table dropped
    write_if_dirty(&namespaces, state.as_ref(), &dirty).await;
    debug!("Persistence writer finished");
}

async fn write_if_dirty(namespaces: &Namespaces, state: &dyn NamespaceState, dirty: &AtomicBool) {
    if !dirty.swap(false, Ordering::SeqCst) {
        return;
    }

    let table = snapshot(namespaces);
    let entries: usize = table.values().map(|m| m.len()).sum();
    metrics::record_gauge("table.entries", entries as f64);

    let timer = metrics::Timer::new("table.persist.duration_ms");
    let result = state.write(table).await;
    timer.stop();

    match result {
        Ok(()) => {
            trace!(entries, "Table snapshot persisted");
            metrics::record_counter("table.persist.writes", 1);
        }
        Err(e) => {
            // The in-memory table stays authoritative
            error!(error = %e, "Failed to persist table snapshot");
            metrics::record_counter("table.persist.failures", 1);
        }
    }
}
